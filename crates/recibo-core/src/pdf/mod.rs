//! PDF text extraction with optional zone filtering.

mod extractor;

pub use extractor::LopdfTextSource;

use tracing::debug;

use crate::error::PdfError;
use crate::models::{PdfConfig, Zone};

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// A piece of text shown at one position.
///
/// Coordinates are unscaled viewport units: origin at the top-left corner
/// of the page, y growing downwards, anchored at the run's baseline start.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub x: f64,
    pub y: f64,
}

/// Text runs of one page, in content-stream order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageRuns {
    /// Number of pages in the document.
    pub page_count: u32,
    pub runs: Vec<TextRun>,
}

/// Provider of positioned text runs.
pub trait PdfTextSource: Send + Sync {
    /// Runs of `page` (1-indexed) from a PDF held in memory.
    fn page_runs(&self, data: &[u8], page: u32) -> Result<PageRuns>;
}

/// Turns PDF bytes into plain text, optionally limited to a zone.
pub struct TextExtractor {
    source: Box<dyn PdfTextSource>,
    page: u32,
    preserve_lines: bool,
}

impl TextExtractor {
    /// Extractor reading page 1 through lopdf.
    pub fn new() -> Self {
        Self::with_source(Box::new(LopdfTextSource))
    }

    pub fn with_source(source: Box<dyn PdfTextSource>) -> Self {
        Self {
            source,
            page: 1,
            preserve_lines: false,
        }
    }

    pub fn from_config(config: &PdfConfig) -> Self {
        Self::new()
            .with_page(config.page)
            .with_preserve_lines(config.preserve_lines)
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    /// Break lines where the baseline changes instead of joining with spaces.
    pub fn with_preserve_lines(mut self, preserve: bool) -> Self {
        self.preserve_lines = preserve;
        self
    }

    /// Text of the configured page.
    ///
    /// Without a zone every run is kept. With a zone only runs whose anchor
    /// lies inside it (edges included) are kept; an empty string is a valid
    /// result then. Fails with `NoText` when the page has no text at all.
    pub fn extract(&self, data: &[u8], zone: Option<&Zone>) -> Result<String> {
        let page = self.source.page_runs(data, self.page)?;
        if page.runs.iter().all(|r| r.text.trim().is_empty()) {
            return Err(PdfError::NoText);
        }

        let kept: Vec<&TextRun> = page
            .runs
            .iter()
            .filter(|r| zone.map_or(true, |z| z.contains(r.x, r.y)))
            .collect();

        debug!(
            "Page {}/{}: kept {} of {} text runs",
            self.page,
            page.page_count,
            kept.len(),
            page.runs.len()
        );

        Ok(join_runs(&kept, self.preserve_lines))
    }
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Baselines closer than this are treated as the same line.
const LINE_TOLERANCE: f64 = 1.0;

fn join_runs(runs: &[&TextRun], preserve_lines: bool) -> String {
    let mut out = String::new();
    let mut last_y: Option<f64> = None;

    for run in runs {
        let text = run.text.trim();
        if text.is_empty() {
            continue;
        }
        if let Some(y) = last_y {
            if preserve_lines && (run.y - y).abs() > LINE_TOLERANCE {
                out.push('\n');
            } else {
                out.push(' ');
            }
        }
        out.push_str(text);
        last_y = Some(run.y);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct FixedRuns(Vec<TextRun>);

    impl PdfTextSource for FixedRuns {
        fn page_runs(&self, _data: &[u8], page: u32) -> Result<PageRuns> {
            if page != 1 {
                return Err(PdfError::InvalidPage(page));
            }
            Ok(PageRuns {
                page_count: 1,
                runs: self.0.clone(),
            })
        }
    }

    fn run(text: &str, x: f64, y: f64) -> TextRun {
        TextRun {
            text: text.to_string(),
            x,
            y,
        }
    }

    fn extractor() -> TextExtractor {
        TextExtractor::with_source(Box::new(FixedRuns(vec![
            run("ACME SRL", 50.0, 40.0),
            run("Fecha:", 50.0, 60.0),
            run("19/11/2024", 120.0, 60.0),
            run("ACEITE", 50.0, 300.0),
            run("10", 250.0, 300.0),
        ])))
    }

    #[test]
    fn test_whole_page_single_spaced() {
        let text = extractor().extract(b"", None).unwrap();
        assert_eq!(text, "ACME SRL Fecha: 19/11/2024 ACEITE 10");
    }

    #[test]
    fn test_preserve_lines() {
        let text = extractor().with_preserve_lines(true).extract(b"", None).unwrap();
        assert_eq!(text, "ACME SRL\nFecha: 19/11/2024\nACEITE 10");
    }

    #[test]
    fn test_zone_keeps_runs_inside_inclusive() {
        let zone = Zone::new(50.0, 40.0, 70.0, 20.0);
        let text = extractor().extract(b"", Some(&zone)).unwrap();
        assert_eq!(text, "ACME SRL Fecha: 19/11/2024");

        let empty = Zone::new(400.0, 400.0, 10.0, 10.0);
        assert_eq!(extractor().extract(b"", Some(&empty)).unwrap(), "");
    }

    #[test]
    fn test_blank_page_is_an_error() {
        let blank = TextExtractor::with_source(Box::new(FixedRuns(vec![run("  ", 0.0, 0.0)])));
        assert!(matches!(blank.extract(b"", None), Err(PdfError::NoText)));

        let wrong_page = extractor().with_page(2);
        assert!(matches!(wrong_page.extract(b"", None), Err(PdfError::InvalidPage(2))));
    }
}

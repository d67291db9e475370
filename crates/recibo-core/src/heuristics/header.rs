//! Regex-based header parser.

use regex::Regex;
use tracing::debug;

use super::patterns::{
    DATE_PATTERNS, DOCUMENT_NUMBER_PATTERNS, NAME_PATTERNS, TAX_ID_LABELED, TAX_ID_PATTERNS,
};
use super::FieldExtractor;
use crate::models::HeaderData;

/// Lines searched for an unlabeled tax id when no labeled one is found.
const TAX_ID_SEARCH_LINES: usize = 5;

/// Field extractor trying an ordered list of patterns; the first match wins.
///
/// A pattern with a capture group yields the group, otherwise the whole match.
pub struct PatternExtractor {
    patterns: &'static [Regex],
}

impl PatternExtractor {
    pub fn new(patterns: &'static [Regex]) -> Self {
        Self { patterns }
    }
}

impl FieldExtractor for PatternExtractor {
    type Output = String;

    fn extract(&self, text: &str) -> Option<String> {
        self.patterns.iter().find_map(|pattern| first_match(pattern, text))
    }

    fn extract_all(&self, text: &str) -> Vec<String> {
        self.patterns
            .iter()
            .flat_map(|pattern| {
                pattern.captures_iter(text).filter_map(|caps| {
                    caps.get(1)
                        .or_else(|| caps.get(0))
                        .map(|m| m.as_str().trim().to_string())
                })
            })
            .filter(|v| !v.is_empty())
            .collect()
    }
}

fn first_match(pattern: &Regex, text: &str) -> Option<String> {
    let caps = pattern.captures(text)?;
    let value = caps.get(1).or_else(|| caps.get(0))?.as_str().trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Pull name, tax id, date and document number out of raw text.
///
/// Unmatched fields stay empty, except the name, which falls back to the
/// first non-blank line. When no labeled tax id appears anywhere, the
/// unlabeled tax-id shapes are searched in the first five non-blank lines only.
pub fn parse_header(text: &str) -> HeaderData {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let mut header = HeaderData {
        name: PatternExtractor::new(&NAME_PATTERNS).extract(text).unwrap_or_default(),
        date: PatternExtractor::new(&DATE_PATTERNS).extract(text).unwrap_or_default(),
        document_number: PatternExtractor::new(&DOCUMENT_NUMBER_PATTERNS)
            .extract(text)
            .unwrap_or_default(),
        tax_id: PatternExtractor::new(&TAX_ID_PATTERNS[..TAX_ID_LABELED])
            .extract(text)
            .unwrap_or_default(),
    };

    if header.name.is_empty() {
        if let Some(first) = lines.first() {
            header.name = first.to_string();
        }
    }

    if header.tax_id.is_empty() {
        let extractor = PatternExtractor::new(&TAX_ID_PATTERNS);
        header.tax_id = lines
            .iter()
            .take(TAX_ID_SEARCH_LINES)
            .find_map(|line| extractor.extract(line))
            .unwrap_or_default();
    }

    debug!(
        "Header heuristics filled {}/4 fields from {} lines",
        header.filled_fields(),
        lines.len()
    );

    header
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_labeled_fields() {
        let text = "FERRETERIA EL MARTILLO SRL\n\
                    RNC: 131-12345-6\n\
                    Cliente: Constructora Hernández\n\
                    Fecha de emisión: 2024-11-19\n\
                    Factura No: B0100000123\n";

        let header = parse_header(text);
        assert_eq!(
            header,
            HeaderData {
                name: "Constructora Hernández".to_string(),
                date: "2024-11-19".to_string(),
                document_number: "B0100000123".to_string(),
                tax_id: "131-12345-6".to_string(),
            }
        );
    }

    #[test]
    fn test_unlabeled_document_number_and_date() {
        let text = "Fecha: 19/11/2024\nNo. Documento 990\nDESCRIPCION CANTIDAD UND COSTO ITBS TOTAL";
        let header = parse_header(text);
        assert_eq!(header.date, "19/11/2024");
        assert_eq!(header.document_number, "990");
        assert_eq!(header.name, "Fecha: 19/11/2024");
    }

    #[test]
    fn test_name_falls_back_to_first_line() {
        let header = parse_header("\n\n  SUPERMERCADO NACIONAL  \nAv. Abraham Lincoln");
        assert_eq!(header.name, "SUPERMERCADO NACIONAL");
        assert_eq!(header.tax_id, "");
        assert_eq!(header.document_number, "");
    }

    #[test]
    fn test_unlabeled_tax_id_only_in_first_lines() {
        let near = "EMPRESA X\nB123456789\nlinea\n";
        assert_eq!(parse_header(near).tax_id, "B123456789");

        let far = "A\nB\nC\nD\nE\nF\n123456789\n";
        assert_eq!(parse_header(far).tax_id, "");

        let labeled_later = "EMPRESA X\nTel 809555123\nA\nB\nC\nD\nRNC: 131123456\n";
        assert_eq!(parse_header(labeled_later).tax_id, "131123456");
    }

    #[test]
    fn test_prefixed_invoice_code() {
        let header = parse_header("Comprobante fiscal INV-0004567\n");
        assert_eq!(header.document_number, "INV-0004567");
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(parse_header(""), HeaderData::default());
    }

    #[test]
    fn test_extract_all_collects_every_pattern() {
        let extractor = PatternExtractor::new(&DATE_PATTERNS);
        let all = extractor.extract_all("Fecha: 01/02/2024\notra 03-04-2025");
        assert!(all.contains(&"01/02/2024".to_string()));
        assert!(all.contains(&"03-04-2025".to_string()));
    }
}

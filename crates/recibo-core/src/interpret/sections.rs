//! Locating and splitting the details section of a document.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Column-title rows, full forms first, the bare description column last
    static ref DETAILS_HEADER_PATTERNS: Vec<Regex> = vec![
        Regex::new(
            r"(?i)\b(?:DESCRIPCI[OÓ]N|DETALLE)[\s\W]*(?:CANTIDAD|CANT)[\s\W]*(?:UND|UNIDAD|MEDIDA)[\s\W]*(?:COSTO|PRECIO|VALOR)[\s\W]*(?:ITBS?|IVA|TAX|IMPUESTO)?[\s\W]*(?:TOTAL|NETO|VALOR)?\b"
        ).unwrap(),
        Regex::new(
            r"(?i)\b(?:CANTIDAD|CANT)[\s\W]*(?:DESCRIPCI[OÓ]N|DETALLE)[\s\W]*(?:UND|UNIDAD|MEDIDA)[\s\W]*(?:COSTO|PRECIO|VALOR)[\s\W]*(?:ITBS?|IVA|TAX|IMPUESTO)?[\s\W]*(?:TOTAL|NETO|VALOR)?\b"
        ).unwrap(),
        Regex::new(r"(?i)\b(?:DESCRIPCI[OÓ]N|DETALLE)\b").unwrap(),
    ];
}

/// The details section: from the start of the line holding the column
/// titles to the end of the text. Falls back to the whole text.
pub fn find_details_section(text: &str) -> &str {
    for pattern in DETAILS_HEADER_PATTERNS.iter() {
        if let Some(m) = pattern.find(text) {
            let line_start = text[..m.start()].rfind('\n').map(|i| i + 1).unwrap_or(0);
            return &text[line_start..];
        }
    }
    text
}

/// Split a details section into chunks of roughly `max_chars` characters.
///
/// Splits happen on line boundaries only, and every chunk starts with the
/// section's first line so the column titles travel with each piece. Blank
/// lines are dropped. A section with no lines after its first one is
/// returned whole.
pub fn chunk_details(section: &str, max_chars: usize) -> Vec<String> {
    let mut lines = section.split('\n');
    let header_line = lines.next().unwrap_or_default().trim_end_matches('\r');

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let line_chars = line.chars().count();

        if !current.is_empty() && current_chars + line_chars > max_chars {
            chunks.push(format!("{}\n{}", header_line, current));
            current.clear();
            current_chars = 0;
        }
        current.push_str(line);
        current.push('\n');
        current_chars += line_chars + 1;
    }

    if !current.is_empty() {
        chunks.push(format!("{}\n{}", header_line, current));
    }

    if chunks.is_empty() && !section.trim().is_empty() {
        chunks.push(section.to_string());
    }

    chunks
}

//! Rule-based fallback parsers for receipts and invoices.

pub mod header;
pub mod patterns;
pub mod table;

pub use header::{parse_header, PatternExtractor};
pub use table::{parse_table, table_start, DEFAULT_UNIT};

use crate::models::DocumentData;

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the field from text.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Extract all occurrences of the field.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}

/// Run both heuristics over a document's text.
///
/// The header parser only sees the text above the line-item table, so
/// numbers inside the table are never mistaken for tax ids or document
/// numbers. Without a table the whole text is used.
pub fn parse_document(text: &str) -> DocumentData {
    let header_text = match table_start(text) {
        Some(start) if start > 0 => &text[..start],
        _ => text,
    };

    DocumentData {
        header: parse_header(header_text),
        details: parse_table(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_document_splits_header_from_table() {
        let text = "Fecha: 19/11/2024\n\
                    No. Documento 990\n\
                    DESCRIPCION CANTIDAD UND COSTO ITBS TOTAL\n\
                    ACEITE DE OLIVA 10 LITROS 5435.00 9783.00 54350.00\n\
                    TOTAL 54350.00\n\
                    Cliente: Nadie\n";

        let data = parse_document(text);
        assert_eq!(data.header.date, "19/11/2024");
        assert_eq!(data.header.document_number, "990");
        // "Cliente:" sits below the table and is not seen by the header parser
        assert_eq!(data.header.name, "Fecha: 19/11/2024");
        assert_eq!(data.details.len(), 1);
        assert_eq!(data.details[0].description, "ACEITE DE OLIVA");
    }

    #[test]
    fn test_parse_document_without_table() {
        let data = parse_document("Razón social: Colmado Pérez\nRNC 101-01010-1");
        assert_eq!(data.header.name, "Colmado Pérez");
        assert_eq!(data.header.tax_id, "101-01010-1");
        assert!(data.details.is_empty());
    }
}

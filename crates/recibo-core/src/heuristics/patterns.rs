//! Common regex patterns for Spanish-language receipts and invoices.

use lazy_static::lazy_static;
use regex::Regex;

/// Leading entries of `TAX_ID_PATTERNS` that require a label.
pub const TAX_ID_LABELED: usize = 2;

lazy_static! {
    // Header name, most specific label first
    pub static ref NAME_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)raz[oó]n\s*social\s*:\s*([^\n]+)").unwrap(),
        Regex::new(r"(?i)cliente\s*:\s*([^\n]+)").unwrap(),
        Regex::new(r"(?i)nombre\s*:\s*([^\n]+)").unwrap(),
        Regex::new(r"(?i)empresa\s*:\s*([^\n]+)").unwrap(),
        Regex::new(r"(?i)destinatario\s*:\s*([^\n]+)").unwrap(),
    ];

    // Tax identifiers (RNC, RUC, NIT, CUIT, ...), labeled forms first
    pub static ref TAX_ID_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)\b(?:ruc|nit|rif|cuit|cnpj|rut|rnc|nif|cif|tax\s*id)\b\s*:?\s*([\w-]+)").unwrap(),
        Regex::new(r"(?i)identificaci[oó]n\s*fiscal\s*:?\s*([\w-]+)").unwrap(),
        Regex::new(r"\b(?:[A-Z]{1,2}-)?(?:\d{2}\.?){3}-\d\b").unwrap(),
        Regex::new(r"\b[A-Z]?\d{9,11}\b").unwrap(),
    ];

    // Issue date
    pub static ref DATE_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)fecha\s*(?:de\s*emisi[oó]n)?\s*:\s*([^\n]+)").unwrap(),
        Regex::new(r"(?i)emitido\s*(?:el)?\s*:\s*([^\n]+)").unwrap(),
        Regex::new(r"(?i)\bdate\s*:\s*([^\n]+)").unwrap(),
        Regex::new(r"\b\d{2}[-/.]\d{2}[-/.]\d{4}\b").unwrap(),
    ];

    // Document number
    pub static ref DOCUMENT_NUMBER_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)(?:factura|documento|comprobante|nota)\s*(?:nro|num|n[uú]mero|no|#)?\.?\s*:\s*([^\n]+)").unwrap(),
        Regex::new(r"(?i)nro\s*(?:de)?\s*(?:factura|documento|comprobante)\s*:\s*([^\n]+)").unwrap(),
        Regex::new(r"(?i)\b(?:no|nro|n[uú]m(?:ero)?)\.?\s*(?:de\s+)?(?:documento|factura|comprobante)\s*:?\s*([A-Z0-9][\w-]*)").unwrap(),
        Regex::new(r"(?i)invoice\s*(?:no|number|#)?\s*:\s*([^\n]+)").unwrap(),
        Regex::new(r"(?i)\b(?:FAC|DOC|INV)-?\d{5,}\b").unwrap(),
        Regex::new(r"\b[A-Z]\d{3}-\d{6,}\b").unwrap(),
    ];

    // Start of the line-item table (matched on accent-folded, upper-cased text)
    pub static ref TABLE_START: Regex = Regex::new(
        r"\b(?:DESCRIPCION|DETALLE|MATERIAL|PRODUCTO)\b"
    ).unwrap();

    // Totals block that ends the line-item table
    pub static ref TABLE_END: Regex = Regex::new(
        r"^(?:SUB\s*-?\s*TOTAL|TOTAL(?:ES)?|MONTO\s+TOTAL|TOTAL\s+A\s+PAGAR)\b"
    ).unwrap();

    // Lines made only of column titles
    pub static ref COLUMN_TITLES: Regex = Regex::new(
        r"^(?:(?:DESCRIPCION|CANTIDAD|CANT\.?|UND|UNIDAD|MEDIDA|COSTO|PRECIO|ITBIS|ITBS|IMPUESTO|TOTAL|CODIGO|VALOR)\s*)+$"
    ).unwrap();

    // Numeric table token: optional currency prefix, thousands separators, optional percent
    pub static ref NUMERIC_TOKEN: Regex = Regex::new(
        r"^(?:RD\$|US\$|\$|€)?-?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?%?$"
    ).unwrap();

    pub static ref CURRENCY_SYMBOL: Regex = Regex::new(r"^(?:RD\$|US\$|\$|€|RD|USD|DOP)$").unwrap();

    // ISO-like dates: YYYY-MM-DD, YYYY/MM/DD, YYYY.MM.DD
    pub static ref DATE_YMD: Regex = Regex::new(
        r"^(\d{4})[./\-](\d{1,2})[./\-](\d{1,2})(?:[T\s].*)?$"
    ).unwrap();

    // Spanish long form: "19 de noviembre de 2024", "19 noviembre 2024"
    pub static ref DATE_SPANISH_LONG: Regex = Regex::new(
        r"(?i)^(\d{1,2})\s+(?:de\s+)?(enero|febrero|marzo|abril|mayo|junio|julio|agosto|septiembre|setiembre|octubre|noviembre|diciembre)\s+(?:de(?:l)?\s+)?(\d{4})$"
    ).unwrap();

    // Runs of whitespace and asterisks in descriptions
    pub static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    pub static ref ASTERISKS: Regex = Regex::new(r"\*+").unwrap();
}

//! Line-oriented parser for the line-item table.
//!
//! The table starts at the first line naming a description column and ends
//! at the totals block. A line carrying at least two numbers opens an item;
//! text-only lines in between continue the open item's description.

use tracing::debug;

use super::patterns::{COLUMN_TITLES, CURRENCY_SYMBOL, NUMERIC_TOKEN, TABLE_END, TABLE_START};
use crate::models::DetailItem;
use crate::normalize::{clean_description, coerce_number, fold_accents, round_cents};

/// Unit of measure assumed when a row names none.
pub const DEFAULT_UNIT: &str = "UND";

const UNIT_WORDS: &[&str] = &[
    "UND", "UNID", "UNIDAD", "UNIDADES", "UDS", "PCS", "PZA", "PZAS", "KG", "KGS", "GR", "LB",
    "LBS", "OZ", "ML", "LT", "LTS", "LITRO", "LITROS", "GALON", "GALONES", "GL", "FCO", "CAJA",
    "CAJAS", "LATA", "LATAS", "PAQ", "PAQUETE", "SACO", "SACOS", "DOC", "DOCENA", "M", "M2",
    "M3", "MTS", "PIES", "ROLLO", "SERV",
];

/// Byte offset of the first line naming a description column, if any.
pub fn table_start(text: &str) -> Option<usize> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if TABLE_START.is_match(&fold_accents(line)) {
            return Some(offset);
        }
        offset += line.len();
    }
    None
}

/// Segment raw text into line items. Deterministic and infallible.
pub fn parse_table(text: &str) -> Vec<DetailItem> {
    let Some(start) = table_start(text) else {
        debug!("No table header found");
        return Vec::new();
    };

    let mut rows: Vec<Row> = Vec::new();
    let mut open: Option<Row> = None;

    // Skip the column-title line itself
    for line in text[start..].lines().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let folded = fold_accents(line);
        if TABLE_END.is_match(&folded) {
            break;
        }
        if COLUMN_TITLES.is_match(&folded) {
            continue;
        }

        let tokens: Vec<Token> = line.split_whitespace().map(Token::new).collect();
        let numeric = tokens.iter().filter(|t| t.numeric).count();

        if numeric >= 2 {
            if let Some(row) = open.take() {
                rows.push(row);
            }
            open = Some(Row::from_tokens(&tokens));
        } else if let Some(row) = open.as_mut() {
            row.description.push(' ');
            row.description.push_str(line);
        }
    }
    if let Some(row) = open.take() {
        rows.push(row);
    }

    let items: Vec<DetailItem> = rows
        .into_iter()
        .filter(|row| row.is_kept())
        .enumerate()
        .map(|(index, row)| row.into_item(index))
        .collect();

    debug!("Table heuristics found {} items", items.len());
    items
}

/// Whitespace-separated piece of a row.
struct Token<'a> {
    text: &'a str,
    upper: String,
    numeric: bool,
}

impl<'a> Token<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            upper: fold_accents(text),
            numeric: NUMERIC_TOKEN.is_match(text),
        }
    }

    fn is_percent(&self) -> bool {
        self.text.ends_with('%')
    }

    fn has_currency(&self) -> bool {
        self.text.starts_with('$')
            || self.upper.starts_with("RD$")
            || self.upper.starts_with("US$")
            || self.text.starts_with('€')
    }

    fn is_currency_symbol(&self) -> bool {
        CURRENCY_SYMBOL.is_match(&self.upper)
    }

    fn unit_word(&self) -> Option<&str> {
        let word = self.upper.trim_end_matches('.');
        UNIT_WORDS.contains(&word).then_some(word)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Quantity,
    Price,
    Tax,
    Discount,
}

/// An item being assembled from one numeric line plus continuation lines.
#[derive(Debug, Default)]
struct Row {
    description: String,
    unit: Option<String>,
    quantity: f64,
    gross_price: f64,
    discount: f64,
    tax: f64,
    net_value: f64,
}

impl Row {
    fn from_tokens(tokens: &[Token<'_>]) -> Self {
        let description = tokens
            .iter()
            .take_while(|t| !t.numeric)
            .filter(|t| !t.is_currency_symbol())
            .map(|t| t.text)
            .collect::<Vec<_>>()
            .join(" ");
        let mut row = Row {
            description,
            ..Default::default()
        };

        let mut assigned: Vec<(usize, Field)> = Vec::new();
        let is_free = |assigned: &[(usize, Field)], field: Field| {
            !assigned.iter().any(|(_, f)| *f == field)
        };

        // Context clues
        for (i, token) in tokens.iter().enumerate() {
            if !token.numeric {
                continue;
            }
            let next = tokens.get(i + 1);
            let prev = i.checked_sub(1).and_then(|p| tokens.get(p));

            let next_unit = next.and_then(|n| n.unit_word());
            let prev_says_quantity = prev
                .map(|p| p.upper.contains("CANT") || p.upper.contains("QTY"))
                .unwrap_or(false);
            let prev_says_price = prev
                .map(|p| p.upper.contains("PRECIO") || p.upper.contains("COST"))
                .unwrap_or(false);
            let currency = token.has_currency() || prev.map(|p| p.is_currency_symbol()).unwrap_or(false);

            let field = if (next_unit.is_some() || prev_says_quantity)
                && is_free(&assigned, Field::Quantity)
            {
                if let Some(unit) = next_unit {
                    row.unit = Some(unit.to_string());
                }
                Some(Field::Quantity)
            } else if token.is_percent() {
                if is_free(&assigned, Field::Tax) {
                    Some(Field::Tax)
                } else if is_free(&assigned, Field::Discount) {
                    Some(Field::Discount)
                } else {
                    None
                }
            } else if (currency || prev_says_price) && is_free(&assigned, Field::Price) {
                Some(Field::Price)
            } else {
                None
            };

            if let Some(field) = field {
                assigned.push((i, field));
                row.set(field, coerce_number(token.text));
            }
        }

        // Positional fallback over the numbers no clue claimed
        let mut rest: Vec<f64> = tokens
            .iter()
            .enumerate()
            .filter(|(i, t)| t.numeric && !assigned.iter().any(|(a, _)| a == i))
            .map(|(_, t)| coerce_number(t.text))
            .collect();

        for field in [Field::Quantity, Field::Price] {
            if is_free(&assigned, field) && !rest.is_empty() {
                row.set(field, rest.remove(0));
                assigned.push((usize::MAX, field));
            }
        }

        match rest.as_slice() {
            [] => {}
            [net] => row.net_value = *net,
            [first, .., last] => {
                if is_free(&assigned, Field::Tax) {
                    row.tax = *first;
                }
                row.net_value = *last;
            }
        }

        row
    }

    fn set(&mut self, field: Field, value: f64) {
        match field {
            Field::Quantity => self.quantity = value,
            Field::Price => self.gross_price = value,
            Field::Tax => self.tax = value,
            Field::Discount => self.discount = value,
        }
    }

    fn is_kept(&self) -> bool {
        !(self.description.trim().is_empty() && self.quantity == 0.0 && self.gross_price == 0.0)
    }

    fn into_item(self, index: usize) -> DetailItem {
        let mut item = DetailItem {
            item_code: format!("ITEM{}", index + 1),
            description: clean_description(&self.description),
            unit_of_measure: self.unit.unwrap_or_else(|| DEFAULT_UNIT.to_string()),
            quantity: self.quantity,
            gross_price: self.gross_price,
            discount: self.discount,
            tax: self.tax,
            net_value: self.net_value,
        };
        if item.net_value == 0.0 {
            item.net_value =
                round_cents(item.quantity * item.gross_price * (1.0 + item.tax / 100.0));
        }
        item
    }
}

//! Document data models exchanged with the host application.
//!
//! Field names serialize in camelCase so the JSON matches what the review
//! screen and the LLM prompts use.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ReciboError;
use crate::normalize::round_cents;

/// Header of a receipt or invoice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HeaderData {
    /// Supplier or customer name.
    pub name: String,

    /// Issue date, ISO `YYYY-MM-DD` when it could be normalized.
    pub date: String,

    /// Invoice or receipt number.
    pub document_number: String,

    /// Tax identifier (RNC/RUC/NIF), upper-case alphanumerics.
    pub tax_id: String,
}

impl HeaderData {
    /// Number of non-blank fields (0-4).
    pub fn filled_fields(&self) -> usize {
        [&self.name, &self.date, &self.document_number, &self.tax_id]
            .iter()
            .filter(|f| !f.trim().is_empty())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.filled_fields() == 0
    }
}

/// A single line item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetailItem {
    pub item_code: String,
    pub description: String,
    pub unit_of_measure: String,
    pub quantity: f64,
    /// Unit price before discount and tax.
    pub gross_price: f64,
    /// Discount in percent.
    pub discount: f64,
    /// Tax in percent (LLM path) or as an amount (heuristic path).
    pub tax: f64,
    pub net_value: f64,
}

impl DetailItem {
    /// `quantity * grossPrice * (1 - discount/100) * (1 + tax/100)`, rounded to cents.
    pub fn computed_net_value(&self) -> f64 {
        let value = self.quantity
            * self.gross_price
            * (1.0 - self.discount / 100.0)
            * (1.0 + self.tax / 100.0);
        round_cents(value)
    }

    /// Refresh `net_value` from quantity, price, discount and tax.
    pub fn recompute_net_value(&mut self) {
        self.net_value = self.computed_net_value();
    }

    /// Number of non-zero / non-blank fields (0-8).
    pub fn filled_fields(&self) -> usize {
        let text = [&self.item_code, &self.description, &self.unit_of_measure]
            .iter()
            .filter(|f| !f.trim().is_empty())
            .count();
        let numbers = [
            self.quantity,
            self.gross_price,
            self.discount,
            self.tax,
            self.net_value,
        ]
        .iter()
        .filter(|n| **n != 0.0)
        .count();
        text + numbers
    }
}

/// Header plus ordered line items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentData {
    pub header: HeaderData,
    pub details: Vec<DetailItem>,
}

impl DocumentData {
    /// Whether either path found something worth showing: a header name or
    /// at least one detail item.
    pub fn has_content(&self) -> bool {
        !self.header.name.trim().is_empty() || !self.details.is_empty()
    }

    /// Keep only the requested section, emptying the other one.
    pub fn restrict_to(mut self, section: Section) -> Self {
        match section {
            Section::Header => self.details.clear(),
            Section::Details => self.header = HeaderData::default(),
        }
        self
    }

    /// Sum of all line net values.
    pub fn total_net_value(&self) -> f64 {
        round_cents(self.details.iter().map(|d| d.net_value).sum())
    }
}

/// Rectangular region of page 1 in unscaled viewport coordinates
/// (origin top-left, y growing downwards).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Zone {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Inclusive on all four edges.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

impl FromStr for Zone {
    type Err = ReciboError;

    /// Parse `x,y,width,height`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| ReciboError::Config(format!("invalid zone '{}': expected x,y,width,height", s)))?;

        match parts.as_slice() {
            [x, y, w, h] if *w >= 0.0 && *h >= 0.0 => Ok(Zone::new(*x, *y, *w, *h)),
            _ => Err(ReciboError::Config(format!(
                "invalid zone '{}': expected four numbers with non-negative size",
                s
            ))),
        }
    }
}

/// Part of the document a zone selection targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Header,
    Details,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::Header => f.write_str("header"),
            Section::Details => f.write_str("details"),
        }
    }
}

impl FromStr for Section {
    type Err = ReciboError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "header" => Ok(Section::Header),
            "details" => Ok(Section::Details),
            other => Err(ReciboError::Config(format!("unknown section: {}", other))),
        }
    }
}

/// Which path produced a result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionSource {
    #[default]
    Llm,
    Heuristic,
}

/// Final output of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    pub data: DocumentData,

    /// Text the interpretation ran on.
    pub raw_text: String,

    /// Pretty-printed JSON of `data`.
    pub interpreted_text: String,

    /// Advisory completeness score, 0-100.
    pub confidence: u8,

    pub source: ExtractionSource,
}

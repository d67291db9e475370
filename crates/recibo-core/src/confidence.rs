//! Completeness-based confidence score.
//!
//! The score is advisory: it feeds a badge next to the result and never
//! decides whether a result is accepted.

use crate::models::{DetailItem, DocumentData, HeaderData};

const HEADER_FIELDS: f64 = 4.0;
const DETAIL_FIELDS: f64 = 8.0;

/// Percentage of the four header fields that are filled.
pub fn header_score(header: &HeaderData) -> f64 {
    header.filled_fields() as f64 / HEADER_FIELDS * 100.0
}

/// Percentage of the eight item fields that are non-blank or non-zero.
pub fn item_score(item: &DetailItem) -> f64 {
    item.filled_fields() as f64 / DETAIL_FIELDS * 100.0
}

/// Mean item score, 0 without items.
pub fn details_score(details: &[DetailItem]) -> f64 {
    if details.is_empty() {
        return 0.0;
    }
    details.iter().map(item_score).sum::<f64>() / details.len() as f64
}

/// Overall score: rounded mean of the header and details scores, 0-100.
pub fn score(data: &DocumentData) -> u8 {
    let mean = (header_score(&data.header) + details_score(&data.details)) / 2.0;
    mean.round().clamp(0.0, 100.0) as u8
}

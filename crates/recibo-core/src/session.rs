//! In-memory state of one document under review.
//!
//! Holds the current data, the parser details shown next to it and the API
//! log, and applies the edit commands of the review screen. Results of
//! superseded requests are dropped by comparing request tokens.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EditError;
use crate::heuristics::DEFAULT_UNIT;
use crate::models::{ApiLog, DetailItem, DocumentData, FeatureFlags, HeaderData, ProcessingResult, Section};
use crate::normalize::finite;
use crate::validate::normalize;

/// Identifies one processing request; only the latest one is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

/// Partial update of a detail item. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetailPatch {
    pub item_code: Option<String>,
    pub description: Option<String>,
    pub unit_of_measure: Option<String>,
    pub quantity: Option<f64>,
    pub gross_price: Option<f64>,
    pub discount: Option<f64>,
    pub tax: Option<f64>,
}

impl DetailPatch {
    /// Whether the patch touches a field the net value depends on.
    pub fn changes_amounts(&self) -> bool {
        self.quantity.is_some()
            || self.gross_price.is_some()
            || self.discount.is_some()
            || self.tax.is_some()
    }

    fn apply(self, item: &mut DetailItem) {
        let recompute = self.changes_amounts();

        if let Some(code) = self.item_code {
            item.item_code = code;
        }
        if let Some(description) = self.description {
            item.description = description;
        }
        if let Some(unit) = self.unit_of_measure {
            item.unit_of_measure = unit;
        }
        if let Some(quantity) = self.quantity {
            item.quantity = finite(quantity);
        }
        if let Some(price) = self.gross_price {
            item.gross_price = finite(price);
        }
        if let Some(discount) = self.discount {
            item.discount = finite(discount);
        }
        if let Some(tax) = self.tax {
            item.tax = finite(tax);
        }

        if recompute {
            item.recompute_net_value();
        }
    }
}

/// State of the document being reviewed.
#[derive(Debug, Default)]
pub struct DocumentSession {
    data: DocumentData,
    raw_text: String,
    interpreted_text: String,
    confidence: u8,
    logs: ApiLog,
    features: FeatureFlags,
    latest: u64,
}

impl DocumentSession {
    pub fn new(features: FeatureFlags) -> Self {
        Self {
            features,
            ..Default::default()
        }
    }

    pub fn data(&self) -> &DocumentData {
        &self.data
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn interpreted_text(&self) -> &str {
        &self.interpreted_text
    }

    pub fn confidence(&self) -> u8 {
        self.confidence
    }

    /// API log of the current document, usable as the pipeline's sink.
    pub fn logs(&self) -> &ApiLog {
        &self.logs
    }

    /// Start a processing request, superseding any earlier one.
    pub fn begin_request(&mut self) -> RequestToken {
        self.latest += 1;
        RequestToken(self.latest)
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        token.0 == self.latest
    }

    /// Replace the document with a full-document result.
    ///
    /// Returns `false` and changes nothing when `token` is stale.
    pub fn apply_result(&mut self, token: RequestToken, result: ProcessingResult) -> bool {
        if !self.is_current(token) {
            debug!("Ignoring stale result for request {}", token.0);
            return false;
        }
        self.data = result.data;
        self.set_parser_info(result.raw_text, result.interpreted_text, result.confidence);
        true
    }

    /// Replace one section with the matching section of a zone result.
    pub fn apply_zone_result(
        &mut self,
        token: RequestToken,
        section: Section,
        result: ProcessingResult,
    ) -> bool {
        if !self.is_current(token) {
            debug!("Ignoring stale {} zone result for request {}", section, token.0);
            return false;
        }
        match section {
            Section::Header => self.data.header = result.data.header,
            Section::Details => self.data.details = result.data.details,
        }
        self.set_parser_info(result.raw_text, result.interpreted_text, result.confidence);
        true
    }

    fn set_parser_info(&mut self, raw_text: String, interpreted_text: String, confidence: u8) {
        self.raw_text = raw_text;
        self.interpreted_text = interpreted_text;
        self.confidence = confidence;
    }

    fn ensure_editable(&self) -> Result<(), EditError> {
        if self.features.enable_data_editing {
            Ok(())
        } else {
            Err(EditError::EditingDisabled)
        }
    }

    fn check_index(&self, index: usize) -> Result<(), EditError> {
        if index < self.data.details.len() {
            Ok(())
        } else {
            Err(EditError::IndexOutOfRange {
                index,
                len: self.data.details.len(),
            })
        }
    }

    pub fn update_header(&mut self, header: HeaderData) -> Result<(), EditError> {
        self.ensure_editable()?;
        self.data.header = header;
        Ok(())
    }

    /// Append an item; a blank code becomes its 1-based position and a
    /// blank unit becomes `UND`. Returns the new item's index.
    pub fn add_item(&mut self, mut item: DetailItem) -> Result<usize, EditError> {
        self.ensure_editable()?;
        let index = self.data.details.len();
        if item.item_code.trim().is_empty() {
            item.item_code = (index + 1).to_string();
        }
        if item.unit_of_measure.trim().is_empty() {
            item.unit_of_measure = DEFAULT_UNIT.to_string();
        }
        self.data.details.push(item);
        Ok(index)
    }

    /// Patch the item at `index`. The net value is recomputed when quantity,
    /// price, discount or tax change.
    pub fn update_item(&mut self, index: usize, patch: DetailPatch) -> Result<&DetailItem, EditError> {
        self.ensure_editable()?;
        self.check_index(index)?;
        let item = &mut self.data.details[index];
        patch.apply(item);
        Ok(item)
    }

    /// Overwrite the net value of the item at `index` without recomputing.
    pub fn set_item_net_value(&mut self, index: usize, value: f64) -> Result<(), EditError> {
        self.ensure_editable()?;
        self.check_index(index)?;
        self.data.details[index].net_value = finite(value);
        Ok(())
    }

    pub fn remove_item(&mut self, index: usize) -> Result<DetailItem, EditError> {
        self.ensure_editable()?;
        self.check_index(index)?;
        Ok(self.data.details.remove(index))
    }

    pub fn total_net_value(&self) -> f64 {
        self.data.total_net_value()
    }

    /// Data handed back to the host: normalized, numbers finite.
    pub fn export(&self) -> DocumentData {
        normalize(self.data.clone())
    }

    /// Start over with a new document. In-flight requests become stale.
    pub fn reset(&mut self) {
        self.data = DocumentData::default();
        self.set_parser_info(String::new(), String::new(), 0);
        self.logs.clear();
        self.latest += 1;
    }

    /// Reset for another attempt, when retrying is enabled.
    pub fn retry(&mut self) -> bool {
        if !self.features.enable_retry {
            return false;
        }
        self.reset();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApiLogSink, LogKind};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn session_with_items(n: usize) -> DocumentSession {
        let mut session = DocumentSession::new(FeatureFlags::default());
        for i in 0..n {
            session
                .add_item(DetailItem {
                    description: format!("ITEM {}", i),
                    quantity: 1.0,
                    gross_price: 10.0,
                    net_value: 10.0,
                    ..Default::default()
                })
                .unwrap();
        }
        session
    }

    fn result(name: &str, items: usize) -> ProcessingResult {
        ProcessingResult {
            data: DocumentData {
                header: HeaderData {
                    name: name.into(),
                    ..Default::default()
                },
                details: vec![DetailItem::default(); items],
            },
            raw_text: "raw".into(),
            interpreted_text: "{}".into(),
            confidence: 50,
            ..Default::default()
        }
    }

    #[test]
    fn test_out_of_range_edits_are_rejected() {
        let mut session = session_with_items(3);
        let before = session.data().clone();

        let err = session
            .update_item(
                5,
                DetailPatch {
                    quantity: Some(9.0),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(err, EditError::IndexOutOfRange { index: 5, len: 3 });
        assert!(session.remove_item(3).is_err());
        assert!(session.set_item_net_value(7, 1.0).is_err());
        assert_eq!(session.data(), &before);
    }

    #[test]
    fn test_discount_change_recomputes_net_value() {
        let mut session = DocumentSession::default();
        session
            .add_item(DetailItem {
                quantity: 2.0,
                gross_price: 100.0,
                tax: 18.0,
                net_value: 236.0,
                ..Default::default()
            })
            .unwrap();

        let item = session
            .update_item(
                0,
                DetailPatch {
                    discount: Some(10.0),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(item.net_value, 212.4);

        // Text edits keep a manually set net value
        session.set_item_net_value(0, 200.0).unwrap();
        let item = session
            .update_item(
                0,
                DetailPatch {
                    description: Some("SILLA".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(item.net_value, 200.0);
    }

    #[test]
    fn test_add_and_remove_items() {
        let mut session = session_with_items(2);
        let index = session.add_item(DetailItem::default()).unwrap();
        assert_eq!(index, 2);
        assert_eq!(session.data().details[2].item_code, "3");
        assert_eq!(session.data().details[2].unit_of_measure, "UND");
        assert_eq!(session.total_net_value(), 20.0);

        let removed = session.remove_item(0).unwrap();
        assert_eq!(removed.description, "ITEM 0");
        assert_eq!(session.data().details[0].description, "ITEM 1");
    }

    #[test]
    fn test_editing_disabled() {
        let features = FeatureFlags {
            enable_data_editing: false,
            ..Default::default()
        };
        let mut session = DocumentSession::new(features);
        assert_eq!(session.add_item(DetailItem::default()), Err(EditError::EditingDisabled));
        assert_eq!(
            session.update_header(HeaderData::default()),
            Err(EditError::EditingDisabled)
        );
    }

    #[test]
    fn test_stale_results_are_ignored() {
        let mut session = DocumentSession::default();
        let first = session.begin_request();
        let second = session.begin_request();

        assert!(!session.apply_result(first, result("OLD", 1)));
        assert!(session.data().header.name.is_empty());

        assert!(session.apply_result(second, result("NEW", 2)));
        assert_eq!(session.data().header.name, "NEW");
        assert_eq!(session.confidence(), 50);
        assert_eq!(session.raw_text(), "raw");
    }

    #[test]
    fn test_zone_result_replaces_one_section() {
        let mut session = DocumentSession::default();
        let token = session.begin_request();
        session.apply_result(token, result("ACME", 2));

        let token = session.begin_request();
        assert!(session.apply_zone_result(token, Section::Header, result("OTRA", 0)));
        assert_eq!(session.data().header.name, "OTRA");
        assert_eq!(session.data().details.len(), 2);
    }

    #[test]
    fn test_reset_and_retry() {
        let mut session = session_with_items(1);
        session.logs().add_log(LogKind::Request, json!({}));
        let token = session.begin_request();

        assert!(session.retry());
        assert!(session.data().details.is_empty());
        assert!(session.logs().is_empty());
        assert!(!session.is_current(token));

        let mut locked = DocumentSession::new(FeatureFlags {
            enable_retry: false,
            ..Default::default()
        });
        locked.add_item(DetailItem::default()).unwrap();
        assert!(!locked.retry());
        assert_eq!(locked.data().details.len(), 1);
    }

    #[test]
    fn test_export_normalizes() {
        let mut session = DocumentSession::default();
        session
            .update_header(HeaderData {
                name: " ACME ".into(),
                tax_id: "131-1".into(),
                ..Default::default()
            })
            .unwrap();
        session
            .add_item(DetailItem {
                description: "  SAL  ".into(),
                quantity: f64::NAN,
                ..Default::default()
            })
            .unwrap();

        let exported = session.export();
        assert_eq!(exported.header.name, "ACME");
        assert_eq!(exported.header.tax_id, "1311");
        assert_eq!(exported.details[0].description, "SAL");
        assert_eq!(exported.details[0].quantity, 0.0);
    }
}

//! WASM bindings for receipt and invoice interpretation.
//!
//! This crate exposes the offline parts of the pipeline to the browser: the
//! heuristic parsers, validation and scoring, and an editor for reviewing
//! extracted data.

use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use recibo_core::models::{
    DetailItem, DocumentData, ExtractionSource, FeatureFlags, HeaderData, ProcessingResult,
};
use recibo_core::{confidence, heuristics, normalize, validate, DetailPatch, DocumentSession, PipelineError};

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Version information.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

fn from_js<T: DeserializeOwned>(value: JsValue) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Run the heuristic parsers over extracted text.
///
/// Returns a `ProcessingResult` with zero confidence, or throws the user
/// message when nothing could be extracted.
#[wasm_bindgen]
pub fn parse_document_text(text: &str) -> Result<JsValue, JsValue> {
    if text.trim().is_empty() {
        return Err(JsValue::from_str(PipelineError::NoTextExtracted.user_message()));
    }

    let data = validate::normalize(heuristics::parse_document(text));
    if !data.has_content() {
        return Err(JsValue::from_str(PipelineError::NothingExtracted.user_message()));
    }

    let result = ProcessingResult {
        interpreted_text: serde_json::to_string_pretty(&data).unwrap_or_default(),
        data,
        raw_text: text.to_string(),
        confidence: 0,
        source: ExtractionSource::Heuristic,
    };
    to_js(&result)
}

/// Header fields found in `text`.
#[wasm_bindgen]
pub fn parse_header(text: &str) -> Result<JsValue, JsValue> {
    to_js(&heuristics::parse_header(text))
}

/// Line items found in `text`.
#[wasm_bindgen]
pub fn parse_table(text: &str) -> Result<JsValue, JsValue> {
    to_js(&heuristics::parse_table(text))
}

/// Parse a money or quantity string such as "RD$ 1,234.50"; 0 when unparseable.
#[wasm_bindgen]
pub fn coerce_number(raw: &str) -> f64 {
    normalize::coerce_number(raw)
}

/// Normalize a `DocumentData` value (dates, tax id, codes, units).
#[wasm_bindgen]
pub fn normalize_document(data: JsValue) -> Result<JsValue, JsValue> {
    let data: DocumentData = from_js(data)?;
    to_js(&validate::normalize(data))
}

/// Completeness score (0-100) of a `DocumentData` value.
#[wasm_bindgen]
pub fn score_document(data: JsValue) -> Result<u8, JsValue> {
    let data: DocumentData = from_js(data)?;
    Ok(confidence::score(&data))
}

/// Return `item` with its net value recomputed from quantity, price,
/// discount and tax.
#[wasm_bindgen]
pub fn recompute_net_value(item: JsValue) -> Result<JsValue, JsValue> {
    let mut item: DetailItem = from_js(item)?;
    item.recompute_net_value();
    to_js(&item)
}

/// Editable document under review.
#[wasm_bindgen]
pub struct DocumentEditor {
    session: DocumentSession,
}

#[wasm_bindgen]
impl DocumentEditor {
    /// Create an editor with all features enabled.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            session: DocumentSession::new(FeatureFlags::default()),
        }
    }

    /// Create an editor from a `FeatureFlags` value.
    #[wasm_bindgen]
    pub fn with_features(features: JsValue) -> Result<DocumentEditor, JsValue> {
        let features: FeatureFlags = from_js(features)?;
        Ok(Self {
            session: DocumentSession::new(features),
        })
    }

    /// Replace the document with a `ProcessingResult`.
    #[wasm_bindgen]
    pub fn load(&mut self, result: JsValue) -> Result<(), JsValue> {
        let result: ProcessingResult = from_js(result)?;
        let token = self.session.begin_request();
        self.session.apply_result(token, result);
        Ok(())
    }

    /// Current document data.
    #[wasm_bindgen]
    pub fn data(&self) -> Result<JsValue, JsValue> {
        to_js(self.session.data())
    }

    #[wasm_bindgen]
    pub fn confidence(&self) -> u8 {
        self.session.confidence()
    }

    #[wasm_bindgen]
    pub fn update_header(&mut self, header: JsValue) -> Result<(), JsValue> {
        let header: HeaderData = from_js(header)?;
        self.session.update_header(header).map_err(edit_error)
    }

    /// Append an item and return its index.
    #[wasm_bindgen]
    pub fn add_item(&mut self, item: JsValue) -> Result<usize, JsValue> {
        let item: DetailItem = from_js(item)?;
        self.session.add_item(item).map_err(edit_error)
    }

    /// Apply a partial update and return the updated item.
    #[wasm_bindgen]
    pub fn update_item(&mut self, index: usize, patch: JsValue) -> Result<JsValue, JsValue> {
        let patch: DetailPatch = from_js(patch)?;
        let item = self.session.update_item(index, patch).map_err(edit_error)?;
        to_js(item)
    }

    #[wasm_bindgen]
    pub fn set_item_net_value(&mut self, index: usize, value: f64) -> Result<(), JsValue> {
        self.session.set_item_net_value(index, value).map_err(edit_error)
    }

    /// Remove an item and return it.
    #[wasm_bindgen]
    pub fn remove_item(&mut self, index: usize) -> Result<JsValue, JsValue> {
        let item = self.session.remove_item(index).map_err(edit_error)?;
        to_js(&item)
    }

    #[wasm_bindgen]
    pub fn total_net_value(&self) -> f64 {
        self.session.total_net_value()
    }

    /// Normalized copy of the document for saving.
    #[wasm_bindgen]
    pub fn export(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.export())
    }

    /// API log entries as an array.
    #[wasm_bindgen]
    pub fn logs(&self) -> Result<js_sys::Array, JsValue> {
        let array = js_sys::Array::new();
        for entry in self.session.logs().entries() {
            array.push(&to_js(&entry)?);
        }
        Ok(array)
    }

    /// Start over with an empty document.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.session.reset();
    }

    /// Clear the document so it can be processed again; false when retrying
    /// is disabled.
    #[wasm_bindgen]
    pub fn retry(&mut self) -> bool {
        self.session.retry()
    }
}

impl Default for DocumentEditor {
    fn default() -> Self {
        Self::new()
    }
}

fn edit_error(e: recibo_core::EditError) -> JsValue {
    web_sys::console::warn_1(&JsValue::from_str(&e.to_string()));
    JsValue::from_str(e.user_message())
}

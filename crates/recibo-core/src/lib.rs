//! Core library for receipt and invoice interpretation.
//!
//! This crate provides:
//! - PDF text extraction, optionally limited to a zone of the page
//! - LLM interpretation with chunked details and per-chunk error isolation
//! - Heuristic header and line-item parsers used as a fallback
//! - Validation, normalization and confidence scoring
//! - An editable document session with stale-result protection

pub mod confidence;
pub mod error;
pub mod heuristics;
pub mod interpret;
pub mod models;
pub mod normalize;
pub mod pdf;
pub mod pipeline;
pub mod session;
pub mod validate;

pub use confidence::score;
pub use error::{EditError, InterpretError, PdfError, PipelineError, ReciboError, Result};
pub use heuristics::{parse_document, parse_header, parse_table};
pub use interpret::{Interpretation, Interpreter};
pub use models::{
    ApiLog, ApiLogEntry, ApiLogSink, DetailItem, DocumentData, ExtractionConfig, ExtractionSource,
    FeatureFlags, HeaderData, LogKind, PdfConfig, ProcessingResult, ReciboConfig, Section, Zone,
};
pub use pdf::{LopdfTextSource, PdfTextSource, TextExtractor};
pub use pipeline::{Pipeline, PipelineState, Target};
pub use session::{DetailPatch, DocumentSession, RequestToken};
pub use validate::{normalize, validate, validate_input};

/// Re-export provider types.
pub use recibo_llm::{
    CompletionProvider, CompletionRequest, CompletionResponse, LlmError, ProviderKind,
    ProviderSettings,
};

#[cfg(feature = "native")]
pub use recibo_llm::{HttpProvider, RetryingProvider};

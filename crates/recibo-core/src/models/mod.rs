//! Data models, configuration and the API log.

pub mod config;
pub mod document;
pub mod log;

pub use config::{ExtractionConfig, FeatureFlags, LlmConfig, PdfConfig, ReciboConfig};
pub use document::{
    DetailItem, DocumentData, ExtractionSource, HeaderData, ProcessingResult, Section, Zone,
};
pub use log::{ApiLog, ApiLogEntry, ApiLogSink, FnSink, LogKind, NoopSink};

//! LLM interpretation of document text.
//!
//! The details section is interpreted first, split into chunks that each
//! carry the column-title line. The header is only requested once at least
//! one item was found.

mod prompt;
mod response;
mod sections;

pub use prompt::{details_prompt, header_prompt};
pub use response::extract_json;
pub use sections::{chunk_details, find_details_section};

use std::sync::Arc;
use std::time::Instant;

use recibo_llm::{CompletionProvider, CompletionRequest, CompletionResponse};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::confidence::{header_score, score};
use crate::error::InterpretError;
use crate::models::log::emit;
use crate::models::{ApiLogSink, DetailItem, DocumentData, ExtractionConfig, HeaderData, LogKind};
use crate::validate::{normalize, validate, validate_header, validate_input};

/// Validated result of the LLM path.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpretation {
    pub data: DocumentData,
    pub confidence: u8,
}

/// Chunk position attached to details log entries.
#[derive(Debug, Clone, Copy)]
struct ChunkRef {
    index: usize,
    total: usize,
}

/// Interprets document text through a completion provider.
pub struct Interpreter {
    provider: Arc<dyn CompletionProvider>,
    config: ExtractionConfig,
}

impl Interpreter {
    /// Create an interpreter with default limits.
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider,
            config: ExtractionConfig::default(),
        }
    }

    /// Set limits and prompt parameters.
    pub fn with_config(mut self, config: ExtractionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Interpret `text` into validated, normalized document data.
    ///
    /// Fails with `InvalidInput` before any call when the text is blank or
    /// too long. Failed details chunks are logged and skipped; the call only
    /// fails when no chunk produced items. A failed header call leaves the
    /// header empty.
    pub async fn interpret(
        &self,
        text: &str,
        log: Option<&dyn ApiLogSink>,
    ) -> Result<Interpretation, InterpretError> {
        validate_input(text, self.config.max_input_chars)?;
        let start = Instant::now();

        let details = self.interpret_details(text, log).await?;
        let header = self.header_or_default(text, log).await;

        let data = normalize(DocumentData { header, details });
        let confidence = score(&data);

        info!(
            "Interpreted {} items in {}ms (confidence {})",
            data.details.len(),
            start.elapsed().as_millis(),
            confidence
        );

        Ok(Interpretation { data, confidence })
    }

    async fn interpret_details(
        &self,
        text: &str,
        log: Option<&dyn ApiLogSink>,
    ) -> Result<Vec<DetailItem>, InterpretError> {
        let section = find_details_section(text);
        let chunks = chunk_details(section, self.config.details_chunk_chars);
        debug!(
            "Details section: {} chars in {} chunks",
            section.chars().count(),
            chunks.len()
        );

        let mut items = Vec::new();
        let mut last_error = None;

        for (i, chunk) in chunks.iter().enumerate() {
            let at = ChunkRef {
                index: i + 1,
                total: chunks.len(),
            };
            let request = prompt::details_request(chunk, &self.config);

            match self.details_chunk(&request, at, log).await {
                Ok(chunk_items) => {
                    debug!("Chunk {}/{} produced {} items", at.index, at.total, chunk_items.len());
                    items.extend(chunk_items);
                }
                Err(e) => {
                    warn!("Chunk {}/{} failed: {}", at.index, at.total, e);
                    self.log_error("details", Some(at), &e, log);
                    last_error = Some(e);
                }
            }
        }

        if items.is_empty() {
            return Err(last_error.unwrap_or(InterpretError::NoDetails));
        }
        Ok(items)
    }

    async fn details_chunk(
        &self,
        request: &CompletionRequest,
        at: ChunkRef,
        log: Option<&dyn ApiLogSink>,
    ) -> Result<Vec<DetailItem>, InterpretError> {
        let response = self.call("details", Some(at), request, log).await?;
        let raw = extract_json(&response.content)?;
        let data = validate(&json!({ "details": raw.get("details").cloned() }))?;
        Ok(data.details)
    }

    /// Interpret text that only holds a document header, such as a
    /// header zone. Fails when the header call fails or finds nothing.
    pub async fn interpret_header(
        &self,
        text: &str,
        log: Option<&dyn ApiLogSink>,
    ) -> Result<Interpretation, InterpretError> {
        validate_input(text, self.config.max_input_chars)?;

        let header = match self.request_header(text, log).await {
            Ok(header) if !header.is_empty() => header,
            Ok(_) => return Err(InterpretError::EmptyResult),
            Err(e) => {
                self.log_error("header", None, &e, log);
                return Err(e);
            }
        };

        let data = normalize(DocumentData {
            header,
            details: Vec::new(),
        });
        let confidence = header_score(&data.header).round() as u8;
        Ok(Interpretation { data, confidence })
    }

    async fn header_or_default(&self, text: &str, log: Option<&dyn ApiLogSink>) -> HeaderData {
        match self.request_header(header_section(text), log).await {
            Ok(header) => header,
            Err(e) => {
                warn!("Header interpretation failed: {}", e);
                self.log_error("header", None, &e, log);
                HeaderData::default()
            }
        }
    }

    async fn request_header(
        &self,
        text: &str,
        log: Option<&dyn ApiLogSink>,
    ) -> Result<HeaderData, InterpretError> {
        let request = prompt::header_request(text, &self.config);
        let response = self.call("header", None, &request, log).await?;
        let raw = extract_json(&response.content)?;
        Ok(validate_header(&raw))
    }

    async fn call(
        &self,
        section: &str,
        at: Option<ChunkRef>,
        request: &CompletionRequest,
        log: Option<&dyn ApiLogSink>,
    ) -> Result<CompletionResponse, InterpretError> {
        let mut entry = self.log_base(section, at);
        entry["request"] = serde_json::to_value(request).unwrap_or(Value::Null);
        emit(log, LogKind::Request, entry);

        let response = self.provider.complete(request).await?;

        let mut entry = self.log_base(section, at);
        entry["response"] = Value::String(response.content.clone());
        entry["model"] = json!(response.model);
        entry["usage"] = json!(response.usage);
        emit(log, LogKind::Response, entry);

        Ok(response)
    }

    fn log_base(&self, section: &str, at: Option<ChunkRef>) -> Value {
        let mut entry = json!({
            "provider": self.provider.name(),
            "type": section,
        });
        if let Some(at) = at {
            entry["chunk"] = json!(at.index);
            entry["totalChunks"] = json!(at.total);
        }
        entry
    }

    fn log_error(
        &self,
        section: &str,
        at: Option<ChunkRef>,
        error: &InterpretError,
        log: Option<&dyn ApiLogSink>,
    ) {
        let mut entry = self.log_base(section, at);
        entry["message"] = Value::String(error.to_string());
        entry["userMessage"] = Value::String(error.user_message().to_string());
        if let InterpretError::Llm(e) = error {
            entry["status"] = json!(e.status());
            if let Some(detail) = e.detail() {
                entry["response"] = Value::String(detail.response.clone());
            }
        }
        emit(log, LogKind::Error, entry);
    }
}

/// Text above the details section, or the whole text when nothing precedes it.
fn header_section(text: &str) -> &str {
    let details = find_details_section(text);
    let head = &text[..text.len() - details.len()];
    if head.trim().is_empty() { text } else { head }
}

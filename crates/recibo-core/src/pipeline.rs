//! Top-level interpretation pipeline.
//!
//! Each run walks a small state machine: text is extracted, the LLM path is
//! tried when a provider is configured, and the heuristic parsers fill in
//! when it fails or finds nothing. Transitions are pure functions so the
//! fallback policy can be tested without a provider.

use std::sync::Arc;
use std::time::Instant;

use recibo_llm::CompletionProvider;
use tracing::{debug, info, warn};

use crate::confidence::{header_score, score};
use crate::error::{InterpretError, PipelineError, Result};
use crate::heuristics::{parse_document, parse_header, parse_table};
use crate::interpret::{Interpretation, Interpreter};
use crate::models::{
    ApiLogSink, DocumentData, ExtractionConfig, ExtractionSource, FeatureFlags, HeaderData,
    NoopSink, ProcessingResult, ReciboConfig, Section, Zone,
};
use crate::pdf::TextExtractor;
use crate::validate::normalize;

/// What a run is expected to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Document,
    Section(Section),
}

impl Target {
    /// Whether `data` holds anything worth returning for this target.
    pub fn is_satisfied_by(&self, data: &DocumentData) -> bool {
        match self {
            Target::Document => data.has_content(),
            Target::Section(Section::Header) => !data.header.is_empty(),
            Target::Section(Section::Details) => !data.details.is_empty(),
        }
    }
}

/// States of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineState {
    Extracting,
    LlmAttempt,
    HeuristicAttempt,
    Done(ExtractionSource),
    Failed(PipelineFailure),
}

/// Terminal failures of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineFailure {
    NoTextExtracted,
    NothingExtracted,
}

impl From<PipelineFailure> for PipelineError {
    fn from(failure: PipelineFailure) -> Self {
        match failure {
            PipelineFailure::NoTextExtracted => PipelineError::NoTextExtracted,
            PipelineFailure::NothingExtracted => PipelineError::NothingExtracted,
        }
    }
}

impl PipelineState {
    /// After extraction: blank text fails, otherwise try the LLM when one
    /// is available and go straight to the heuristics when not.
    pub fn after_extraction(text: &str, llm_available: bool) -> Self {
        if text.trim().is_empty() {
            PipelineState::Failed(PipelineFailure::NoTextExtracted)
        } else if llm_available {
            PipelineState::LlmAttempt
        } else {
            PipelineState::HeuristicAttempt
        }
    }

    /// After the LLM attempt: any error or an unsatisfying result falls
    /// back to the heuristics.
    pub fn after_llm(
        outcome: &std::result::Result<Interpretation, InterpretError>,
        target: Target,
    ) -> Self {
        match outcome {
            Ok(found) if target.is_satisfied_by(&found.data) => {
                PipelineState::Done(ExtractionSource::Llm)
            }
            _ => PipelineState::HeuristicAttempt,
        }
    }

    /// After the heuristics: the run either has data or fails for good.
    pub fn after_heuristics(data: &DocumentData, target: Target) -> Self {
        if target.is_satisfied_by(data) {
            PipelineState::Done(ExtractionSource::Heuristic)
        } else {
            PipelineState::Failed(PipelineFailure::NothingExtracted)
        }
    }
}

/// Interpretation pipeline over PDF bytes or plain text.
pub struct Pipeline {
    extractor: TextExtractor,
    interpreter: Option<Interpreter>,
    extraction: ExtractionConfig,
    features: FeatureFlags,
}

impl Pipeline {
    /// Heuristics-only pipeline for `config`.
    pub fn new(config: &ReciboConfig) -> Self {
        Self {
            extractor: TextExtractor::from_config(&config.pdf),
            interpreter: None,
            extraction: config.extraction.clone(),
            features: config.features.clone(),
        }
    }

    /// Pipeline with the provider described by `config`, or heuristics only
    /// when the LLM is disabled or no API key is configured.
    #[cfg(feature = "native")]
    pub fn from_config(config: &ReciboConfig) -> Result<Self> {
        let pipeline = Self::new(config);
        match config.provider_settings() {
            Some(settings) => {
                let provider = recibo_llm::connect(&settings).map_err(InterpretError::from)?;
                info!("Using {} provider ({})", settings.kind, settings.model());
                Ok(pipeline.with_provider(provider))
            }
            None => {
                info!("No LLM configured, running heuristics only");
                Ok(pipeline)
            }
        }
    }

    /// Use `provider` for the LLM path.
    pub fn with_provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.interpreter = Some(Interpreter::new(provider).with_config(self.extraction.clone()));
        self
    }

    /// Replace the text extractor.
    pub fn with_extractor(mut self, extractor: TextExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn has_llm(&self) -> bool {
        self.interpreter.is_some()
    }

    /// Process a whole PDF.
    pub async fn process_file(
        &self,
        data: &[u8],
        log: Option<&dyn ApiLogSink>,
    ) -> Result<ProcessingResult> {
        let text = self.extractor.extract(data, None)?;
        self.run(text, Target::Document, log).await
    }

    /// Process the text inside `zone` as the given section.
    pub async fn process_zone(
        &self,
        data: &[u8],
        zone: &Zone,
        section: Section,
        log: Option<&dyn ApiLogSink>,
    ) -> Result<ProcessingResult> {
        self.ensure_zone_selection()?;
        let text = self.extractor.extract(data, Some(zone))?;
        self.run(text, Target::Section(section), log).await
    }

    /// Process already extracted text.
    pub async fn process_text(
        &self,
        text: &str,
        log: Option<&dyn ApiLogSink>,
    ) -> Result<ProcessingResult> {
        self.run(text.to_string(), Target::Document, log).await
    }

    /// Process already extracted zone text as the given section.
    pub async fn process_zone_text(
        &self,
        text: &str,
        section: Section,
        log: Option<&dyn ApiLogSink>,
    ) -> Result<ProcessingResult> {
        self.ensure_zone_selection()?;
        self.run(text.to_string(), Target::Section(section), log).await
    }

    fn ensure_zone_selection(&self) -> Result<()> {
        if self.features.enable_zone_selection {
            Ok(())
        } else {
            Err(PipelineError::ZoneSelectionDisabled.into())
        }
    }

    async fn run(
        &self,
        text: String,
        target: Target,
        log: Option<&dyn ApiLogSink>,
    ) -> Result<ProcessingResult> {
        let start = Instant::now();
        let log: &dyn ApiLogSink = match log {
            Some(sink) if self.features.enable_api_logs => sink,
            _ => &NoopSink,
        };

        let mut state = PipelineState::Extracting;
        let mut found: Option<(DocumentData, u8)> = None;

        let source = loop {
            debug!("Pipeline state: {:?}", state);
            state = match state {
                PipelineState::Extracting => {
                    PipelineState::after_extraction(&text, self.interpreter.is_some())
                }
                PipelineState::LlmAttempt => {
                    let outcome = self.llm_attempt(&text, target, log).await;
                    let next = PipelineState::after_llm(&outcome, target);
                    match outcome {
                        Ok(result) => found = Some((result.data, result.confidence)),
                        Err(e) => warn!("LLM interpretation failed, using heuristics: {}", e),
                    }
                    next
                }
                PipelineState::HeuristicAttempt => {
                    let data = heuristic_attempt(&text, target);
                    let next = PipelineState::after_heuristics(&data, target);
                    let confidence = if self.extraction.score_fallback {
                        target_score(&data, target)
                    } else {
                        0
                    };
                    found = Some((data, confidence));
                    next
                }
                PipelineState::Done(source) => break source,
                PipelineState::Failed(failure) => {
                    warn!("Pipeline failed: {:?}", failure);
                    return Err(PipelineError::from(failure).into());
                }
            };
        };

        let (data, confidence) = found.ok_or(PipelineError::NothingExtracted)?;
        let data = match target {
            Target::Document => data,
            Target::Section(section) => data.restrict_to(section),
        };

        info!(
            "Processed document via {:?}: {} items, confidence {}, {}ms",
            source,
            data.details.len(),
            confidence,
            start.elapsed().as_millis()
        );

        Ok(ProcessingResult {
            interpreted_text: interpreted_text(&data, target),
            data,
            raw_text: text,
            confidence,
            source,
        })
    }

    async fn llm_attempt(
        &self,
        text: &str,
        target: Target,
        log: &dyn ApiLogSink,
    ) -> std::result::Result<Interpretation, InterpretError> {
        let Some(interpreter) = &self.interpreter else {
            return Err(InterpretError::NoDetails);
        };
        match target {
            Target::Section(Section::Header) => interpreter.interpret_header(text, Some(log)).await,
            _ => interpreter.interpret(text, Some(log)).await,
        }
    }
}

fn heuristic_attempt(text: &str, target: Target) -> DocumentData {
    let data = match target {
        Target::Document => parse_document(text),
        Target::Section(Section::Header) => DocumentData {
            header: parse_header(text),
            details: Vec::new(),
        },
        Target::Section(Section::Details) => DocumentData {
            header: HeaderData::default(),
            details: parse_table(text),
        },
    };
    normalize(data)
}

fn target_score(data: &DocumentData, target: Target) -> u8 {
    match target {
        Target::Section(Section::Header) => header_score(&data.header).round() as u8,
        _ => score(data),
    }
}

/// Pretty JSON of what the run produced: the whole document, or only the
/// requested section.
fn interpreted_text(data: &DocumentData, target: Target) -> String {
    let value = match target {
        Target::Document => serde_json::to_value(data),
        Target::Section(Section::Header) => {
            serde_json::to_value(&data.header).map(|h| serde_json::json!({ "header": h }))
        }
        Target::Section(Section::Details) => {
            serde_json::to_value(&data.details).map(|d| serde_json::json!({ "details": d }))
        }
    };
    value
        .and_then(|v| serde_json::to_string_pretty(&v))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReciboError;
    use crate::models::{ApiLog, LogKind};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use recibo_llm::{CompletionRequest, CompletionResponse, LlmError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SCENARIO_A: &str = "DESCRIPCION CANTIDAD UND COSTO ITBS TOTAL\n\
                              ACEITE DE OLIVA 10 LITROS 5435.00 9783.00 54350.00";

    /// Provider answering every call with the same reply.
    struct Fixed {
        reply: std::result::Result<&'static str, u16>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn ok(content: &'static str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(content),
                calls: AtomicUsize::new(0),
            })
        }

        fn status(status: u16) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(status),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CompletionProvider for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> recibo_llm::Result<CompletionResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Ok(content) => Ok(CompletionResponse::text(content)),
                Err(status) => Err(LlmError::from_status(status, serde_json::json!({}), String::new())),
            }
        }
    }

    fn scenario_b_text() -> String {
        format!("Fecha: 19/11/2024\nNo. Documento 990\n{}", SCENARIO_A)
    }

    #[test]
    fn test_transitions() {
        assert_eq!(
            PipelineState::after_extraction("  ", true),
            PipelineState::Failed(PipelineFailure::NoTextExtracted)
        );
        assert_eq!(PipelineState::after_extraction("x", true), PipelineState::LlmAttempt);
        assert_eq!(PipelineState::after_extraction("x", false), PipelineState::HeuristicAttempt);

        let failed: std::result::Result<Interpretation, InterpretError> = Err(InterpretError::EmptyResult);
        assert_eq!(
            PipelineState::after_llm(&failed, Target::Document),
            PipelineState::HeuristicAttempt
        );

        let header_only = Ok(Interpretation {
            data: DocumentData {
                header: HeaderData {
                    name: "ACME".into(),
                    ..Default::default()
                },
                details: Vec::new(),
            },
            confidence: 25,
        });
        assert_eq!(
            PipelineState::after_llm(&header_only, Target::Document),
            PipelineState::Done(ExtractionSource::Llm)
        );
        assert_eq!(
            PipelineState::after_llm(&header_only, Target::Section(Section::Details)),
            PipelineState::HeuristicAttempt
        );

        assert_eq!(
            PipelineState::after_heuristics(&DocumentData::default(), Target::Document),
            PipelineState::Failed(PipelineFailure::NothingExtracted)
        );
    }

    #[tokio::test]
    async fn test_heuristic_fallback_without_key() {
        let pipeline = Pipeline::new(&ReciboConfig::default());
        assert!(!pipeline.has_llm());

        let result = pipeline.process_text(&scenario_b_text(), None).await.unwrap();

        assert_eq!(result.source, ExtractionSource::Heuristic);
        assert!(result.data.header.date.contains("19/11/2024"));
        assert!(result.data.header.document_number.contains("990"));
        assert_eq!(result.data.details.len(), 1);
        assert_eq!(result.data.details[0].description, "ACEITE DE OLIVA");
        assert_eq!(result.confidence, 0);
        assert_eq!(result.raw_text, scenario_b_text());

        let reparsed: DocumentData = serde_json::from_str(&result.interpreted_text).unwrap();
        assert_eq!(reparsed, result.data);
    }

    #[cfg(feature = "native")]
    #[tokio::test]
    async fn test_from_config_without_key_runs_heuristics() {
        let pipeline = Pipeline::from_config(&ReciboConfig::default()).unwrap();
        assert!(!pipeline.has_llm());

        let log = ApiLog::new();
        let result = pipeline
            .process_text(&scenario_b_text(), Some(&log))
            .await
            .unwrap();

        assert_eq!(result.source, ExtractionSource::Heuristic);
        assert_eq!(result.data.details.len(), 1);
        assert_eq!(result.data.details[0].description, "ACEITE DE OLIVA");
        assert_eq!(result.confidence, 0);
        assert!(log.entries().is_empty());

        let mut placeholder = ReciboConfig::default();
        placeholder.llm.api_key = Some("your_api_key_here".into());
        assert!(!Pipeline::from_config(&placeholder).unwrap().has_llm());

        let mut disabled = ReciboConfig::default();
        disabled.llm.api_key = Some("sk-test".into());
        disabled.features.enable_llm = false;
        assert!(!Pipeline::from_config(&disabled).unwrap().has_llm());

        let mut keyed = ReciboConfig::default();
        keyed.llm.api_key = Some("sk-test".into());
        assert!(Pipeline::from_config(&keyed).unwrap().has_llm());
    }

    #[tokio::test]
    async fn test_fallback_scoring_when_enabled() {
        let mut config = ReciboConfig::default();
        config.extraction.score_fallback = true;

        let result = Pipeline::new(&config)
            .process_text(&scenario_b_text(), None)
            .await
            .unwrap();
        assert!(result.confidence > 0);
        assert!(result.confidence <= 100);
    }

    #[tokio::test]
    async fn test_nothing_extracted() {
        let pipeline = Pipeline::new(&ReciboConfig::default());

        let err = pipeline.process_text("   \n  ", None).await.unwrap_err();
        assert!(matches!(err, ReciboError::Pipeline(PipelineError::NoTextExtracted)));

        let err = pipeline
            .process_zone_text("12 34", Section::Details, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ReciboError::Pipeline(PipelineError::NothingExtracted)));
        assert!(err.user_message().contains("selección manual"));
    }

    #[tokio::test]
    async fn test_llm_success() {
        let provider = Fixed::ok(
            r#"{"header": {"name": "ACME SRL", "date": "2024-11-19"}, "details": [{"description": "SILLA", "quantity": 2, "grossPrice": 100, "tax": 18, "netValue": 236}]}"#,
        );
        let pipeline = Pipeline::new(&ReciboConfig::default()).with_provider(provider.clone());
        let log = ApiLog::new();

        let result = pipeline.process_text(SCENARIO_A, Some(&log)).await.unwrap();

        assert_eq!(result.source, ExtractionSource::Llm);
        assert_eq!(result.data.header.name, "ACME SRL");
        assert_eq!(result.data.details[0].description, "SILLA");
        assert!(result.confidence > 0);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(log.len(), 4);
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back() {
        let provider = Fixed::status(401);
        let pipeline = Pipeline::new(&ReciboConfig::default()).with_provider(provider.clone());
        let log = ApiLog::new();

        let result = pipeline.process_text(&scenario_b_text(), Some(&log)).await.unwrap();

        assert_eq!(result.source, ExtractionSource::Heuristic);
        assert_eq!(result.data.details[0].quantity, 10.0);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        let kinds: Vec<LogKind> = log.entries().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![LogKind::Request, LogKind::Error]);
    }

    #[tokio::test]
    async fn test_api_logs_disabled() {
        let mut config = ReciboConfig::default();
        config.features.enable_api_logs = false;
        let pipeline = Pipeline::new(&config).with_provider(Fixed::status(500));
        let log = ApiLog::new();

        pipeline.process_text(&scenario_b_text(), Some(&log)).await.unwrap();
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_zone_results_are_restricted() {
        let pipeline = Pipeline::new(&ReciboConfig::default());

        let result = pipeline
            .process_zone_text(&scenario_b_text(), Section::Details, None)
            .await
            .unwrap();
        assert_eq!(result.data.header, HeaderData::default());
        assert_eq!(result.data.details.len(), 1);
        assert!(result.interpreted_text.contains("\"details\""));
        assert!(!result.interpreted_text.contains("\"header\""));

        let result = pipeline
            .process_zone_text("Fecha: 19/11/2024\nNo. Documento 990", Section::Header, None)
            .await
            .unwrap();
        assert!(result.data.details.is_empty());
        assert_eq!(result.data.header.document_number, "990");
    }

    #[tokio::test]
    async fn test_header_zone_uses_header_prompt() {
        let provider = Fixed::ok(r#"{"header": {"name": "ACME", "taxId": "131-1"}}"#);
        let pipeline = Pipeline::new(&ReciboConfig::default()).with_provider(provider.clone());

        let result = pipeline
            .process_zone_text("ACME\nRNC 131-1", Section::Header, None)
            .await
            .unwrap();
        assert_eq!(result.source, ExtractionSource::Llm);
        assert_eq!(result.data.header.tax_id, "1311");
        assert_eq!(result.confidence, 50);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zone_selection_disabled() {
        let mut config = ReciboConfig::default();
        config.features.enable_zone_selection = false;

        let err = Pipeline::new(&config)
            .process_zone_text("x", Section::Header, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ReciboError::Pipeline(PipelineError::ZoneSelectionDisabled)));
    }
}

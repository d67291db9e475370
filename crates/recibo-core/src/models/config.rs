//! Configuration structures for the interpretation pipeline.

use recibo_llm::{ProviderKind, ProviderSettings, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Placeholder shipped in sample environment files.
const PLACEHOLDER_KEY: &str = "your_api_key_here";

/// Main configuration for the recibo pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReciboConfig {
    /// LLM provider configuration.
    pub llm: LlmConfig,

    /// Interpretation limits and prompt parameters.
    pub extraction: ExtractionConfig,

    /// PDF processing configuration.
    pub pdf: PdfConfig,

    /// Feature switches.
    pub features: FeatureFlags,
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: ProviderKind,

    /// API key. Without one the pipeline runs heuristics only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Chat-completions URL override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Model name override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Retries after the first attempt for transient failures.
    pub max_retries: usize,

    pub retry_min_delay_ms: u64,

    pub retry_max_delay_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::DeepSeek,
            api_key: None,
            endpoint: None,
            model: None,
            timeout_secs: 60,
            max_retries: 3,
            retry_min_delay_ms: 500,
            retry_max_delay_ms: 8000,
        }
    }
}

/// Interpretation limits and prompt parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Longest text accepted by the LLM path, in characters.
    pub max_input_chars: usize,

    /// Details sections longer than this are split into chunks.
    pub details_chunk_chars: usize,

    pub header_max_tokens: u32,

    pub details_max_tokens: u32,

    pub temperature: f32,

    /// Score heuristic results instead of reporting 0 confidence.
    pub score_fallback: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_input_chars: 100_000,
            details_chunk_chars: 4000,
            header_max_tokens: 1000,
            details_max_tokens: 4000,
            temperature: 0.1,
            score_fallback: false,
        }
    }
}

/// PDF processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Page read for text (1-indexed).
    pub page: u32,

    /// Join runs on different baselines with a newline instead of a space.
    pub preserve_lines: bool,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            page: 1,
            preserve_lines: false,
        }
    }
}

/// Feature switches, passed explicitly to whatever needs them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub enable_llm: bool,
    pub enable_zone_selection: bool,
    pub enable_data_editing: bool,
    pub enable_api_logs: bool,
    pub enable_retry: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_llm: true,
            enable_zone_selection: true,
            enable_data_editing: true,
            enable_api_logs: true,
            enable_retry: true,
        }
    }
}

impl ReciboConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }

    /// Overlay values from the process environment.
    pub fn with_env(mut self) -> Self {
        self.apply_env(|name| std::env::var(name).ok());
        self
    }

    /// Overlay values from an environment lookup.
    ///
    /// `RECIBO_API_KEY` wins over the provider-specific variable. Empty
    /// values and the sample placeholder are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|v| usable(v));

        if let Some(provider) = read("RECIBO_LLM_PROVIDER").and_then(|p| p.parse().ok()) {
            self.llm.provider = provider;
        }
        if let Some(key) = read("RECIBO_API_KEY").or_else(|| read(self.llm.provider.api_key_var())) {
            self.llm.api_key = Some(key);
        }
        if let Some(endpoint) = read("RECIBO_LLM_ENDPOINT") {
            self.llm.endpoint = Some(endpoint);
        }
        if let Some(model) = read("RECIBO_LLM_MODEL") {
            self.llm.model = Some(model);
        }
    }

    /// Provider settings, or `None` when the LLM path is off or no key is set.
    pub fn provider_settings(&self) -> Option<ProviderSettings> {
        if !self.features.enable_llm {
            return None;
        }
        let key = self.llm.api_key.as_deref().filter(|k| usable(k))?;

        let mut settings = ProviderSettings::new(self.llm.provider, key.trim());
        settings.endpoint = self.llm.endpoint.clone();
        settings.model = self.llm.model.clone();
        settings.timeout = Duration::from_secs(self.llm.timeout_secs.max(1));
        settings.retry = (self.llm.max_retries > 0).then(|| RetryPolicy {
            max_times: self.llm.max_retries,
            min_delay: Duration::from_millis(self.llm.retry_min_delay_ms),
            max_delay: Duration::from_millis(self.llm.retry_max_delay_ms),
        });
        Some(settings)
    }
}

fn usable(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && value != PLACEHOLDER_KEY
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ReciboConfig::default();
        assert_eq!(config.extraction.max_input_chars, 100_000);
        assert_eq!(config.extraction.details_chunk_chars, 4000);
        assert_eq!(config.llm.provider, ProviderKind::DeepSeek);
        assert!(config.features.enable_llm);
        assert!(config.provider_settings().is_none());
    }

    #[test]
    fn test_env_overlay() {
        let mut config = ReciboConfig::default();
        config.apply_env(env(&[
            ("DEEPSEEK_API_KEY", "sk-deep"),
            ("RECIBO_LLM_ENDPOINT", "http://localhost:9000/v1/chat/completions"),
        ]));
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-deep"));

        let settings = config.provider_settings().unwrap();
        assert_eq!(settings.endpoint(), "http://localhost:9000/v1/chat/completions");
        assert_eq!(settings.retry.unwrap().max_times, 3);

        let mut config = ReciboConfig::default();
        config.apply_env(env(&[
            ("RECIBO_LLM_PROVIDER", "openai"),
            ("RECIBO_API_KEY", "sk-generic"),
            ("OPENAI_API_KEY", "sk-openai"),
        ]));
        assert_eq!(config.llm.provider, ProviderKind::OpenAi);
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-generic"));
    }

    #[test]
    fn test_placeholder_key_is_ignored() {
        let mut config = ReciboConfig::default();
        config.apply_env(env(&[("DEEPSEEK_API_KEY", "your_api_key_here")]));
        assert!(config.llm.api_key.is_none());

        config.llm.api_key = Some("   ".to_string());
        assert!(config.provider_settings().is_none());
    }

    #[test]
    fn test_feature_flags_gate_provider() {
        let mut config = ReciboConfig::default();
        config.llm.api_key = Some("sk".to_string());
        config.features.enable_retry = false;
        assert_eq!(config.provider_settings().unwrap().retry.map(|r| r.max_times), Some(3));

        config.llm.max_retries = 0;
        assert!(config.provider_settings().unwrap().retry.is_none());

        config.features.enable_llm = false;
        assert!(config.provider_settings().is_none());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: ReciboConfig =
            serde_json::from_str(r#"{"llm": {"provider": "openai"}}"#).unwrap();
        assert_eq!(config.llm.provider, ProviderKind::OpenAi);
        assert_eq!(config.llm.timeout_secs, 60);
        assert!(config.features.enable_zone_selection);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = ReciboConfig::default();
        config.extraction.score_fallback = true;
        config.save(&path).unwrap();

        let loaded = ReciboConfig::from_file(&path).unwrap();
        assert!(loaded.extraction.score_fallback);
        assert_eq!(loaded.pdf.page, 1);
    }
}

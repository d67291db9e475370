//! Completion provider implementations.

#[cfg(feature = "native")]
pub mod http;

#[cfg(feature = "native")]
pub mod retry;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{CompletionRequest, CompletionResponse, LlmError, Result};

/// Trait for chat-completion providers.
///
/// This trait abstracts over hosted LLM services so the interpretation
/// pipeline can run against DeepSeek, OpenAI or an in-memory double
/// without knowing which one it talks to. Implementations hold only
/// endpoint, credentials and model, so a single instance can be shared.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Short provider name used in logs.
    fn name(&self) -> &str;

    /// Send one chat-completion request and return the first choice.
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;
}

/// Known hosted providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    DeepSeek,
    OpenAi,
}

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::OpenAi => "openai",
        }
    }

    /// Chat-completions URL used when no endpoint override is configured.
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            ProviderKind::DeepSeek => "https://api.deepseek.com/v1/chat/completions",
            ProviderKind::OpenAi => "https://api.openai.com/v1/chat/completions",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::DeepSeek => "deepseek-chat",
            ProviderKind::OpenAi => "gpt-4o-mini",
        }
    }

    /// Provider-specific environment variable holding the API key.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            ProviderKind::DeepSeek => "DEEPSEEK_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deepseek" => Ok(ProviderKind::DeepSeek),
            "openai" => Ok(ProviderKind::OpenAi),
            other => Err(LlmError::Config(format!("unknown provider: {}", other))),
        }
    }
}

/// Exponential backoff budget for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_times: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_times: 3,
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

/// Everything needed to build a provider.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub api_key: String,
    /// Overrides the provider's default endpoint.
    pub endpoint: Option<String>,
    /// Overrides the provider's default model.
    pub model: Option<String>,
    pub timeout: Duration,
    /// `None` disables retries.
    pub retry: Option<RetryPolicy>,
}

impl ProviderSettings {
    pub fn new(kind: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            kind,
            api_key: api_key.into(),
            endpoint: None,
            model: None,
            timeout: Duration::from_secs(60),
            retry: Some(RetryPolicy::default()),
        }
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.kind.default_endpoint())
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or_else(|| self.kind.default_model())
    }
}

/// Build a shareable provider from settings, wrapping it with retries when
/// a retry policy is configured.
#[cfg(feature = "native")]
pub fn connect(settings: &ProviderSettings) -> Result<std::sync::Arc<dyn CompletionProvider>> {
    use std::sync::Arc;

    let provider: Arc<dyn CompletionProvider> = Arc::new(http::HttpProvider::new(settings)?);
    Ok(match settings.retry {
        Some(policy) => Arc::new(retry::RetryingProvider::new(provider, policy)),
        None => provider,
    })
}

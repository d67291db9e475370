//! Chat-completion abstraction layer for recibo.
//!
//! This crate provides a unified interface for talking to hosted LLM
//! providers that expose an OpenAI-compatible chat-completions endpoint:
//! - `HttpProvider` over reqwest for native platforms
//! - `RetryingProvider` adding bounded exponential backoff on transient failures
//!
//! Only the request/response types and the `CompletionProvider` trait are
//! available with the `wasm` feature.

mod backend;
mod error;
mod request;

pub use backend::{CompletionProvider, ProviderKind, ProviderSettings, RetryPolicy};
pub use error::{LlmError, ResponseDetail};
pub use request::{ChatMessage, CompletionRequest, CompletionResponse, Role, Usage};

#[cfg(feature = "native")]
pub use backend::connect;

#[cfg(feature = "native")]
pub use backend::http::HttpProvider;

#[cfg(feature = "native")]
pub use backend::retry::RetryingProvider;

/// Result type for completion operations.
pub type Result<T> = std::result::Result<T, LlmError>;

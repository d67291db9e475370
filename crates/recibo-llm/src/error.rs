//! Error types for the completion layer.

use serde_json::Value;
use thiserror::Error;

/// What the provider was sent and what it answered when a call failed.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseDetail {
    /// HTTP status code returned by the provider.
    pub status: u16,
    /// JSON body that was sent.
    pub request: Value,
    /// Raw body returned by the provider.
    pub response: String,
}

/// Errors that can occur while requesting a completion.
#[derive(Error, Debug)]
pub enum LlmError {
    /// The provider rejected the credentials (401/403).
    #[error("authentication rejected by provider (HTTP {})", .0.status)]
    Auth(ResponseDetail),

    /// The provider is throttling requests (429).
    #[error("rate limited by provider (HTTP {})", .0.status)]
    RateLimited(ResponseDetail),

    /// The provider failed on its side (5xx).
    #[error("upstream service error (HTTP {})", .0.status)]
    Upstream(ResponseDetail),

    /// Any other non-success status.
    #[error("provider returned HTTP {}", .0.status)]
    Api(ResponseDetail),

    /// The endpoint could not be reached.
    #[error("network unreachable: {0}")]
    Network(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The provider answered with something that is not a completion.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// The provider could not be constructed.
    #[error("provider configuration error: {0}")]
    Config(String),
}

impl LlmError {
    /// Whether repeating the same request may succeed.
    ///
    /// Only throttling, upstream failures and timeouts qualify. Credential,
    /// validation and connectivity failures are returned immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited(_) | LlmError::Upstream(_) | LlmError::Timeout(_)
        )
    }

    /// HTTP status of the failed call, if the provider answered at all.
    pub fn status(&self) -> Option<u16> {
        self.detail().map(|d| d.status)
    }

    /// Request and response bodies of the failed call.
    pub fn detail(&self) -> Option<&ResponseDetail> {
        match self {
            LlmError::Auth(d) | LlmError::RateLimited(d) | LlmError::Upstream(d) | LlmError::Api(d) => {
                Some(d)
            }
            _ => None,
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, request: Value, response: String) -> Self {
        let detail = ResponseDetail {
            status,
            request,
            response,
        };
        match status {
            401 | 403 => LlmError::Auth(detail),
            429 => LlmError::RateLimited(detail),
            500..=599 => LlmError::Upstream(detail),
            _ => LlmError::Api(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_classification() {
        assert!(matches!(LlmError::from_status(401, json!({}), String::new()), LlmError::Auth(_)));
        assert!(matches!(LlmError::from_status(403, json!({}), String::new()), LlmError::Auth(_)));
        assert!(matches!(
            LlmError::from_status(429, json!({}), String::new()),
            LlmError::RateLimited(_)
        ));
        assert!(matches!(
            LlmError::from_status(503, json!({}), String::new()),
            LlmError::Upstream(_)
        ));
        assert!(matches!(LlmError::from_status(400, json!({}), String::new()), LlmError::Api(_)));
    }

    #[test]
    fn test_retry_policy() {
        assert!(LlmError::from_status(429, json!({}), String::new()).is_retryable());
        assert!(LlmError::from_status(502, json!({}), String::new()).is_retryable());
        assert!(LlmError::Timeout("60s".into()).is_retryable());

        assert!(!LlmError::from_status(401, json!({}), String::new()).is_retryable());
        assert!(!LlmError::from_status(400, json!({}), String::new()).is_retryable());
        assert!(!LlmError::Network("dns".into()).is_retryable());
        assert!(!LlmError::InvalidResponse("empty".into()).is_retryable());
    }

    #[test]
    fn test_detail_carries_bodies() {
        let err = LlmError::from_status(500, json!({"model": "m"}), "boom".to_string());
        let detail = err.detail().unwrap();
        assert_eq!(detail.status, 500);
        assert_eq!(detail.request["model"], "m");
        assert_eq!(detail.response, "boom");
        assert_eq!(err.status(), Some(500));
        assert_eq!(LlmError::Network("x".into()).status(), None);
    }
}

//! Exponential backoff around any provider.

use std::sync::Arc;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use tracing::warn;

use super::{CompletionProvider, RetryPolicy};
use crate::{CompletionRequest, CompletionResponse, LlmError, Result};

/// Retries transient failures of the wrapped provider.
///
/// Only errors for which [`LlmError::is_retryable`] holds are repeated;
/// everything else is returned after the first attempt.
pub struct RetryingProvider {
    inner: Arc<dyn CompletionProvider>,
    backoff: ExponentialBuilder,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn CompletionProvider>, policy: RetryPolicy) -> Self {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(policy.min_delay)
            .with_max_delay(policy.max_delay)
            .with_max_times(policy.max_times)
            .with_jitter();

        Self { inner, backoff }
    }
}

#[async_trait]
impl CompletionProvider for RetryingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let attempt = || async { self.inner.complete(request).await };
        attempt
            .retry(self.backoff.clone())
            .when(LlmError::is_retryable)
            .notify(|err: &LlmError, delay| {
                warn!("{} call failed ({}), retrying in {:?}", self.inner.name(), err, delay);
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Fails with the queued errors, then answers "ok".
    struct Flaky {
        failures: Mutex<Vec<LlmError>>,
        calls: Mutex<usize>,
    }

    impl Flaky {
        fn new(failures: Vec<LlmError>) -> Arc<Self> {
            Arc::new(Self {
                failures: Mutex::new(failures),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl CompletionProvider for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse> {
            *self.calls.lock().unwrap() += 1;
            let mut failures = self.failures.lock().unwrap();
            if failures.is_empty() {
                Ok(CompletionResponse::text("ok"))
            } else {
                Err(failures.remove(0))
            }
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_times: 3,
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let flaky = Flaky::new(vec![
            LlmError::from_status(429, json!({}), String::new()),
            LlmError::from_status(503, json!({}), String::new()),
        ]);
        let provider = RetryingProvider::new(flaky.clone(), fast_policy());

        let response = provider.complete(&CompletionRequest::new(vec![])).await.unwrap();
        assert_eq!(response.content, "ok");
        assert_eq!(flaky.calls(), 3);
    }

    #[tokio::test]
    async fn test_auth_errors_are_not_retried() {
        let flaky = Flaky::new(vec![LlmError::from_status(401, json!({}), String::new())]);
        let provider = RetryingProvider::new(flaky.clone(), fast_policy());

        let err = provider.complete(&CompletionRequest::new(vec![])).await.unwrap_err();
        assert!(matches!(err, LlmError::Auth(_)));
        assert_eq!(flaky.calls(), 1);
    }

    #[tokio::test]
    async fn test_retry_budget_is_bounded() {
        let flaky = Flaky::new(
            (0..10)
                .map(|_| LlmError::Timeout("slow".into()))
                .collect(),
        );
        let provider = RetryingProvider::new(flaky.clone(), fast_policy());

        let err = provider.complete(&CompletionRequest::new(vec![])).await.unwrap_err();
        assert!(matches!(err, LlmError::Timeout(_)));
        assert_eq!(flaky.calls(), 4);
    }
}

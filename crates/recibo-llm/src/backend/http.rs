//! OpenAI-compatible chat-completions transport over reqwest.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, trace};

use super::{CompletionProvider, ProviderKind, ProviderSettings};
use crate::{CompletionRequest, CompletionResponse, LlmError, Result, Usage};

/// Provider speaking the `/v1/chat/completions` protocol.
///
/// DeepSeek and OpenAI share the same wire format and differ only in
/// endpoint, model and key, which come from [`ProviderKind`] presets.
pub struct HttpProvider {
    client: reqwest::Client,
    kind: ProviderKind,
    endpoint: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl HttpProvider {
    /// Build a provider. Fails when the API key is blank.
    pub fn new(settings: &ProviderSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            return Err(LlmError::Config(format!(
                "missing API key for {}",
                settings.kind
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| LlmError::Config(e.to_string()))?;

        debug!(
            "Created {} provider: endpoint={}, model={}, timeout={:?}",
            settings.kind,
            settings.endpoint(),
            settings.model(),
            settings.timeout
        );

        Ok(Self {
            client,
            kind: settings.kind,
            endpoint: settings.endpoint().to_string(),
            model: settings.model().to_string(),
            api_key: settings.api_key.clone(),
            timeout: settings.timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body(&self, request: &CompletionRequest) -> Value {
        request_body(&self.model, request)
    }

    fn transport_error(&self, err: reqwest::Error) -> LlmError {
        if err.is_timeout() {
            LlmError::Timeout(format!("no answer within {:?}", self.timeout))
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl CompletionProvider for HttpProvider {
    fn name(&self) -> &str {
        self.kind.name()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let body = self.request_body(request);
        trace!("POST {} ({} messages)", self.endpoint, request.messages.len());

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            debug!("{} answered HTTP {}", self.kind, status.as_u16());
            return Err(LlmError::from_status(status.as_u16(), body, text));
        }

        parse_completion(&text)
    }
}

/// JSON body for a chat-completions call. Streaming is always off.
pub(crate) fn request_body(model: &str, request: &CompletionRequest) -> Value {
    json!({
        "model": model,
        "messages": request.messages,
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
        "stream": false,
    })
}

#[derive(Deserialize)]
struct CompletionBody {
    #[serde(default)]
    choices: Vec<Choice>,
    model: Option<String>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Pull the first choice's content out of a successful response body.
pub(crate) fn parse_completion(body: &str) -> Result<CompletionResponse> {
    let parsed: CompletionBody = serde_json::from_str(body)
        .map_err(|e| LlmError::InvalidResponse(format!("not a completion body: {}", e)))?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| LlmError::InvalidResponse("response has no choices".to_string()))?;

    Ok(CompletionResponse {
        content,
        model: parsed.model,
        usage: parsed.usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChatMessage;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_request_body_shape() {
        let request = CompletionRequest::new(vec![
            ChatMessage::system("sys"),
            ChatMessage::user("text"),
        ])
        .with_max_tokens(4000);

        let body = request_body("deepseek-chat", &request);
        assert_eq!(body["model"], "deepseek-chat");
        assert_eq!(body["stream"], false);
        assert_eq!(body["max_tokens"], 4000);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "text");
    }

    #[test]
    fn test_parse_completion() {
        let body = r#"{
            "id": "abc",
            "model": "deepseek-chat",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "{\"details\": []}"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;

        let response = parse_completion(body).unwrap();
        assert_eq!(response.content, "{\"details\": []}");
        assert_eq!(response.model.as_deref(), Some("deepseek-chat"));
        assert_eq!(response.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_parse_completion_without_choices() {
        let err = parse_completion(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));

        let err = parse_completion("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }

    #[test]
    fn test_blank_key_is_rejected() {
        let settings = ProviderSettings::new(ProviderKind::DeepSeek, "  ");
        assert!(matches!(HttpProvider::new(&settings), Err(LlmError::Config(_))));
    }
}

use crate::config::LlmConfig;
use anyhow::Result;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::chat::ChatMessage;
use crate::services::conversation::manager::LlmProvider;

/// Failure talking to the chat-completion gateway. Never retried here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("LLM gateway timed out after {0}s")]
    Timeout(u64),

    #[error("LLM gateway returned HTTP {0}")]
    HttpStatus(u16),

    #[error("Malformed LLM gateway response: {0}")]
    MalformedResponse(String),

    #[error("LLM gateway request failed: {0}")]
    Transport(String),
}

impl GatewayError {
    /// Upstream HTTP status, when the gateway answered at all
    pub fn status_code(&self) -> Option<u16> {
        match self {
            GatewayError::HttpStatus(code) => Some(*code),
            _ => None,
        }
    }

    /// Short label safe to show to API callers
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Timeout(_) => "timeout",
            GatewayError::HttpStatus(_) => "http_status",
            GatewayError::MalformedResponse(_) => "malformed_response",
            GatewayError::Transport(_) => "transport",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub temperature: f32,
    pub max_completion_tokens: u32,
    pub venice_parameters: VeniceParameters,
}

#[derive(Debug, Serialize)]
pub struct VeniceParameters {
    pub include_venice_system_prompt: bool,
    pub enable_web_search: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Only the first characters of a secret, for diagnostics
pub fn redact_key(key: &str) -> String {
    let prefix: String = key.chars().take(4).collect();
    format!("{}***", prefix)
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint
#[derive(Clone)]
pub struct LlmService {
    client: Client,
    config: LlmConfig,
    api_key: String,
}

impl LlmService {
    pub fn new(config: LlmConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        debug!(
            "LLM gateway client ready: base_url={}, model={}, key={}",
            config.base_url,
            config.model,
            redact_key(&api_key)
        );

        Ok(Self { client, config, api_key })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn map_send_error(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout(self.config.timeout_seconds)
        } else {
            GatewayError::Transport(err.to_string())
        }
    }

    /// Generate completion without streaming (wait for full response)
    pub async fn generate_chat(&self, messages: &[ChatMessage]) -> Result<String, GatewayError> {
        debug!("Starting chat generation with {} messages", messages.len());

        let params = &self.config.provider_parameters;
        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_completion_tokens: self.config.max_completion_tokens,
            venice_parameters: VeniceParameters {
                include_venice_system_prompt: params.include_provider_system_prompt,
                enable_web_search: params.enable_web_search.clone(),
            },
        };

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            warn!(
                "LLM gateway error: status={}, key={}, body={}",
                status,
                redact_key(&self.api_key),
                snippet
            );
            return Err(GatewayError::HttpStatus(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| self.map_send_error(e))?;

        let chat_response: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| GatewayError::MalformedResponse(format!("invalid JSON body: {}", e)))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GatewayError::MalformedResponse("no choices returned".to_string()))
    }
}

#[async_trait::async_trait]
impl LlmProvider for LlmService {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, GatewayError> {
        self.generate_chat(messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service_for(server: &MockServer, timeout_seconds: u64) -> LlmService {
        let config = LlmConfig {
            base_url: server.uri(),
            timeout_seconds,
            ..LlmConfig::default()
        };
        LlmService::new(config, "test-key-123456".to_string()).unwrap()
    }

    fn prompt() -> Vec<ChatMessage> {
        vec![ChatMessage::system("persona"), ChatMessage::user("hello")]
    }

    #[tokio::test]
    async fn test_sends_contract_and_extracts_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key-123456"))
            .and(body_partial_json(json!({
                "model": "venice-uncensored",
                "temperature": 0.7,
                "max_completion_tokens": 512,
                "messages": [
                    {"role": "system", "content": "persona"},
                    {"role": "user", "content": "hello"}
                ],
                "venice_parameters": {
                    "include_venice_system_prompt": false,
                    "enable_web_search": "off"
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [
                    {"message": {"role": "assistant", "content": "hi there"}},
                    {"message": {"role": "assistant", "content": "ignored"}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = service_for(&server, 30).complete(&prompt()).await.unwrap();
        assert_eq!(reply, "hi there");
    }

    #[tokio::test]
    async fn test_non_200_is_http_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(1)
            .mount(&server)
            .await;

        let err = service_for(&server, 30).complete(&prompt()).await.unwrap_err();
        assert_eq!(err, GatewayError::HttpStatus(503));
        assert_eq!(err.status_code(), Some(503));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = service_for(&server, 30).complete(&prompt()).await.unwrap_err();
        assert!(matches!(err, GatewayError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_missing_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let err = service_for(&server, 30).complete(&prompt()).await.unwrap_err();
        assert_eq!(err.kind(), "malformed_response");
    }

    #[tokio::test]
    async fn test_slow_gateway_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"choices": [{"message": {"content": "late"}}]}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let err = service_for(&server, 1).complete(&prompt()).await.unwrap_err();
        assert_eq!(err, GatewayError::Timeout(1));
    }

    #[test]
    fn test_redact_key_keeps_short_prefix() {
        assert_eq!(redact_key("sk-abcdef123"), "sk-a***");
        assert_eq!(redact_key("ab"), "ab***");
    }
}

/// LLM Client: the single point of entry for all completion calls in the service.
///
/// ARCHITECTURAL RULE: No other module may call the provider API directly.
/// Pipeline code depends on the `CompletionProvider` trait; `LlmClient` is the
/// production implementation against an OpenAI-compatible chat-completions API
/// (Groq by default).
///
/// This layer never retries. Retry policy belongs to the caller.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::dossier::prompts::ExtractionPrompt;

pub mod prompts;

const TEMPERATURE: f32 = 0.1;
const MAX_TOKENS: u32 = 3000;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Authentication with the LLM provider failed: {0}")]
    Auth(String),

    #[error("LLM call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Rate limited by the LLM provider")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("LLM provider error (status {status:?}): {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },
}

/// Connection settings for the completion provider, supplied at construction.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub endpoint: String,
    /// Empty when no key is configured; calls then fail with `LlmError::Auth`.
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

/// Raw text returned by the model, with token usage when the provider reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelResponse {
    pub text: String,
    pub usage: Option<Usage>,
}

#[cfg(test)]
impl ModelResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// The one capability the pipeline needs from a language model: prompt in, raw text out.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &ExtractionPrompt) -> Result<ModelResponse, LlmError>;

    /// Whether credentials are present. Reported by the health endpoint.
    fn is_configured(&self) -> bool {
        true
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: String,
}

/// HTTP client for an OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Upstream {
                status: None,
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn send(&self, prompt: &ExtractionPrompt) -> Result<ModelResponse, LlmError> {
        let request_body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_secs = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            warn!("LLM API returned {}: {}", status, body);
            return Err(self.status_error(status, body, retry_after_secs));
        }

        let chat: ChatResponse = response.json().await.map_err(|e| self.transport_error(e))?;

        if let Some(usage) = chat.usage {
            debug!(
                "LLM call succeeded: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        let text = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::Upstream {
                status: Some(status.as_u16()),
                message: "response contained no message content".to_string(),
            })?;

        Ok(ModelResponse {
            text,
            usage: chat.usage,
        })
    }

    fn status_error(
        &self,
        status: StatusCode,
        body: String,
        retry_after_secs: Option<u64>,
    ) -> LlmError {
        // Try to parse the provider's error message
        let message = serde_json::from_str::<ProviderError>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::Auth(message),
            StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited { retry_after_secs },
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                LlmError::Timeout(self.config.timeout)
            }
            _ => LlmError::Upstream {
                status: Some(status.as_u16()),
                message,
            },
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout(self.config.timeout)
        } else {
            LlmError::Upstream {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl CompletionProvider for LlmClient {
    /// One outbound call bounded by the configured timeout. Dropping the returned
    /// future (e.g. the client disconnected) aborts the in-flight request.
    async fn complete(&self, prompt: &ExtractionPrompt) -> Result<ModelResponse, LlmError> {
        if self.config.api_key.trim().is_empty() {
            return Err(LlmError::Auth("no API key configured".to_string()));
        }

        tokio::time::timeout(self.config.timeout, self.send(prompt))
            .await
            .map_err(|_| LlmError::Timeout(self.config.timeout))?
    }

    fn is_configured(&self) -> bool {
        !self.config.api_key.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
        routing::post,
        Json, Router,
    };
    use serde_json::{json, Value};

    fn prompt() -> ExtractionPrompt {
        ExtractionPrompt {
            system: "system".to_string(),
            user: "user".to_string(),
        }
    }

    fn client_for(endpoint: String, api_key: &str, timeout: Duration) -> LlmClient {
        LlmClient::new(LlmConfig {
            endpoint,
            api_key: api_key.to_string(),
            model: "test-model".to_string(),
            timeout,
        })
        .unwrap()
    }

    /// Serves `router` on an ephemeral local port and returns the completions URL.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/v1/chat/completions")
    }

    async fn mock_provider(status: StatusCode, body: Value) -> String {
        serve(Router::new().route(
            "/v1/chat/completions",
            post(move || {
                let body = body.clone();
                async move { (status, Json(body)) }
            }),
        ))
        .await
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_network_call() {
        // Nothing listens on this port; a network call would surface as Upstream.
        let client = client_for(
            "http://127.0.0.1:9/v1/chat/completions".to_string(),
            "  ",
            Duration::from_secs(5),
        );
        assert!(!client.is_configured());
        let err = client.complete(&prompt()).await.unwrap_err();
        assert!(matches!(err, LlmError::Auth(_)));
    }

    #[tokio::test]
    async fn test_success_returns_message_content_and_usage() {
        let url = mock_provider(
            StatusCode::OK,
            json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"candidateName\":\"Jane\"}"}}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 7}
            }),
        )
        .await;
        let client = client_for(url, "key", Duration::from_secs(5));

        let response = client.complete(&prompt()).await.unwrap();
        assert_eq!(response.text, "{\"candidateName\":\"Jane\"}");
        assert_eq!(
            response.usage,
            Some(Usage {
                prompt_tokens: 12,
                completion_tokens: 7
            })
        );
    }

    #[tokio::test]
    async fn test_request_carries_model_and_bearer_key() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                let authorized = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    == Some("Bearer secret");
                let content = format!(
                    "{}|{}|{}",
                    authorized, body["model"], body["messages"][1]["content"]
                );
                Json(json!({"choices": [{"message": {"content": content}}]}))
            }),
        );
        let client = client_for(serve(router).await, "secret", Duration::from_secs(5));

        let response = client.complete(&prompt()).await.unwrap();
        assert_eq!(response.text, "true|\"test-model\"|\"user\"");
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_auth_error() {
        let url = mock_provider(
            StatusCode::UNAUTHORIZED,
            json!({"error": {"message": "Invalid API Key"}}),
        )
        .await;
        let client = client_for(url, "bad", Duration::from_secs(5));

        match client.complete(&prompt()).await.unwrap_err() {
            LlmError::Auth(message) => assert_eq!(message, "Invalid API Key"),
            other => panic!("expected Auth, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_too_many_requests_maps_to_rate_limited() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    [("retry-after", "7")],
                    "slow down",
                )
                    .into_response()
            }),
        );
        let client = client_for(serve(router).await, "key", Duration::from_secs(5));

        let err = client.complete(&prompt()).await.unwrap_err();
        assert!(matches!(
            err,
            LlmError::RateLimited {
                retry_after_secs: Some(7)
            }
        ));
    }

    #[tokio::test]
    async fn test_gateway_timeout_maps_to_timeout() {
        let url = mock_provider(StatusCode::GATEWAY_TIMEOUT, json!({})).await;
        let client = client_for(url, "key", Duration::from_secs(5));
        let err = client.complete(&prompt()).await.unwrap_err();
        assert!(matches!(err, LlmError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_upstream() {
        let url = mock_provider(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"error": {"message": "boom"}}),
        )
        .await;
        let client = client_for(url, "key", Duration::from_secs(5));

        match client.complete(&prompt()).await.unwrap_err() {
            LlmError::Upstream { status, message } => {
                assert_eq!(status, Some(500));
                assert_eq!(message, "boom");
            }
            other => panic!("expected Upstream, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_choices_is_upstream_error() {
        let url = mock_provider(StatusCode::OK, json!({"choices": []})).await;
        let client = client_for(url, "key", Duration::from_secs(5));
        let err = client.complete(&prompt()).await.unwrap_err();
        assert!(matches!(err, LlmError::Upstream { .. }));
    }

    #[tokio::test]
    async fn test_slow_provider_hits_configured_deadline() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Json(json!({"choices": []}))
            }),
        );
        let client = client_for(serve(router).await, "key", Duration::from_millis(200));

        let err = client.complete(&prompt()).await.unwrap_err();
        assert!(matches!(err, LlmError::Timeout(d) if d == Duration::from_millis(200)));
    }

    #[tokio::test]
    async fn test_dropped_call_closes_provider_connection() {
        use tokio::io::AsyncReadExt;

        // Reads the request and never answers; reports when the peer hangs up.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (closed_tx, closed_rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 64 * 1024];
            loop {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => continue,
                }
            }
            let _ = closed_tx.send(());
        });

        let client = client_for(
            format!("http://{addr}/v1/chat/completions"),
            "secret",
            Duration::from_secs(30),
        );
        let abandoned =
            tokio::time::timeout(Duration::from_millis(200), client.complete(&prompt())).await;
        assert!(abandoned.is_err());

        tokio::time::timeout(Duration::from_secs(5), closed_rx)
            .await
            .expect("provider connection still open after the call was dropped")
            .unwrap();
    }
}

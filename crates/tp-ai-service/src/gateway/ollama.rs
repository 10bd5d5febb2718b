//! Ollama chat API gateway.
//!
//! Calls `{host}/api/chat` with a system + user message pair and
//! `stream: false`. Works against a local Ollama daemon (no credential) and
//! Ollama Cloud (`Authorization: Bearer <key>`). Each attempt is bounded by a
//! deadline; dropping the returned future aborts the in-flight request.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use super::{InvokeOptions, ModelGateway, ResponseFormat};
use crate::config::{ApiKey, ServiceConfig};
use crate::error::{AiError, AiResult};

/// Longest backend error body quoted in an `AiError`.
const MAX_ERROR_BODY: usize = 200;

/// Ollama chat API request body.
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
    stream: bool,
}

/// A single message in the chat request.
#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Ollama chat API response (only fields we need).
#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

/// Error body Ollama sends with non-2xx statuses.
#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP gateway for the Ollama chat endpoint. Makes exactly one attempt per
/// `invoke`; wrap it in `RetryingGateway` for backoff.
pub struct OllamaGateway {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<ApiKey>,
    timeout: Duration,
}

impl OllamaGateway {
    pub fn new(config: &ServiceConfig) -> AiResult<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout())
            .build()
            .map_err(|e| AiError::Connection(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/chat", config.host.trim_end_matches('/')),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            timeout: config.timeout(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(
        &self,
        prompt: &str,
        options: &InvokeOptions,
        deadline: Duration,
    ) -> AiResult<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = options.system.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let body = ChatRequest {
            model: &self.model,
            messages,
            format: match options.format {
                ResponseFormat::Json => Some("json"),
                ResponseFormat::Text => None,
            },
            stream: false,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose());
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_transport(e, deadline))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &text, retry_after, deadline));
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                AiError::Timeout { after: deadline }
            } else {
                AiError::InvalidResponse(format!("failed to decode chat response: {e}"))
            }
        })?;

        let content = chat
            .message
            .map(|m| m.content)
            .ok_or_else(|| AiError::InvalidResponse("chat response has no message".into()))?;

        if content.trim().is_empty() {
            return Err(AiError::InvalidResponse("model returned empty content".into()));
        }
        Ok(content)
    }

}

/// Map a transport failure to the error taxonomy.
fn classify_transport(e: reqwest::Error, deadline: Duration) -> AiError {
    if e.is_timeout() {
        AiError::Timeout { after: deadline }
    } else if e.is_builder() {
        AiError::BadRequest {
            status: 0,
            message: e.to_string(),
        }
    } else {
        AiError::Connection(e.to_string())
    }
}

#[async_trait]
impl ModelGateway for OllamaGateway {
    async fn invoke(&self, prompt: &str, options: &InvokeOptions) -> AiResult<String> {
        if prompt.trim().is_empty() {
            return Err(AiError::InvalidInput("prompt must not be empty".into()));
        }

        let deadline = options.deadline.unwrap_or(self.timeout);
        let span = tracing::debug_span!(
            "model_invoke",
            request_id = %Uuid::now_v7(),
            model = %self.model,
        );

        async {
            let started = std::time::Instant::now();
            let result = match tokio::time::timeout(deadline, self.send(prompt, options, deadline)).await {
                Ok(result) => result,
                Err(_) => Err(AiError::Timeout { after: deadline }),
            };
            match &result {
                Ok(text) => tracing::debug!(
                    latency_ms = started.elapsed().as_millis() as u64,
                    chars = text.len(),
                    "model replied"
                ),
                Err(e) => tracing::warn!(kind = %e.kind(), error = %e, "model request failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Map a non-2xx status to the error taxonomy.
fn classify_status(
    status: StatusCode,
    body: &str,
    retry_after: Option<Duration>,
    deadline: Duration,
) -> AiError {
    let message = error_message(body);
    match status.as_u16() {
        401 | 403 => AiError::Auth {
            status: status.as_u16(),
        },
        408 => AiError::Timeout { after: deadline },
        429 => AiError::RateLimited { retry_after },
        code if status.is_server_error() => AiError::Upstream {
            status: code,
            message,
        },
        code => AiError::BadRequest {
            status: code,
            message,
        },
    }
}

/// Prefer Ollama's `{"error": "..."}` body, else the raw text, truncated.
fn error_message(body: &str) -> String {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.trim().to_string());
    if message.chars().count() > MAX_ERROR_BODY {
        let truncated: String = message.chars().take(MAX_ERROR_BODY).collect();
        format!("{truncated}...")
    } else {
        message
    }
}

/// `Retry-After` in delta-seconds form. HTTP-date values are ignored.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

//! Shared test harness for E2E integration tests.
//!
//! Runs the real `AiService` stack (HTTP gateway + retry + interpreter +
//! diagnoser) against a wiremock server speaking the Ollama chat API.

#![allow(dead_code)]

use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tp_ai_service::{AiService, ApiKey, RetryConfig, ServiceConfig};

/// Build an Ollama chat response body.
pub fn ollama_response(content: &str) -> serde_json::Value {
    serde_json::json!({
        "model": "llama3.2",
        "created_at": "2026-01-01T00:00:00Z",
        "message": {
            "role": "assistant",
            "content": content
        },
        "done": true
    })
}

/// Mock Ollama backend plus a service pointed at it.
pub struct TestBackend {
    pub server: MockServer,
}

impl TestBackend {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Fast retries (10ms base, no jitter) so retry tests stay quick.
    pub fn config(&self, api_key: Option<&str>) -> ServiceConfig {
        ServiceConfig {
            host: self.server.uri(),
            model: "llama3.2".into(),
            api_key: api_key.map(ApiKey::new),
            timeout_secs: 2,
            retry: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 10,
                max_delay_ms: 100,
                jitter_ratio: 0.0,
            },
        }
    }

    pub fn service(&self) -> AiService {
        AiService::new(self.config(None)).unwrap()
    }

    pub fn service_with_key(&self, key: &str) -> AiService {
        AiService::new(self.config(Some(key))).unwrap()
    }

    /// Every chat request gets `content` as the model reply.
    pub async fn reply_with(&self, content: &str) {
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ollama_response(content)))
            .mount(&self.server)
            .await;
    }

    /// The next `times` chat requests get status `status`.
    pub async fn fail_next(&self, status: u16, times: u64) {
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_json(serde_json::json!({"error": format!("status {status}")})),
            )
            .up_to_n_times(times)
            .mount(&self.server)
            .await;
    }

    /// Every chat request stalls for `delay` before replying.
    pub async fn stall(&self, delay: Duration) {
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(ollama_response("{}"))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|r| r.len())
            .unwrap_or(0)
    }

    /// JSON bodies of all chat requests received so far.
    pub async fn request_bodies(&self) -> Vec<serde_json::Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect()
    }
}

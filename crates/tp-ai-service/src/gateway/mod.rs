//! Model gateway - one prompt in, raw model text out.
//!
//! `ModelGateway` trait with `invoke`. Three impls:
//! - `OllamaGateway` - HTTP client for Ollama's `/api/chat` (local or cloud)
//! - `RetryingGateway` - wraps any gateway with bounded exponential backoff
//! - `MockGateway` - scripted replies and call recording (in `mock.rs`)

pub mod mock;
pub mod ollama;
pub mod retry;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::AiResult;

pub use mock::MockGateway;
pub use ollama::OllamaGateway;
pub use retry::{RetryPolicy, RetryingGateway};

/// Shape the caller expects the model reply to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Text,
    /// Ask the backend to constrain output to a JSON object.
    Json,
}

/// Per-call options for [`ModelGateway::invoke`].
#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    /// System instruction sent ahead of the prompt.
    pub system: Option<String>,
    pub format: ResponseFormat,
    /// Per-attempt deadline. Falls back to the gateway's configured timeout.
    pub deadline: Option<Duration>,
}

impl InvokeOptions {
    pub fn json() -> Self {
        Self {
            format: ResponseFormat::Json,
            ..Self::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Trait for backends that turn a prompt into model text.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Send `prompt` to the model and return its raw textual reply.
    ///
    /// Never returns empty text on success; transport and protocol failures
    /// are reported as classified `AiError`s.
    async fn invoke(&self, prompt: &str, options: &InvokeOptions) -> AiResult<String>;

    /// Name of this gateway (for logging).
    fn name(&self) -> &str;
}

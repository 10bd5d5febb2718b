//! Mock model gateway for testing.
//!
//! Supports scripted reply queues and call recording. Unit and E2E tests use
//! this instead of a live model backend so the suite runs offline.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{InvokeOptions, ModelGateway};
use crate::error::{AiError, AiResult};

/// A recorded `invoke` call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub prompt: String,
    pub system: Option<String>,
    pub at: Instant,
}

/// Mock gateway with scripted replies and call recording.
pub struct MockGateway {
    /// Replies returned by `invoke` in FIFO order.
    replies: Mutex<VecDeque<AiResult<String>>>,
    /// Returned once the queue is empty.
    fallback: AiResult<String>,
    /// Every call made (for test assertions).
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockGateway {
    /// Always reply with `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self::build(Vec::new(), Ok(text.into()))
    }

    /// Always fail with `err`.
    pub fn failing(err: AiError) -> Self {
        Self::build(Vec::new(), Err(err))
    }

    /// Return `replies` in order; once exhausted, fail with `InvalidResponse`.
    pub fn with_replies(replies: Vec<AiResult<String>>) -> Self {
        Self::build(
            replies,
            Err(AiError::InvalidResponse("mock reply queue exhausted".into())),
        )
    }

    fn build(replies: Vec<AiResult<String>>, fallback: AiResult<String>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue an additional reply.
    pub fn queue_reply(&self, reply: AiResult<String>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Get copies of all recorded calls.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Timestamps of all calls, on the tokio clock.
    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|c| c.at).collect()
    }

    /// Prompt of the most recent call, if any.
    pub fn last_prompt(&self) -> Option<String> {
        self.calls.lock().unwrap().last().map(|c| c.prompt.clone())
    }
}

#[async_trait]
impl ModelGateway for MockGateway {
    async fn invoke(&self, prompt: &str, options: &InvokeOptions) -> AiResult<String> {
        self.calls.lock().unwrap().push(RecordedCall {
            prompt: prompt.to_string(),
            system: options.system.clone(),
            at: Instant::now(),
        });
        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

//! Retry decorator - bounded exponential backoff with jitter.
//!
//! Retries only timeouts, rate limiting and 5xx responses. Auth failures,
//! connection failures and rejected requests surface after one attempt.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{InvokeOptions, ModelGateway};
use crate::config::RetryConfig;
use crate::error::{AiError, AiResult};

/// Backoff schedule derived from [`RetryConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_ratio: f64,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter_ratio: 0.0,
        }
    }

    /// Delay before the next attempt, without jitter.
    ///
    /// `failed_attempt` is 1-based: the delay after the first failure is
    /// `base_delay`, then `2 * base_delay`, and so on, capped at `max_delay`.
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        let exp = failed_attempt.saturating_sub(1).min(31);
        let millis = (self.base_delay.as_millis() as u64).saturating_mul(1_u64 << exp);
        Duration::from_millis(millis).min(self.max_delay)
    }

    /// Delay before the next attempt, including jitter and any server hint.
    pub fn delay_for(&self, failed_attempt: u32, err: &AiError) -> Duration {
        if let AiError::RateLimited {
            retry_after: Some(hint),
        } = err
        {
            return (*hint).min(self.max_delay);
        }
        let delay = self.backoff(failed_attempt);
        if self.jitter_ratio <= 0.0 {
            return delay;
        }
        let ratio = self.jitter_ratio.min(1.0);
        delay + delay.mul_f64(ratio * rand::random::<f64>())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter_ratio: config.jitter_ratio,
        }
    }
}

/// Gateway decorator that re-invokes `inner` on retryable failures.
pub struct RetryingGateway<G> {
    inner: G,
    policy: RetryPolicy,
}

impl<G: ModelGateway> RetryingGateway<G> {
    pub fn new(inner: G, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<G: ModelGateway> ModelGateway for RetryingGateway<G> {
    async fn invoke(&self, prompt: &str, options: &InvokeOptions) -> AiResult<String> {
        let mut attempt = 1;
        loop {
            match self.inner.invoke(prompt, options).await {
                Ok(text) => {
                    if attempt > 1 {
                        tracing::debug!(attempt, "model request succeeded after retry");
                    }
                    return Ok(text);
                }
                Err(e) if e.is_retryable() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay_for(attempt, &e);
                    tracing::info!(
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        kind = %e.kind(),
                        "retrying model request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        tracing::warn!(attempts = attempt, error = %e, "model request retries exhausted");
                    }
                    return Err(e);
                }
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[async_trait]
impl<G: ModelGateway + ?Sized> ModelGateway for Arc<G> {
    async fn invoke(&self, prompt: &str, options: &InvokeOptions) -> AiResult<String> {
        (**self).invoke(prompt, options).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

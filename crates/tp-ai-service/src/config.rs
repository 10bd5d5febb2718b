//! AI service configuration, loadable from TOML or environment.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{AiError, AiResult};

/// Opaque API credential. Never printed by `Debug` or `Display`.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw secret, for building the `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Short preview safe for diagnostics output: "sk-abc...".
    pub fn masked(&self) -> String {
        let prefix: String = self.0.chars().take(6).collect();
        format!("{prefix}...")
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("***")
    }
}

/// Backoff settings for retryable gateway failures.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles on every further attempt.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on any single delay, including server-sent Retry-After.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Random extra delay as a fraction of the computed delay (0.0 - 1.0).
    #[serde(default = "default_jitter_ratio")]
    pub jitter_ratio: f64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    8_000
}
fn default_jitter_ratio() -> f64 {
    0.25
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ratio: default_jitter_ratio(),
        }
    }
}

/// Connection settings for the model backend. Built once, read-only after.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Backend base URL, e.g. `http://localhost:11434` or `https://ollama.com`.
    #[serde(default = "default_host")]
    pub host: String,
    /// Model identifier passed through to the backend.
    #[serde(default = "default_model")]
    pub model: String,
    /// Bearer credential. `None` for unauthenticated local backends.
    #[serde(default)]
    pub api_key: Option<ApiKey>,
    /// Per-attempt deadline in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_host() -> String {
    "http://localhost:11434".into()
}
fn default_model() -> String {
    "llama3.2".into()
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            model: default_model(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            retry: RetryConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn new(host: impl Into<String>, model: impl Into<String>, api_key: Option<ApiKey>) -> Self {
        Self {
            host: host.into(),
            model: model.into(),
            api_key,
            ..Self::default()
        }
    }

    /// Load config from `OLLAMA_*` environment variables. Unset variables
    /// fall back to defaults; an empty API key counts as absent.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        Self {
            host: non_empty("OLLAMA_HOST").unwrap_or(defaults.host),
            model: non_empty("OLLAMA_MODEL").unwrap_or(defaults.model),
            api_key: non_empty("OLLAMA_API_KEY").map(ApiKey::new),
            timeout_secs: non_empty("OLLAMA_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_secs),
            retry: defaults.retry,
        }
    }

    /// Load config from a TOML file path.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AiResult<()> {
        if self.model.trim().is_empty() {
            return Err(AiError::InvalidInput("model must not be empty".into()));
        }
        if !(self.host.starts_with("http://") || self.host.starts_with("https://")) {
            return Err(AiError::InvalidInput(format!(
                "host must be an http(s) URL, got '{}'",
                self.host
            )));
        }
        if self.timeout_secs == 0 {
            return Err(AiError::InvalidInput("timeout_secs must be > 0".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(AiError::InvalidInput("retry.max_attempts must be > 0".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

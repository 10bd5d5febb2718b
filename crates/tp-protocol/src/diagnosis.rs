use serde::{Deserialize, Serialize};

use crate::origin::ResultOrigin;

/// What was happening when a test step failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureContext {
    /// Last action attempted, e.g. "click Login button".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_action: Option<String>,
    /// Page URL at the time of failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    /// 1-based step number within the test case.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_number: Option<u32>,
}

impl FailureContext {
    pub fn is_empty(&self) -> bool {
        self.last_action.is_none() && self.page_url.is_none() && self.step_number.is_none()
    }
}

/// A raw failure signal from a test run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureSignal {
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<FailureContext>,
}

impl FailureSignal {
    pub fn new(error_message: impl Into<String>) -> Self {
        Self {
            error_message: error_message.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: FailureContext) -> Self {
        self.context = Some(context);
        self
    }
}

/// Root-cause class of a test failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureCategory {
    LocatorNotFound,
    Timing,
    AssertionMismatch,
    Environment,
    Unknown,
}

impl FailureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocatorNotFound => "locator-not-found",
            Self::Timing => "timing",
            Self::AssertionMismatch => "assertion-mismatch",
            Self::Environment => "environment",
            Self::Unknown => "unknown",
        }
    }

    /// Map a model-supplied category label. Accepts kebab-case, snake_case
    /// and spaced spellings plus a few common aliases.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        let category = match normalized.as_str() {
            "locator-not-found" | "element-not-found" | "locator" | "selector-not-found" => {
                Self::LocatorNotFound
            }
            "timing" | "timeout" | "race-condition" | "synchronization" => Self::Timing,
            "assertion-mismatch" | "assertion" | "assertion-failure" | "mismatch" => {
                Self::AssertionMismatch
            }
            "environment" | "env" | "network" | "infrastructure" | "configuration" => {
                Self::Environment
            }
            "unknown" | "other" => Self::Unknown,
            _ => return None,
        };
        Some(category)
    }
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured root-cause diagnosis of a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCauseReport {
    pub category: FailureCategory,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub origin: ResultOrigin,
}

impl RootCauseReport {
    pub fn is_degraded(&self) -> bool {
        self.origin.is_degraded() || self.category == FailureCategory::Unknown
    }
}

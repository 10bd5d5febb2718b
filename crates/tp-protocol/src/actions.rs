use serde::{Deserialize, Serialize};

use crate::origin::ResultOrigin;

/// A natural-language instruction from a test author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Free-form instruction, e.g. "click on Login button".
    pub text: String,
}

impl CommandRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// The kind of UI action an instruction maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Click,
    Type,
    Navigate,
    Wait,
    Assert,
    Unknown,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Type => "type",
            Self::Navigate => "navigate",
            Self::Wait => "wait",
            Self::Assert => "assert",
            Self::Unknown => "unknown",
        }
    }

    /// Map a model-supplied action label to an `ActionType`.
    ///
    /// Accepts the canonical names plus the synonyms models tend to produce
    /// ("fill", "goto", "verify", ...). Returns `None` for anything else.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let action = match normalized.as_str() {
            "click" | "tap" | "press" | "double_click" | "select" | "check_box" => Self::Click,
            "type" | "fill" | "input" | "enter" | "enter_text" | "type_text" => Self::Type,
            "navigate" | "goto" | "go_to" | "open" | "visit" | "open_url" => Self::Navigate,
            "wait" | "sleep" | "pause" | "wait_for" => Self::Wait,
            "assert" | "verify" | "check" | "expect" | "validate" => Self::Assert,
            "unknown" | "none" => Self::Unknown,
            _ => return None,
        };
        Some(action)
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured, executable test action derived from an instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub action_type: ActionType,
    /// Element locator or human description of the target. For
    /// `Unknown` actions this carries the original instruction text.
    pub target: String,
    /// Text to type, URL to open, duration to wait, expected text, ...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Confidence score (0.0 - 1.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// How this descriptor was produced.
    #[serde(default)]
    pub origin: ResultOrigin,
    /// The model's reply, kept only for degraded results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl ActionDescriptor {
    /// The degraded result used when nothing could be recovered.
    pub fn unknown(instruction: &str, raw: Option<String>) -> Self {
        Self {
            action_type: ActionType::Unknown,
            target: instruction.to_string(),
            value: None,
            confidence: Some(0.0),
            origin: ResultOrigin::Unparsed,
            raw,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.origin.is_degraded() || self.action_type == ActionType::Unknown
    }
}

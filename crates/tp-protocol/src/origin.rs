use serde::{Deserialize, Serialize};

/// How a structured result was produced from the model's reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResultOrigin {
    /// The reply parsed cleanly against the expected JSON schema.
    #[default]
    Structured,
    /// The reply was free text; fields were recovered by keyword matching.
    Heuristic,
    /// Nothing usable could be recovered from the reply.
    Unparsed,
}

impl ResultOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::Heuristic => "heuristic",
            Self::Unparsed => "unparsed",
        }
    }

    /// True when the service answered but the answer should be treated
    /// as a low-confidence guess.
    pub fn is_degraded(&self) -> bool {
        !matches!(self, Self::Structured)
    }
}

impl std::fmt::Display for ResultOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

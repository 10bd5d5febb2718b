//! Keyword heuristics used when a model reply is not valid JSON.
//!
//! Recovers an action from free-text replies ("Click the Login button.") and
//! a failure category from free-text diagnoses. Everything produced here is
//! a degraded result and carries [`HEURISTIC_CONFIDENCE`].

use std::sync::LazyLock;

use regex::Regex;
use tp_protocol::{ActionType, FailureCategory};

/// Confidence assigned to heuristic results.
pub const HEURISTIC_CONFIDENCE: f64 = 0.5;

/// An action recovered from free text.
#[derive(Debug, Clone, PartialEq)]
pub struct GuessedAction {
    pub action_type: ActionType,
    pub target: String,
    pub value: Option<String>,
}

// ── Action verbs ──────────────────────────────────────────────

const VERBS: &str =
    r"click|tap|press|type|enter|fill|input|navigate|go\s+to|open|visit|wait|pause|assert|verify|check|expect";

static VERB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b(?P<verb>{VERBS})\b(?P<rest>[^\n!?]*)")).unwrap()
});

static VERB_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)\b({VERBS})\b")).unwrap());

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s"'`<>)]+"#).unwrap());

static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["'`“‘](?P<q>[^"'`”’]+)["'`”’]"#).unwrap());

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?P<n>\d+(?:\.\d+)?)\s*(?P<unit>ms|milliseconds?|s|secs?|seconds?|minutes?|mins?)\b")
        .unwrap()
});

/// Filler words dropped from the front of a target phrase.
const LEADING_FILLER: &[&str] = &["on", "the", "a", "an", "to", "at", "for", "that", "in", "into"];

/// Best-effort action extraction from free text.
///
/// Returns `None` when no action verb with a usable target is found.
pub fn guess_action(text: &str) -> Option<GuessedAction> {
    let caps = VERB_RE.captures(text)?;
    let verb = &caps["verb"];
    let rest = first_sentence(&caps["rest"]);

    let action_type = verb_action(verb)?;

    let guess = match action_type {
        ActionType::Navigate => {
            let url = URL_RE.find(text).map(|m| m.as_str().trim_end_matches(['.', ',']).to_string());
            let target = url.clone().or_else(|| clean_target(rest))?;
            GuessedAction {
                action_type,
                target,
                value: url,
            }
        }
        ActionType::Type => guess_type(rest)?,
        ActionType::Wait => {
            let value = DURATION_RE.find(rest).map(|m| m.as_str().to_string());
            let target = DURATION_RE
                .replace(rest, "")
                .split_once(" for ")
                .and_then(|(_, t)| clean_target(t))
                .or_else(|| clean_target(&DURATION_RE.replace(rest, "")))
                .unwrap_or_else(|| "page".to_string());
            GuessedAction {
                action_type,
                target,
                value,
            }
        }
        _ => GuessedAction {
            action_type,
            target: clean_target(rest)?,
            value: None,
        },
    };
    Some(guess)
}

/// Every action kind named by a verb anywhere in `text`, in order.
pub fn named_actions(text: &str) -> Vec<ActionType> {
    VERB_WORD_RE
        .find_iter(text)
        .filter_map(|m| verb_action(m.as_str()))
        .collect()
}

fn verb_action(verb: &str) -> Option<ActionType> {
    let verb = verb.to_ascii_lowercase();
    let action_type = match verb.split_whitespace().next()? {
        "click" | "tap" | "press" => ActionType::Click,
        "type" | "enter" | "fill" | "input" => ActionType::Type,
        "navigate" | "go" | "open" | "visit" => ActionType::Navigate,
        "wait" | "pause" => ActionType::Wait,
        _ => ActionType::Assert,
    };
    Some(action_type)
}

/// `type "alice" into the Email field` / `enter alice in Email`.
fn guess_type(rest: &str) -> Option<GuessedAction> {
    if let Some(caps) = QUOTED_RE.captures(rest) {
        let value = caps["q"].to_string();
        let whole = caps.get(0)?;
        let after = &rest[whole.end()..];
        let target = clean_target(after).or_else(|| clean_target(&rest[..whole.start()]))?;
        return Some(GuessedAction {
            action_type: ActionType::Type,
            target,
            value: Some(value),
        });
    }

    for sep in [" into ", " in ", " on "] {
        if let Some((value, target)) = rest.split_once(sep) {
            if let (Some(value), Some(target)) = (clean_target(value), clean_target(target)) {
                return Some(GuessedAction {
                    action_type: ActionType::Type,
                    target,
                    value: Some(value),
                });
            }
        }
    }

    Some(GuessedAction {
        action_type: ActionType::Type,
        target: clean_target(rest)?,
        value: None,
    })
}

/// Cut at the first sentence-ending period (but not inside "www.x.com").
fn first_sentence(rest: &str) -> &str {
    match rest.find(". ") {
        Some(idx) => &rest[..idx],
        None => rest.trim_end_matches('.'),
    }
}

/// Strip filler words, quotes and trailing punctuation from a phrase.
fn clean_target(phrase: &str) -> Option<String> {
    let mut words: Vec<&str> = phrase.split_whitespace().collect();
    while let Some(first) = words.first() {
        if LEADING_FILLER.contains(&first.to_ascii_lowercase().as_str()) {
            words.remove(0);
        } else {
            break;
        }
    }
    let joined = words.join(" ");
    let cleaned = joined
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '“' | '”' | '‘' | '’' | ',' | ';' | ':' | '.'))
        .replace(['"', '`', '“', '”'], "");
    let cleaned = cleaned.trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

// ── Failure categories ────────────────────────────────────────

struct FailurePattern {
    category: FailureCategory,
    regex: Regex,
    suggestion: &'static str,
}

impl FailurePattern {
    fn new(category: FailureCategory, pattern: &str, suggestion: &'static str) -> Self {
        Self {
            category,
            regex: Regex::new(pattern).unwrap(),
            suggestion,
        }
    }
}

/// Checked in order; the first match wins.
static FAILURE_PATTERNS: LazyLock<Vec<FailurePattern>> = LazyLock::new(|| {
    vec![
        FailurePattern::new(
            FailureCategory::LocatorNotFound,
            r"(?i)(element\s+(was\s+)?not\s+found|no\s+such\s+element|unable\s+to\s+locate|could\s+not\s+(find|locate)|locator|selector|not\s+(visible|attached|interactable)|stale\s+element|missing\s+from\s+(the\s+)?dom)",
            "Verify the element locator against the current page markup",
        ),
        FailurePattern::new(
            FailureCategory::AssertionMismatch,
            r"(?i)(assert(ion)?|expected\b.*\b(but|got|received|actual)|mismatch|does\s+not\s+(match|equal|contain)|to\s+(equal|contain)\b)",
            "Check the expected value against the application's current behaviour",
        ),
        FailurePattern::new(
            FailureCategory::Environment,
            r"(?i)(connection\s+(refused|reset)|ECONNREFUSED|ECONNRESET|ERR_NAME_NOT_RESOLVED|\b(dns|ssl|tls)\b|network\s+(error|unreachable)|certificate|browser\s+(crashed|closed|disconnected)|out\s+of\s+memory|permission\s+denied|service\s+unavailable|\b50[023]\b|environment|configuration)",
            "Check that the application under test and its dependencies are reachable",
        ),
        FailurePattern::new(
            FailureCategory::Timing,
            r"(?i)(time\s*out|timed?\s*out|waiting\s+for|race\s+condition|not\s+(yet\s+)?(ready|loaded)|still\s+loading|took\s+too\s+long|deadline\s+exceeded|flaky)",
            "Add an explicit wait for the element or page state before acting",
        ),
    ]
});

/// Keyword classification of a failure description.
pub fn classify_failure(text: &str) -> Option<FailureCategory> {
    FAILURE_PATTERNS
        .iter()
        .find(|p| p.regex.is_match(text))
        .map(|p| p.category)
}

/// Generic remediation hint for a category.
pub fn suggested_fix(category: FailureCategory) -> Option<&'static str> {
    FAILURE_PATTERNS
        .iter()
        .find(|p| p.category == category)
        .map(|p| p.suggestion)
}

//! Helpers for pulling structured data out of model replies.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A decoded JSON object from a model reply.
pub type JsonObject = Map<String, Value>;

/// Extract JSON from LLM output that may be wrapped in markdown code blocks
/// or surrounded by prose.
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();

    // Try ```json ... ``` first
    if let Some(start) = trimmed.find("```json") {
        let after_fence = &trimmed[start + 7..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }

    // Try ``` ... ```
    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }

    // Outermost braces, for "Sure! {...} Hope this helps."
    if !trimmed.starts_with('{') {
        if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
            if start < end {
                return &trimmed[start..=end];
            }
        }
    }

    // Assume raw JSON
    trimmed
}

/// Strict structured parse of a model reply into `T`.
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(extract_json(text))
}

/// Strict parse of a model reply into a JSON object.
pub fn parse_object(text: &str) -> Result<JsonObject, serde_json::Error> {
    parse_structured(text)
}

/// Value of the first key in `keys` that is present and not `null`.
///
/// Models mix synonyms freely ("target" next to "selector"), so keys are
/// tried in priority order instead of rejecting the object.
pub fn first_field<'a>(object: &'a JsonObject, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| object.get(*k))
        .find(|v| !v.is_null())
}

/// First key in `keys` holding a non-blank string.
pub fn first_text(object: &JsonObject, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| object.get(*k).and_then(Value::as_str))
        .find_map(|s| non_empty(Some(s.to_string())))
}

/// Trimmed, non-empty string or `None`.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

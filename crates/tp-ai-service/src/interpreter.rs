//! Command interpreter - natural-language test steps to structured actions.
//!
//! Asks the model for a JSON action, then parses the reply in three tiers:
//! strict JSON, keyword heuristics over the reply text, and finally an
//! `unknown` descriptor that carries the original instruction. Only gateway
//! failures are errors; a reply that cannot be understood degrades.

use std::sync::Arc;

use tp_protocol::{ActionDescriptor, ActionType, CommandRequest, ResultOrigin};

use crate::error::{AiError, AiResult};
use crate::gateway::{InvokeOptions, ModelGateway};
use crate::heuristics::{self, HEURISTIC_CONFIDENCE};
use crate::parse::{self, JsonObject, non_empty};

/// System prompt describing the action schema.
const SYSTEM_PROMPT: &str = r#"You convert natural-language UI test steps into a single structured action for a browser automation engine.

Allowed actions:

1. click - click or tap an element.
   Example: "click on Login button" -> {"action": "click", "target": "Login button"}

2. type - type text into an input field. "value" is the text to type.
   Example: "enter admin@example.com in the email field" -> {"action": "type", "target": "email field", "value": "admin@example.com"}

3. navigate - open a page. "target" and "value" are the URL or page name.
   Example: "go to https://app.example.com/login" -> {"action": "navigate", "target": "https://app.example.com/login", "value": "https://app.example.com/login"}

4. wait - wait for an element or a duration. "value" is the duration if one is given.
   Example: "wait 3 seconds for the spinner" -> {"action": "wait", "target": "spinner", "value": "3 seconds"}

5. assert - verify that something is true on the page. "value" is the expected text, if any.
   Example: "verify the heading says Dashboard" -> {"action": "assert", "target": "heading", "value": "Dashboard"}

Respond with ONLY a JSON object (no markdown, no explanation):
{"action": "<click|type|navigate|wait|assert>", "target": "<element description or locator>", "value": "<optional>", "confidence": <0.0-1.0>}

If the step cannot be mapped to any action, respond with:
{"action": "unknown", "target": "", "confidence": 0.0}"#;

/// Action fields pulled from the model's JSON object. Each field accepts a
/// few synonyms, tried in order.
#[derive(Debug)]
struct LlmAction {
    action: Option<String>,
    target: Option<String>,
    value: Option<serde_json::Value>,
    confidence: Option<f64>,
}

impl LlmAction {
    fn from_object(object: &JsonObject) -> Self {
        Self {
            action: parse::first_text(object, &["action", "action_type", "actionType", "type"]),
            target: parse::first_text(object, &["target", "element", "selector", "locator"]),
            value: parse::first_field(object, &["value", "text", "url"]).cloned(),
            confidence: parse::first_field(object, &["confidence"]).and_then(serde_json::Value::as_f64),
        }
    }
}

/// Turns instructions into [`ActionDescriptor`]s via a [`ModelGateway`].
#[derive(Clone)]
pub struct CommandInterpreter {
    gateway: Arc<dyn ModelGateway>,
}

impl CommandInterpreter {
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self { gateway }
    }

    /// Interpret one instruction.
    ///
    /// Fails fast with `InvalidInput` on blank text, without calling the
    /// gateway. Gateway errors propagate unchanged.
    pub async fn parse_command(&self, text: &str) -> AiResult<ActionDescriptor> {
        let instruction = text.trim();
        if instruction.is_empty() {
            return Err(AiError::InvalidInput("command text must not be empty".into()));
        }

        let options = InvokeOptions::json().with_system(SYSTEM_PROMPT);
        let reply = self.gateway.invoke(instruction, &options).await?;
        let descriptor = interpret_reply(instruction, &reply);

        if descriptor.is_degraded() {
            tracing::warn!(
                instruction,
                origin = %descriptor.origin,
                action = %descriptor.action_type,
                "command interpreted with low confidence"
            );
        } else {
            tracing::debug!(
                instruction,
                action = %descriptor.action_type,
                target = %descriptor.target,
                "command interpreted"
            );
        }
        Ok(descriptor)
    }

    pub async fn parse_request(&self, request: &CommandRequest) -> AiResult<ActionDescriptor> {
        self.parse_command(&request.text).await
    }

    /// Interpret a multi-line test script, one step per non-blank line.
    ///
    /// Lines starting with `#` or `//` are comments. Leading list markers
    /// ("1.", "-", "*") are stripped. Stops at the first gateway error.
    pub async fn parse_script(&self, script: &str) -> AiResult<Vec<ActionDescriptor>> {
        let steps: Vec<&str> = script_steps(script).collect();
        if steps.is_empty() {
            return Err(AiError::InvalidInput("script contains no steps".into()));
        }

        let mut actions = Vec::with_capacity(steps.len());
        for step in steps {
            actions.push(self.parse_command(step).await?);
        }
        Ok(actions)
    }
}

/// Non-comment script lines with list markers removed.
fn script_steps(script: &str) -> impl Iterator<Item = &str> {
    script
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with("//"))
        .map(|l| {
            let l = l.trim_start_matches(['-', '*']).trim_start();
            let digits = l.len() - l.trim_start_matches(|c: char| c.is_ascii_digit()).len();
            if digits > 0 && l[digits..].starts_with(['.', ')']) {
                l[digits + 1..].trim_start()
            } else {
                l
            }
        })
        .filter(|l| !l.is_empty())
}

/// Turn a model reply into a descriptor. Never fails.
///
/// Prose heuristics only run on replies that are not JSON, and only when
/// the instruction itself names the guessed kind of action.
fn interpret_reply(instruction: &str, reply: &str) -> ActionDescriptor {
    match parse::parse_object(reply) {
        Ok(object) => {
            let call = LlmAction::from_object(&object);
            return from_structured(instruction, reply, call)
                .unwrap_or_else(|| ActionDescriptor::unknown(instruction, Some(reply.to_string())));
        }
        Err(e) => {
            tracing::debug!(error = %e, "model reply is not a JSON action, trying heuristics");
        }
    }

    let guess = heuristics::guess_action(reply)
        .filter(|g| heuristics::named_actions(instruction).contains(&g.action_type));
    match guess {
        Some(guess) => ActionDescriptor {
            action_type: guess.action_type,
            target: guess.target,
            value: guess.value,
            confidence: Some(HEURISTIC_CONFIDENCE),
            origin: ResultOrigin::Heuristic,
            raw: Some(reply.to_string()),
        },
        None => ActionDescriptor::unknown(instruction, Some(reply.to_string())),
    }
}

/// Validate a decoded JSON action. `None` means the JSON was unusable
/// (missing or unrecognised action label) and the result is `unknown`.
fn from_structured(instruction: &str, reply: &str, call: LlmAction) -> Option<ActionDescriptor> {
    let label = non_empty(call.action)?;
    let Some(action_type) = ActionType::from_label(&label) else {
        tracing::warn!(label = %label, "model returned unknown action label");
        return None;
    };
    let confidence = call.confidence.map(|c| c.clamp(0.0, 1.0));

    if action_type == ActionType::Unknown {
        return Some(ActionDescriptor {
            confidence: confidence.or(Some(0.0)),
            origin: ResultOrigin::Structured,
            ..ActionDescriptor::unknown(instruction, Some(reply.to_string()))
        });
    }

    // Model named an action but no target: recover it from the instruction.
    let target = non_empty(call.target)
        .or_else(|| heuristics::guess_action(instruction).map(|g| g.target))
        .unwrap_or_else(|| instruction.to_string());

    Some(ActionDescriptor {
        action_type,
        target,
        value: call.value.and_then(value_text),
        confidence,
        origin: ResultOrigin::Structured,
        raw: None,
    })
}

/// Render a JSON scalar as text; `null`, blanks and containers are dropped.
fn value_text(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => non_empty(Some(s)),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockGateway;

    fn interpreter_with(mock: Arc<MockGateway>) -> CommandInterpreter {
        CommandInterpreter::new(mock)
    }

    #[tokio::test]
    async fn structured_click() {
        let mock = Arc::new(MockGateway::replying(
            r#"{"action":"click","target":"Login button"}"#,
        ));
        let interpreter = interpreter_with(Arc::clone(&mock));

        let action = interpreter.parse_command("click on Login button").await.unwrap();
        assert_eq!(action.action_type, ActionType::Click);
        assert_eq!(action.target, "Login button");
        assert!(action.value.is_none());
        assert_eq!(action.origin, ResultOrigin::Structured);
        assert!(action.raw.is_none());

        let call = &mock.calls()[0];
        assert_eq!(call.prompt, "click on Login button");
        assert_eq!(call.system.as_deref(), Some(SYSTEM_PROMPT));
    }

    #[tokio::test]
    async fn structured_type_with_value_and_confidence() {
        let mock = Arc::new(MockGateway::replying(
            "```json\n{\"action\": \"fill\", \"target\": \"Email\", \"value\": \"a@b.c\", \"confidence\": 0.9}\n```",
        ));
        let action = interpreter_with(mock)
            .parse_command("put a@b.c in Email")
            .await
            .unwrap();
        assert_eq!(action.action_type, ActionType::Type);
        assert_eq!(action.target, "Email");
        assert_eq!(action.value.as_deref(), Some("a@b.c"));
        assert_eq!(action.confidence, Some(0.9));
    }

    #[tokio::test]
    async fn numeric_value_rendered_and_confidence_clamped() {
        let mock = Arc::new(MockGateway::replying(
            r#"{"action":"wait","target":"page","value":3,"confidence":7}"#,
        ));
        let action = interpreter_with(mock).parse_command("wait 3").await.unwrap();
        assert_eq!(action.action_type, ActionType::Wait);
        assert_eq!(action.value.as_deref(), Some("3"));
        assert_eq!(action.confidence, Some(1.0));
    }

    #[tokio::test]
    async fn missing_target_recovered_from_instruction() {
        let mock = Arc::new(MockGateway::replying(r#"{"action":"click"}"#));
        let action = interpreter_with(mock)
            .parse_command("click on Login button")
            .await
            .unwrap();
        assert_eq!(action.action_type, ActionType::Click);
        assert_eq!(action.target, "Login button");
    }

    #[tokio::test]
    async fn model_says_unknown() {
        let mock = Arc::new(MockGateway::replying(
            r#"{"action":"unknown","target":"","confidence":0.0}"#,
        ));
        let action = interpreter_with(mock).parse_command("bake a pizza").await.unwrap();
        assert_eq!(action.action_type, ActionType::Unknown);
        assert_eq!(action.target, "bake a pizza");
        assert!(action.is_degraded());
    }

    #[tokio::test]
    async fn free_text_reply_uses_heuristics() {
        let mock = Arc::new(MockGateway::replying(
            "Sure! You should click the Login button.",
        ));
        let action = interpreter_with(mock)
            .parse_command("click on Login button")
            .await
            .unwrap();
        assert_eq!(action.action_type, ActionType::Click);
        assert!(action.target.contains("Login button"));
        assert_eq!(action.origin, ResultOrigin::Heuristic);
        assert_eq!(action.confidence, Some(HEURISTIC_CONFIDENCE));
        assert!(action.raw.is_some());
    }

    #[tokio::test]
    async fn unrecognised_label_is_unknown() {
        let mock = Arc::new(MockGateway::replying(r#"{"action":"hover","target":"menu"}"#));
        let action = interpreter_with(mock).parse_command("hover menu").await.unwrap();
        assert_eq!(action.action_type, ActionType::Unknown);
        assert_eq!(action.target, "hover menu");
        assert_eq!(action.origin, ResultOrigin::Unparsed);
    }

    #[tokio::test]
    async fn decoded_json_never_scanned_as_prose() {
        let mock = Arc::new(MockGateway::with_replies(vec![
            Ok(r#"{"action":"double-tap","target":"Row 1"}"#.into()),
            Ok(r#"{"target":"click the Save button"}"#.into()),
        ]));
        let interpreter = interpreter_with(mock);

        let action = interpreter.parse_command("double-tap Row 1").await.unwrap();
        assert_eq!(action.action_type, ActionType::Unknown);
        assert_eq!(action.target, "double-tap Row 1");
        assert_eq!(action.origin, ResultOrigin::Unparsed);

        let action = interpreter.parse_command("click Save").await.unwrap();
        assert_eq!(action.action_type, ActionType::Unknown);
        assert_eq!(action.target, "click Save");
    }

    #[tokio::test]
    async fn primary_and_synonym_keys_together() {
        let mock = Arc::new(MockGateway::with_replies(vec![
            Ok(r##"{"action":"click","target":"Login button","selector":"#login"}"##.into()),
            Ok(r#"{"type":"type","action":"fill","element":"Email","text":"bob","value":"alice"}"#.into()),
        ]));
        let interpreter = interpreter_with(mock);

        let action = interpreter.parse_command("click on Login button").await.unwrap();
        assert_eq!(action.action_type, ActionType::Click);
        assert_eq!(action.target, "Login button");
        assert_eq!(action.origin, ResultOrigin::Structured);

        let action = interpreter.parse_command("fill alice in Email").await.unwrap();
        assert_eq!(action.action_type, ActionType::Type);
        assert_eq!(action.target, "Email");
        assert_eq!(action.value.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn refusal_prose_does_not_invent_an_action() {
        let mock = Arc::new(MockGateway::replying(
            "Sorry, I cannot map that. Please check the instruction and try again.",
        ));
        let action = interpreter_with(mock)
            .parse_command("click on Login button")
            .await
            .unwrap();
        assert_eq!(action.action_type, ActionType::Unknown);
        assert_eq!(action.target, "click on Login button");
        assert_eq!(action.origin, ResultOrigin::Unparsed);
    }

    #[tokio::test]
    async fn unparseable_reply_degrades_to_unknown() {
        let mock = Arc::new(MockGateway::replying("this is not json at all"));
        let action = interpreter_with(mock)
            .parse_command("click on Login button")
            .await
            .unwrap();
        assert_eq!(action.action_type, ActionType::Unknown);
        assert_eq!(action.target, "click on Login button");
        assert_eq!(action.raw.as_deref(), Some("this is not json at all"));
        assert_eq!(action.origin, ResultOrigin::Unparsed);
    }

    #[tokio::test]
    async fn blank_input_never_reaches_gateway() {
        let mock = Arc::new(MockGateway::replying("{}"));
        let interpreter = interpreter_with(Arc::clone(&mock));

        for input in ["", "   ", "\n\t"] {
            let err = interpreter.parse_command(input).await.unwrap_err();
            assert!(matches!(err, AiError::InvalidInput(_)));
        }
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn gateway_error_propagates() {
        let mock = Arc::new(MockGateway::failing(AiError::Auth { status: 401 }));
        let err = interpreter_with(mock)
            .parse_command("click on Login button")
            .await
            .unwrap_err();
        assert_eq!(err, AiError::Auth { status: 401 });
    }

    #[tokio::test]
    async fn script_steps_interpreted_in_order() {
        let mock = Arc::new(MockGateway::with_replies(vec![
            Ok(r#"{"action":"navigate","target":"https://app.test","value":"https://app.test"}"#.into()),
            Ok(r#"{"action":"type","target":"Email","value":"bob"}"#.into()),
            Ok(r#"{"action":"click","target":"Login button"}"#.into()),
        ]));
        let interpreter = interpreter_with(Arc::clone(&mock));

        let script = "# login flow\n1. open https://app.test\n\n- type bob in Email\n3) click Login button\n";
        let actions = interpreter.parse_script(script).await.unwrap();

        let kinds: Vec<ActionType> = actions.iter().map(|a| a.action_type).collect();
        assert_eq!(
            kinds,
            vec![ActionType::Navigate, ActionType::Type, ActionType::Click]
        );
        let prompts: Vec<String> = mock.calls().into_iter().map(|c| c.prompt).collect();
        assert_eq!(
            prompts,
            vec!["open https://app.test", "type bob in Email", "click Login button"]
        );
    }

    #[tokio::test]
    async fn empty_script_rejected() {
        let mock = Arc::new(MockGateway::replying("{}"));
        let err = interpreter_with(Arc::clone(&mock))
            .parse_script("# only a comment\n\n")
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::InvalidInput(_)));
        assert_eq!(mock.call_count(), 0);
    }
}

//! Failure diagnoser - root-cause classification of test failures.
//!
//! Embeds the error message and any execution context in a diagnostic
//! prompt, then parses the reply into a [`RootCauseReport`]. Replies that
//! are not valid JSON are classified by keyword; if nothing matches, the
//! report is `unknown` with the raw reply as its explanation.

use std::fmt::Write as _;
use std::sync::Arc;

use tp_protocol::{FailureCategory, FailureContext, FailureSignal, ResultOrigin, RootCauseReport};

use crate::error::{AiError, AiResult};
use crate::gateway::{InvokeOptions, ModelGateway};
use crate::heuristics::{self, HEURISTIC_CONFIDENCE};
use crate::parse::{self, JsonObject, non_empty};

const SYSTEM_PROMPT: &str = r#"You are a QA engineer diagnosing failed automated UI tests. Given an error message and optional execution context, identify the most likely root cause.

Categories:
- locator-not-found - the element could not be found, is hidden, detached or the selector is wrong.
- timing - the page or element was not ready in time; waits, races, slow loads.
- assertion-mismatch - the page loaded but shows a different value than the test expected.
- environment - network, DNS, TLS, browser crash, server error, misconfiguration.
- unknown - none of the above fits.

Respond with ONLY a JSON object (no markdown, no explanation):
{"category": "<category>", "explanation": "<one or two sentences>", "suggested_fix": "<concrete next step>", "confidence": <0.0-1.0>}"#;

/// Diagnosis fields pulled from the model's JSON object. Synonyms are
/// tried in order, so a reply carrying both "explanation" and "reason" is
/// still structured.
#[derive(Debug)]
struct LlmDiagnosis {
    category: Option<String>,
    explanation: Option<String>,
    suggested_fix: Option<serde_json::Value>,
    confidence: Option<f64>,
}

impl LlmDiagnosis {
    fn from_object(object: &JsonObject) -> Self {
        Self {
            category: parse::first_text(object, &["category", "root_cause_category", "type"]),
            explanation: parse::first_text(
                object,
                &["explanation", "root_cause", "reason", "analysis"],
            ),
            suggested_fix: parse::first_field(
                object,
                &["suggested_fix", "suggestedFix", "fix", "suggestion", "recommendation"],
            )
            .cloned(),
            confidence: parse::first_field(object, &["confidence"]).and_then(serde_json::Value::as_f64),
        }
    }
}

/// Classifies failures into [`RootCauseReport`]s via a [`ModelGateway`].
#[derive(Clone)]
pub struct FailureDiagnoser {
    gateway: Arc<dyn ModelGateway>,
}

impl FailureDiagnoser {
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self { gateway }
    }

    /// Diagnose a failure from its error message and optional context.
    ///
    /// Fails fast with `InvalidInput` on a blank message. Gateway errors
    /// propagate unchanged; an unreadable reply degrades to `unknown`.
    pub async fn diagnose(
        &self,
        error_message: &str,
        context: Option<&FailureContext>,
    ) -> AiResult<RootCauseReport> {
        let message = error_message.trim();
        if message.is_empty() {
            return Err(AiError::InvalidInput("error message must not be empty".into()));
        }

        let prompt = build_prompt(message, context);
        let options = InvokeOptions::json().with_system(SYSTEM_PROMPT);
        let reply = self.gateway.invoke(&prompt, &options).await?;
        let report = interpret_reply(message, &reply);

        if report.is_degraded() {
            tracing::warn!(
                origin = %report.origin,
                category = %report.category,
                "failure diagnosed with low confidence"
            );
        } else {
            tracing::debug!(category = %report.category, "failure diagnosed");
        }
        Ok(report)
    }

    pub async fn diagnose_signal(&self, signal: &FailureSignal) -> AiResult<RootCauseReport> {
        self.diagnose(&signal.error_message, signal.context.as_ref())
            .await
    }
}

fn build_prompt(message: &str, context: Option<&FailureContext>) -> String {
    let mut prompt = format!("Error message:\n{message}\n");
    if let Some(ctx) = context.filter(|c| !c.is_empty()) {
        prompt.push_str("\nExecution context:\n");
        if let Some(step) = ctx.step_number {
            let _ = writeln!(prompt, "- step number: {step}");
        }
        if let Some(action) = &ctx.last_action {
            let _ = writeln!(prompt, "- last action attempted: {action}");
        }
        if let Some(url) = &ctx.page_url {
            let _ = writeln!(prompt, "- page URL: {url}");
        }
    }
    prompt
}

/// Turn a model reply into a report. Never fails, never empty.
///
/// Keyword classification only runs on replies that are not JSON.
fn interpret_reply(message: &str, reply: &str) -> RootCauseReport {
    let explanation = reply.trim().to_string();
    match parse::parse_object(reply) {
        Ok(object) => {
            return from_structured(message, LlmDiagnosis::from_object(&object))
                .unwrap_or_else(|| unparsed(explanation));
        }
        Err(e) => {
            tracing::debug!(error = %e, "model reply is not a JSON diagnosis, trying heuristics");
        }
    }

    match heuristics::classify_failure(reply) {
        Some(category) => RootCauseReport {
            category,
            explanation,
            suggested_fix: heuristics::suggested_fix(category).map(str::to_string),
            confidence: Some(HEURISTIC_CONFIDENCE),
            origin: ResultOrigin::Heuristic,
        },
        None => unparsed(explanation),
    }
}

fn unparsed(explanation: String) -> RootCauseReport {
    RootCauseReport {
        category: FailureCategory::Unknown,
        explanation,
        suggested_fix: None,
        confidence: Some(0.0),
        origin: ResultOrigin::Unparsed,
    }
}

/// Validate a decoded JSON diagnosis. `None` means it carried nothing usable.
fn from_structured(message: &str, diagnosis: LlmDiagnosis) -> Option<RootCauseReport> {
    let label = non_empty(diagnosis.category);
    let explanation = non_empty(diagnosis.explanation);
    let suggested_fix = diagnosis.suggested_fix.and_then(fix_text);
    let confidence = diagnosis.confidence.map(|c| c.clamp(0.0, 1.0));

    match label.as_deref().and_then(FailureCategory::from_label) {
        Some(category) => Some(RootCauseReport {
            category,
            explanation: explanation
                .unwrap_or_else(|| format!("Classified as {category}: {message}")),
            suggested_fix,
            confidence,
            origin: ResultOrigin::Structured,
        }),
        None => {
            // Unrecognised or missing label: classify the explanation instead.
            let explanation = explanation?;
            if let Some(label) = &label {
                tracing::warn!(label = %label, "model returned unknown failure category");
            }
            let category = heuristics::classify_failure(&explanation);
            Some(RootCauseReport {
                category: category.unwrap_or(FailureCategory::Unknown),
                explanation,
                suggested_fix: suggested_fix
                    .or_else(|| category.and_then(heuristics::suggested_fix).map(str::to_string)),
                confidence: Some(if category.is_some() {
                    HEURISTIC_CONFIDENCE
                } else {
                    0.0
                }),
                origin: ResultOrigin::Heuristic,
            })
        }
    }
}

/// A fix may come back as a string or a list of steps.
fn fix_text(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => non_empty(Some(s)),
        serde_json::Value::Array(items) => {
            let steps: Vec<String> = items
                .into_iter()
                .filter_map(|v| match v {
                    serde_json::Value::String(s) => non_empty(Some(s)),
                    _ => None,
                })
                .collect();
            (!steps.is_empty()).then(|| steps.join("; "))
        }
        _ => None,
    }
}

//! `AiService` - the caller-facing facade.
//!
//! Built once per process from an immutable [`ServiceConfig`]. Cheap to
//! clone; clones share the same HTTP connection pool. All operations take
//! `&self` and may run concurrently.

use std::sync::Arc;

use tp_protocol::{ActionDescriptor, FailureContext, FailureSignal, RootCauseReport};

use crate::config::ServiceConfig;
use crate::diagnoser::FailureDiagnoser;
use crate::error::AiResult;
use crate::gateway::{ModelGateway, OllamaGateway, RetryPolicy, RetryingGateway};
use crate::interpreter::CommandInterpreter;

#[derive(Clone)]
pub struct AiService {
    config: Arc<ServiceConfig>,
    interpreter: CommandInterpreter,
    diagnoser: FailureDiagnoser,
}

impl AiService {
    /// Ollama gateway with the configured retry policy.
    pub fn new(config: ServiceConfig) -> AiResult<Self> {
        let http = OllamaGateway::new(&config)?;
        let gateway = RetryingGateway::new(http, RetryPolicy::from(&config.retry));
        tracing::info!(
            host = %config.host,
            model = %config.model,
            authenticated = config.has_api_key(),
            max_attempts = gateway.policy().max_attempts,
            "ai service initialized"
        );
        Ok(Self::with_gateway(config, Arc::new(gateway)))
    }

    /// Use a caller-supplied gateway (tests, alternative backends).
    pub fn with_gateway(config: ServiceConfig, gateway: Arc<dyn ModelGateway>) -> Self {
        Self {
            config: Arc::new(config),
            interpreter: CommandInterpreter::new(Arc::clone(&gateway)),
            diagnoser: FailureDiagnoser::new(gateway),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// Natural-language instruction to a structured action.
    pub async fn parse_command(&self, text: &str) -> AiResult<ActionDescriptor> {
        self.interpreter.parse_command(text).await
    }

    /// Multi-line test script to an ordered list of actions.
    pub async fn parse_script(&self, script: &str) -> AiResult<Vec<ActionDescriptor>> {
        self.interpreter.parse_script(script).await
    }

    /// Error message (plus optional context) to a root-cause report.
    pub async fn diagnose(
        &self,
        error_message: &str,
        context: Option<&FailureContext>,
    ) -> AiResult<RootCauseReport> {
        self.diagnoser.diagnose(error_message, context).await
    }

    pub async fn diagnose_signal(&self, signal: &FailureSignal) -> AiResult<RootCauseReport> {
        self.diagnoser.diagnose_signal(signal).await
    }
}

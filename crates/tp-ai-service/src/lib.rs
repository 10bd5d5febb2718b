//! TestPilot AI service - natural-language test commands and failure
//! diagnosis backed by an Ollama-compatible language model.
//!
//! The [`AiService`] facade wires a [`gateway::ModelGateway`] (HTTP client
//! plus retry policy) into the [`interpreter::CommandInterpreter`] and
//! [`diagnoser::FailureDiagnoser`]. Model replies are always turned into
//! structured values; unparseable replies degrade instead of failing.

pub mod config;
pub mod diagnoser;
pub mod error;
pub mod gateway;
pub mod heuristics;
pub mod interpreter;
pub mod parse;
pub mod service;

pub use config::{ApiKey, RetryConfig, ServiceConfig};
pub use error::{AiError, AiResult, ErrorKind};
pub use service::AiService;

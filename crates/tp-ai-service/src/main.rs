//! tp-smoke - end-to-end smoke check against a live model backend.
//!
//! Prints the effective configuration, then runs one command
//! interpretation and one failure diagnosis, printing each result or the
//! classified failure. Exits non-zero if either call hard-failed.

use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use tp_ai_service::{AiError, AiService, ServiceConfig};

#[derive(Parser, Debug)]
#[command(name = "tp-smoke", version, about = "Smoke-test the TestPilot AI service")]
struct Args {
    /// TOML config file. `OLLAMA_*` environment variables are used when omitted.
    config: Option<String>,

    /// Instruction to interpret.
    #[arg(long, default_value = "click on Login button")]
    command: String,

    /// Error message to diagnose.
    #[arg(long = "error", default_value = "Element not found: Login button")]
    error_message: String,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env());
    if args.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config = match &args.config {
        Some(path) => ServiceConfig::from_file(path)?,
        None => ServiceConfig::from_env(),
    };

    println!("Model:   {}", config.model);
    println!("Host:    {}", config.host);
    match &config.api_key {
        Some(key) => println!("API key: {}", key.masked()),
        None => println!("API key: not set"),
    }
    println!();

    let service = AiService::new(config)?;
    let mut failures = 0;

    println!("Parse command: '{}'", args.command);
    failures += report(service.parse_command(&args.command).await);

    println!("Diagnose failure: '{}'", args.error_message);
    failures += report(service.diagnose(&args.error_message, None).await);

    if failures > 0 {
        println!("{failures} check(s) failed");
        return Ok(ExitCode::FAILURE);
    }
    println!("All checks passed");
    Ok(ExitCode::SUCCESS)
}

/// Print one result; returns 1 on hard failure.
fn report<T: Serialize>(result: Result<T, AiError>) -> u32 {
    match result {
        Ok(value) => {
            let rendered = serde_json::to_string_pretty(&value)
                .unwrap_or_else(|e| format!("<unserializable result: {e}>"));
            println!("  ok\n{rendered}\n");
            0
        }
        Err(e) => {
            println!("  failed [{}]: {e}\n", e.kind());
            1
        }
    }
}

//! One-shot CLI runner: classify, plan, and answer a single request.
//!
//! Usage: `chorus-engine "your message here"`. Provider API keys come from
//! the environment (or a .env file); families without a key are disabled.

use chorus_engine::{build_orchestrator, Config, NoopProgress};
use chorus_engine::types::{ChatRequest, RequestContext};
use dotenv::dotenv;
use std::env;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    env_logger::init();

    let message: String = env::args().skip(1).collect::<Vec<_>>().join(" ");
    if message.trim().is_empty() {
        eprintln!("usage: chorus-engine <message>");
        return ExitCode::FAILURE;
    }

    let config = Config::from_env();
    let orchestrator = build_orchestrator(config);

    let request = ChatRequest {
        message,
        model: None,
        session_id: None,
        context: RequestContext::default(),
    };
    let response = orchestrator.handle(request, &NoopProgress).await;

    match serde_json::to_string_pretty(&response) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("failed to serialize response: {}", e);
            ExitCode::FAILURE
        }
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Relay - stream assistant runs into chat messages
//!
//! Entry point for the Relay CLI application.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use uuid::Uuid;

use relay::chat::{
    ConsolePlatform, GenerationSession, MessageTarget, SessionConfig, SessionOutcome, StopRequest,
    StopSignalHub,
};
use relay::cli::{Cli, Commands, DemoArgs, InitArgs, RunArgs};
use relay::config::Settings;
use relay::error::{RelayError, Result};
use relay::llm::mock_provider::ScriptedBackend;
use relay::llm::provider::{EventStream, ToolCallRequest};
use relay::llm::providers::{OpenAIAssistantsClient, ThreadBackend};
use relay::tools::ToolExecutor;

/// Gap between scripted events in the demo
const DEMO_EVENT_GAP: Duration = Duration::from_millis(150);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    // `-v` turns on session diagnostics; `RUST_LOG` still applies.
    if cli.verbose > 0 {
        let level = if cli.verbose > 1 { "trace" } else { "debug" };
        for target in ["relay.session", "relay.signals", "relay.tools", "relay.openai"] {
            if let Ok(parsed) = format!("{}={}", target, level).parse() {
                env_filter = env_filter.add_directive(parsed);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let settings_path = cli.config.clone().unwrap_or_else(Settings::default_path);

    match cli.command {
        Commands::Init(args) => run_init(&settings_path, &args),
        Commands::Run(args) => {
            let settings = Settings::load_from(&settings_path)?;
            run_live(&settings, args).await
        }
        Commands::Demo(args) => {
            let settings = Settings::load_from(&settings_path)?;
            run_demo(&settings, args).await
        }
    }
}

fn run_init(path: &Path, args: &InitArgs) -> Result<()> {
    if path.exists() && !args.force {
        return Err(RelayError::Config(format!(
            "{} already exists (use --force to rewrite it)",
            path.display()
        )));
    }
    Settings::default().save_to(path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

async fn run_live(settings: &Settings, args: RunArgs) -> Result<()> {
    let api_key = settings.get_openai_api_key().ok_or_else(|| {
        RelayError::Config(format!(
            "No OpenAI API key found. Set {} or openai.api_key in settings",
            settings.openai.api_key_env
        ))
    })?;
    let assistant_id = args
        .assistant
        .or_else(|| settings.openai.assistant_id.clone())
        .ok_or_else(|| {
            RelayError::Config("No assistant id. Pass --assistant or set openai.assistant_id".into())
        })?;

    let client = Arc::new(OpenAIAssistantsClient::with_base_url(
        api_key,
        settings.openai.base_url.clone(),
    ));
    let thread_id = match args.thread {
        Some(thread_id) => thread_id,
        None => client.create_thread().await?,
    };
    client.add_user_message(&thread_id, &args.prompt).await?;

    let backend = Arc::new(ThreadBackend::new(client, thread_id));
    let tools = Arc::new(ToolExecutor::from_settings(settings));
    let stream = backend
        .start_run(&assistant_id, &tools.tool_definitions())
        .await?;

    let target = MessageTarget::new(args.channel, args.message_id.unwrap_or_else(new_message_id));
    let signals = Arc::new(StopSignalHub::new());
    let session = GenerationSession::builder(target.clone())
        .with_platform(Arc::new(ConsolePlatform::new()))
        .with_backend(backend)
        .with_tools(tools)
        .with_signals(Arc::clone(&signals))
        .with_config(SessionConfig::from_settings(&settings.session))
        .start(stream)?;

    // Ctrl+C asks the session to stop like a user would from the chat.
    let stop_signals = Arc::clone(&signals);
    let message_id = target.message_id.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop_signals.publish(StopRequest::new(message_id));
        }
    });

    let outcome = session.run().await;
    ctrl_c.abort();
    report(outcome)
}

async fn run_demo(settings: &Settings, args: DemoArgs) -> Result<()> {
    let run_id = format!("run_{}", Uuid::new_v4().simple());
    let backend = ScriptedBackend::new();

    let events = if args.with_search {
        let arguments = serde_json::json!({ "query": args.text }).to_string();
        let call = ToolCallRequest::new("call_demo", "web_search", arguments);
        backend.push_continuation(
            ScriptedBackend::reply_events(&run_id, &args.text)
                .into_iter()
                .map(Ok)
                .collect(),
        );
        ScriptedBackend::tool_call_events(&run_id, vec![call])
    } else {
        ScriptedBackend::reply_events(&run_id, &args.text)
    };

    let target = MessageTarget::new("messaging:demo", new_message_id());
    let signals = Arc::new(StopSignalHub::new());
    let session = GenerationSession::builder(target.clone())
        .with_platform(Arc::new(ConsolePlatform::new()))
        .with_backend(Arc::new(backend.clone()))
        .with_tools(Arc::new(ToolExecutor::from_settings(settings)))
        .with_signals(Arc::clone(&signals))
        .with_config(SessionConfig::from_settings(&settings.session))
        .on_dispose(|| tracing::debug!(target: "relay.session", "demo session disposed"))
        .start(paced(events))?;

    if let Some(delay) = args.stop_after_ms {
        let message_id = target.message_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            signals.publish(StopRequest::new(message_id));
        });
    }

    let outcome = session.run().await;
    for (run_id, outputs) in backend.submissions() {
        tracing::info!(target: "relay.session", run_id = %run_id, outputs = outputs.len(), "tool outputs submitted");
    }
    report(outcome)
}

/// Feed scripted events with a short gap so throttling and stops are visible
fn paced(events: Vec<relay::llm::provider::StreamEvent>) -> EventStream {
    let (tx, stream) = ScriptedBackend::channel_stream();
    tokio::spawn(async move {
        for event in events {
            tokio::time::sleep(DEMO_EVENT_GAP).await;
            if tx.send(Ok(event)).is_err() {
                break;
            }
        }
    });
    stream
}

fn new_message_id() -> String {
    format!("msg_{}", Uuid::new_v4().simple())
}

fn report(outcome: SessionOutcome) -> Result<()> {
    println!();
    match outcome {
        SessionOutcome::Completed => {
            eprintln!("Generation completed.");
            Ok(())
        }
        SessionOutcome::Cancelled => {
            eprintln!("Generation stopped.");
            Ok(())
        }
        SessionOutcome::Errored { reason } => Err(RelayError::Session(reason)),
        SessionOutcome::Abandoned => Err(RelayError::Session(
            "session ended before the run finished".into(),
        )),
    }
}

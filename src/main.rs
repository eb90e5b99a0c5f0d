//! Interview Coach - practice technical interviews against an LLM interviewer
//!
//! A terminal session driven by a turn-taking state machine, with optional
//! spoken replies and voice answers through external speech engines.

mod config;
mod conversation;
mod llm;
mod render;
mod repl;
mod runtime;
mod speech;
mod state_machine;
mod topic;

use config::AppConfig;
use llm::{GeminiService, LlmService, LoggingService};
use runtime::{LlmGenerationClient, SessionConfig, SessionHandle};
use speech::{
    CommandRecognizer, CommandSynthesizer, SilentSynthesizer, SpeechRecognizer,
    SpeechSynthesizer, UnavailableRecognizer,
};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging()?;

    let config = AppConfig::from_env()?;
    tracing::info!(
        model = %config.model,
        topic = %config.topic,
        timeout_secs = config.generation_timeout.as_secs(),
        "Starting interview coach"
    );

    // Generation: Gemini behind a logging wrapper, with retries and a deadline
    let gemini = GeminiService::new(
        config.api_key.clone(),
        &config.model,
        &config.api_base,
        config.generation_timeout,
    )?;
    let service: Arc<dyn LlmService> = Arc::new(LoggingService::new(Arc::new(gemini)));
    let generation = Arc::new(
        LlmGenerationClient::new(service, config.generation_timeout)
            .with_max_output_tokens(config.max_output_tokens),
    );

    let synthesizer = synthesizer(config.tts_command.as_deref());
    let recognizer = recognizer(config.stt_command.as_deref());

    let (handle, events) = SessionHandle::create(
        config.topic,
        generation,
        synthesizer,
        recognizer,
        SessionConfig {
            voice: config.voice.clone(),
            muted: config.muted,
        },
    );

    repl::run(handle, events, config.topic).await?;
    Ok(())
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let writer = if let Some(path) = config::log_file() {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        BoxMakeWriter::new(Mutex::new(file))
    } else {
        BoxMakeWriter::new(std::io::stderr)
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "interview_coach=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(writer),
        )
        .init();
    Ok(())
}

fn synthesizer(command: Option<&str>) -> Arc<dyn SpeechSynthesizer> {
    if let Some(engine) = command.and_then(CommandSynthesizer::detect) {
        return Arc::new(engine);
    }
    if let Some(command) = command {
        tracing::warn!(command, "Speech engine not found, replies will be text only");
    }
    Arc::new(SilentSynthesizer)
}

fn recognizer(command: Option<&str>) -> Arc<dyn SpeechRecognizer> {
    if let Some(engine) = command.and_then(CommandRecognizer::detect) {
        return Arc::new(engine);
    }
    if let Some(command) = command {
        tracing::warn!(command, "Speech recognizer not found, voice input disabled");
    }
    Arc::new(UnavailableRecognizer)
}

//! Runtime configuration from environment variables

use crate::llm::{DEFAULT_API_BASE, DEFAULT_MODEL};
use crate::speech::VoiceSettings;
use crate::topic::Topic;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1024;
const DEFAULT_TTS_COMMAND: &str = "espeak-ng";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GEMINI_API_KEY is not set; export it to talk to the interviewer")]
    MissingApiKey,
}

/// Application configuration, read once at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub topic: Topic,
    pub generation_timeout: Duration,
    pub max_output_tokens: u32,
    /// `None` disables speech output
    pub tts_command: Option<String>,
    /// `None` disables voice input
    pub stt_command: Option<String>,
    pub voice: VoiceSettings,
    pub muted: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get("GEMINI_API_KEY").ok_or(ConfigError::MissingApiKey)?;

        let defaults = VoiceSettings::default();
        let voice = VoiceSettings {
            preferred_voice: get("COACH_VOICE"),
            rate: positive(&get, "COACH_SPEECH_RATE", defaults.rate),
            pitch: positive(&get, "COACH_SPEECH_PITCH", defaults.pitch),
            volume: positive(&get, "COACH_SPEECH_VOLUME", defaults.volume),
        };

        // An explicitly empty TTS command turns speech off
        let tts_command = match lookup("COACH_TTS_COMMAND") {
            Some(command) if command.trim().is_empty() => None,
            Some(command) => Some(command.trim().to_string()),
            None => Some(DEFAULT_TTS_COMMAND.to_string()),
        };

        Ok(Self {
            api_key,
            model: get("COACH_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_base: get("COACH_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            topic: get("COACH_TOPIC").map_or(Topic::JavaScript, |slug| Topic::from_slug(&slug)),
            generation_timeout: Duration::from_secs(parse_or(
                &get,
                "COACH_GENERATION_TIMEOUT_SECS",
                DEFAULT_TIMEOUT_SECS,
            )),
            max_output_tokens: parse_or(&get, "COACH_MAX_OUTPUT_TOKENS", DEFAULT_MAX_OUTPUT_TOKENS),
            tts_command,
            stt_command: get("COACH_STT_COMMAND"),
            voice,
            muted: get("COACH_MUTED").is_some_and(|v| is_truthy(&v)),
        })
    }
}

/// Where JSON logs go instead of stderr
pub fn log_file() -> Option<PathBuf> {
    std::env::var_os("COACH_LOG_FILE")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match get(key) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, default = %default, "Invalid value, using default");
            default
        }),
    }
}

fn positive(get: &impl Fn(&str) -> Option<String>, key: &str, default: f32) -> f32 {
    let value = parse_or(get, key, default);
    if value.is_finite() && value > 0.0 {
        value
    } else {
        tracing::warn!(key, value, default, "Value must be positive, using default");
        default
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

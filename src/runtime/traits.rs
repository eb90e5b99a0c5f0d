//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::conversation::{HistoryEntry, HistoryRole};
use crate::llm::{LlmError, LlmErrorKind, LlmMessage, LlmRequest, LlmService};
use crate::topic::Topic;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// One question for the interviewer model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub topic: Topic,
    pub prompt: String,
    /// Dialogue before `prompt`, oldest first
    pub history: Vec<HistoryEntry>,
}

/// Why a generation failed, as far as the coordinator cares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationCause {
    Network,
    Quota,
    Malformed,
    Timeout,
    /// Authentication failure or invalid request
    Rejected,
}

impl fmt::Display for GenerationCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GenerationCause::Network => "network",
            GenerationCause::Quota => "quota",
            GenerationCause::Malformed => "malformed",
            GenerationCause::Timeout => "timeout",
            GenerationCause::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{cause} error: {detail}")]
pub struct GenerationError {
    pub cause: GenerationCause,
    /// Provider detail, for logs only
    pub detail: String,
}

impl GenerationError {
    pub fn new(cause: GenerationCause, detail: impl Into<String>) -> Self {
        Self {
            cause,
            detail: detail.into(),
        }
    }

    /// Text shown to the candidate as a system-error turn
    pub fn user_message(&self) -> String {
        match self.cause {
            GenerationCause::Network => {
                "Sorry, I couldn't reach the interviewer. Check your connection and try again."
            }
            GenerationCause::Quota => {
                "The interviewer is handling too many requests right now. Please wait a moment and try again."
            }
            GenerationCause::Malformed => {
                "Sorry, the interviewer's reply could not be read. Please try again."
            }
            GenerationCause::Timeout => {
                "The interviewer took too long to respond. Please try again."
            }
            GenerationCause::Rejected => {
                "The interview service rejected the request. Check your API key and settings."
            }
        }
        .to_string()
    }
}

impl From<LlmError> for GenerationError {
    fn from(e: LlmError) -> Self {
        let cause = match e.kind {
            LlmErrorKind::Network | LlmErrorKind::ServerError => GenerationCause::Network,
            LlmErrorKind::Timeout => GenerationCause::Timeout,
            LlmErrorKind::RateLimit => GenerationCause::Quota,
            LlmErrorKind::Auth | LlmErrorKind::InvalidRequest => GenerationCause::Rejected,
            LlmErrorKind::Malformed => GenerationCause::Malformed,
        };
        Self::new(cause, e.message)
    }
}

/// Produces the interviewer's reply
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// An empty string is a valid reply
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

#[async_trait]
impl<T: GenerationClient + ?Sized> GenerationClient for Arc<T> {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        (**self).generate(request).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

const MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BASE: Duration = Duration::from_secs(1);

/// Exponential backoff: base, 2x base, 4x base, ...
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base * (1 << (attempt.saturating_sub(1)).min(16))
}

/// Adapter to use an `LlmService` as the generation client.
///
/// Retries transient failures and bounds the whole call by a deadline.
pub struct LlmGenerationClient {
    service: Arc<dyn LlmService>,
    timeout: Duration,
    retry_base: Duration,
    max_output_tokens: Option<u32>,
}

impl LlmGenerationClient {
    pub fn new(service: Arc<dyn LlmService>, timeout: Duration) -> Self {
        Self {
            service,
            timeout,
            retry_base: DEFAULT_RETRY_BASE,
            max_output_tokens: None,
        }
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    #[cfg(test)]
    pub fn with_retry_base(mut self, retry_base: Duration) -> Self {
        self.retry_base = retry_base;
        self
    }

    fn build_request(&self, request: &GenerationRequest) -> LlmRequest {
        let mut messages: Vec<LlmMessage> = request
            .history
            .iter()
            .map(|entry| match entry.role {
                HistoryRole::User => LlmMessage::user(&entry.content),
                HistoryRole::Assistant => LlmMessage::assistant(&entry.content),
            })
            .collect();
        messages.push(LlmMessage::user(&request.prompt));

        LlmRequest {
            system: Some(request.topic.system_prompt()),
            messages,
            max_tokens: self.max_output_tokens,
        }
    }

    async fn complete_with_retries(&self, request: &LlmRequest) -> Result<String, LlmError> {
        let mut attempt = 1;
        loop {
            match self.service.complete(request).await {
                Ok(response) => return Ok(response.text),
                Err(e) if e.kind.is_retryable() && attempt < MAX_ATTEMPTS => {
                    let delay = retry_delay(self.retry_base, attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = MAX_ATTEMPTS,
                        delay_ms = %delay.as_millis(),
                        error = %e,
                        "Generation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl GenerationClient for LlmGenerationClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let llm_request = self.build_request(request);

        match tokio::time::timeout(self.timeout, self.complete_with_retries(&llm_request)).await {
            Ok(result) => result.map_err(GenerationError::from),
            Err(_) => Err(GenerationError::new(
                GenerationCause::Timeout,
                format!("no reply within {}s", self.timeout.as_secs_f32()),
            )),
        }
    }
}

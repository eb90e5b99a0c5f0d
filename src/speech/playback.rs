//! Speech playback adapter

use super::markdown::strip_markdown;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Identifier of one utterance, allocated by the session coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UtteranceId(pub u64);

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.0)
    }
}

/// Voice parameters applied to every utterance
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSettings {
    pub preferred_voice: Option<String>,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            preferred_voice: None,
            rate: 0.92,
            pitch: 1.1,
            volume: 0.9,
        }
    }
}

/// Normalized text plus the voice to read it with
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub id: UtteranceId,
    pub text: String,
    pub voice: Option<String>,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("speech synthesis unavailable: {0}")]
    Unavailable(String),
    #[error("speech synthesis failed: {0}")]
    Engine(String),
}

/// Platform text-to-speech capability
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Voices the engine offers; empty when the engine cannot tell
    async fn voices(&self) -> Vec<String> {
        Vec::new()
    }

    /// Speak until finished or `cancel` fires.
    ///
    /// Returning early on cancellation is expected; the result is ignored then.
    async fn speak(&self, utterance: &Utterance, cancel: CancellationToken)
        -> Result<(), PlaybackError>;
}

/// Notifications the adapter emits to its subscriber
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackNotice {
    Started { id: UtteranceId },
    Finished { id: UtteranceId },
    Failed { id: UtteranceId, error: PlaybackError },
}

/// Pick the voice to use: the preferred one if the engine has it, otherwise
/// any available voice. With no voice list the preference is passed through.
pub fn select_voice(available: &[String], preferred: Option<&str>) -> Option<String> {
    let preferred = preferred?;
    if available.is_empty() {
        return Some(preferred.to_string());
    }
    available
        .iter()
        .find(|v| v.eq_ignore_ascii_case(preferred))
        .or_else(|| available.first())
        .cloned()
}

/// At most one utterance plays at a time; the last `speak` wins.
pub struct SpeechPlayback {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    settings: VoiceSettings,
    voice: Option<String>,
    notice_tx: mpsc::UnboundedSender<PlaybackNotice>,
    current: Option<(UtteranceId, CancellationToken)>,
    muted: bool,
}

impl SpeechPlayback {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        settings: VoiceSettings,
    ) -> (Self, mpsc::UnboundedReceiver<PlaybackNotice>) {
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let voice = settings.preferred_voice.clone();
        (
            Self {
                synthesizer,
                settings,
                voice,
                notice_tx,
                current: None,
                muted: false,
            },
            notice_rx,
        )
    }

    /// Ask the engine for its voices and settle on one (best effort)
    pub async fn resolve_voice(&mut self) {
        let available = self.synthesizer.voices().await;
        self.voice = select_voice(&available, self.settings.preferred_voice.as_deref());
        tracing::debug!(voice = ?self.voice, available = available.len(), "Resolved speech voice");
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    #[cfg(test)]
    pub fn is_speaking(&self) -> bool {
        self.current.is_some()
    }

    /// Cancel any current utterance, then speak `text` with markdown stripped.
    ///
    /// Returns `false` and leaves the current utterance alone while muted.
    pub fn speak(&mut self, id: UtteranceId, text: &str) -> bool {
        if self.muted {
            return false;
        }
        self.cancel();

        let utterance = Utterance {
            id,
            text: strip_markdown(text),
            voice: self.voice.clone(),
            rate: self.settings.rate,
            pitch: self.settings.pitch,
            volume: self.settings.volume,
        };

        let token = CancellationToken::new();
        self.current = Some((id, token.clone()));

        let synthesizer = self.synthesizer.clone();
        let notice_tx = self.notice_tx.clone();
        tokio::spawn(async move {
            let _ = notice_tx.send(PlaybackNotice::Started { id });
            let result = synthesizer.speak(&utterance, token.clone()).await;

            // cancel() already reported the end
            if token.is_cancelled() {
                return;
            }

            let notice = match result {
                Ok(()) => PlaybackNotice::Finished { id },
                Err(error) => PlaybackNotice::Failed { id, error },
            };
            let _ = notice_tx.send(notice);
        });

        true
    }

    /// Stop the current utterance immediately and report its end
    pub fn cancel(&mut self) -> Option<UtteranceId> {
        let (id, token) = self.current.take()?;
        tracing::debug!(utterance = %id, "Cancelling playback");
        token.cancel();
        let _ = self.notice_tx.send(PlaybackNotice::Finished { id });
        Some(id)
    }

    /// Forget `id` once its end notice has been received
    pub fn settle(&mut self, id: UtteranceId) {
        if self.current.as_ref().is_some_and(|(current, _)| *current == id) {
            self.current = None;
        }
    }
}

impl Drop for SpeechPlayback {
    fn drop(&mut self) {
        if let Some((_, token)) = self.current.take() {
            token.cancel();
        }
    }
}

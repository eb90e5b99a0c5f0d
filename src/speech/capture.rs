//! Speech capture adapter

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Identifier of one capture session, allocated by the session coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureId(pub u64);

impl fmt::Display for CaptureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// A recognition hypothesis. Interim results may still change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub text: String,
    pub is_final: bool,
}

impl Transcript {
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    pub fn final_result(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("speech recognition is not available")]
    Unavailable,
    #[error("a capture session is already active")]
    AlreadyActive,
    #[error("speech recognition failed: {0}")]
    Engine(String),
}

/// Platform speech-to-text capability
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    fn is_available(&self) -> bool;

    /// Listen until natural end of speech, an engine error, or `cancel`.
    ///
    /// Hypotheses go to `transcripts`; the sender must be dropped on return.
    async fn listen(
        &self,
        transcripts: mpsc::UnboundedSender<Transcript>,
        cancel: CancellationToken,
    ) -> Result<(), CaptureError>;
}

/// Recognizer for platforms without speech-to-text
pub struct UnavailableRecognizer;

#[async_trait]
impl SpeechRecognizer for UnavailableRecognizer {
    fn is_available(&self) -> bool {
        false
    }

    async fn listen(
        &self,
        _transcripts: mpsc::UnboundedSender<Transcript>,
        _cancel: CancellationToken,
    ) -> Result<(), CaptureError> {
        Err(CaptureError::Unavailable)
    }
}

/// Notifications the adapter emits to its subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureNotice {
    Transcript {
        id: CaptureId,
        transcript: Transcript,
    },
    /// Capture went inactive: natural end, engine error, or `stop()`
    Ended {
        id: CaptureId,
        error: Option<CaptureError>,
    },
}

/// At most one capture session is active at a time.
pub struct SpeechCapture {
    recognizer: Arc<dyn SpeechRecognizer>,
    notice_tx: mpsc::UnboundedSender<CaptureNotice>,
    current: Option<(CaptureId, CancellationToken)>,
}

impl SpeechCapture {
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
    ) -> (Self, mpsc::UnboundedReceiver<CaptureNotice>) {
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        (
            Self {
                recognizer,
                notice_tx,
                current: None,
            },
            notice_rx,
        )
    }

    pub fn is_available(&self) -> bool {
        self.recognizer.is_available()
    }

    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    /// Begin listening; notices for this session carry `id`
    pub fn start(&mut self, id: CaptureId) -> Result<(), CaptureError> {
        if !self.recognizer.is_available() {
            return Err(CaptureError::Unavailable);
        }
        if self.current.is_some() {
            return Err(CaptureError::AlreadyActive);
        }

        let token = CancellationToken::new();
        self.current = Some((id, token.clone()));

        let recognizer = self.recognizer.clone();
        let notice_tx = self.notice_tx.clone();
        tokio::spawn(async move {
            let (transcript_tx, mut transcript_rx) = mpsc::unbounded_channel();

            let forward_tx = notice_tx.clone();
            let forwarder = tokio::spawn(async move {
                while let Some(transcript) = transcript_rx.recv().await {
                    let _ = forward_tx.send(CaptureNotice::Transcript { id, transcript });
                }
            });

            let result = recognizer.listen(transcript_tx, token).await;
            // Every transcript is delivered before the end notice
            let _ = forwarder.await;

            if let Err(e) = &result {
                tracing::warn!(capture = %id, error = %e, "Speech capture ended with error");
            }
            let _ = notice_tx.send(CaptureNotice::Ended {
                id,
                error: result.err(),
            });
        });

        Ok(())
    }

    /// Stop listening. The end notice still arrives through the channel.
    pub fn stop(&mut self) -> Option<CaptureId> {
        let (id, token) = self.current.take()?;
        tracing::debug!(capture = %id, "Stopping capture");
        token.cancel();
        Some(id)
    }

    /// Forget `id` once its end notice has been received
    pub fn settle(&mut self, id: CaptureId) {
        if self.current.as_ref().is_some_and(|(current, _)| *current == id) {
            self.current = None;
        }
    }
}

impl Drop for SpeechCapture {
    fn drop(&mut self) {
        if let Some((_, token)) = self.current.take() {
            token.cancel();
        }
    }
}

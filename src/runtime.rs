//! Runtime for executing interview sessions
//!
//! One task owns the session state and processes events sequentially.
//! Presentation layers talk to it through a [`SessionHandle`] and observe it
//! through broadcast [`SessionEvent`]s.

mod executor;
pub mod traits;


pub use executor::SessionRuntime;
pub use traits::*;

use crate::conversation::{Turn, TurnId};
use crate::speech::{SpeechRecognizer, SpeechSynthesizer, VoiceSettings};
use crate::state_machine::{Event, InputState, Phase};
use crate::topic::Topic;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// Snapshot of the coordinator for rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateView {
    pub topic: Topic,
    pub phase: Phase,
    pub input: InputState,
}

/// Events sent to presentation layers
#[derive(Debug, Clone)]
pub enum SessionEvent {
    TurnAppended {
        turn: Turn,
    },
    StateChanged {
        state: StateView,
    },
    /// Conversation cleared; `turns` holds the new greeting
    Reset {
        topic: Topic,
        turns: Vec<Turn>,
    },
    /// A user action was refused in the current state
    Rejected {
        message: String,
    },
    Closed,
}

/// Per-session preferences
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub voice: VoiceSettings,
    /// Start with playback muted
    pub muted: bool,
}

#[derive(Debug, Error)]
#[error("interview session has ended")]
pub struct SessionClosed;

/// Handle to interact with a running session
pub struct SessionHandle {
    event_tx: mpsc::Sender<Event>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Start a session for `topic`.
    ///
    /// The returned receiver is subscribed before the runtime starts, so it
    /// sees the initial greeting.
    pub fn create<G>(
        topic: Topic,
        generation: Arc<G>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        recognizer: Arc<dyn SpeechRecognizer>,
        config: SessionConfig,
    ) -> (Self, broadcast::Receiver<SessionEvent>)
    where
        G: GenerationClient + 'static,
    {
        let (event_tx, event_rx) = mpsc::channel(32);
        let (broadcast_tx, broadcast_rx) = broadcast::channel(128);

        let runtime = SessionRuntime::new(
            topic,
            generation,
            synthesizer,
            recognizer,
            config,
            event_rx,
            broadcast_tx,
        );
        let task = tokio::spawn(runtime.run());

        (
            Self { event_tx, task },
            broadcast_rx,
        )
    }

    pub async fn send(&self, event: Event) -> Result<(), SessionClosed> {
        self.event_tx.send(event).await.map_err(|_| SessionClosed)
    }

    pub async fn submit(&self, text: impl Into<String>) -> Result<(), SessionClosed> {
        self.send(Event::submit(text)).await
    }

    /// Replace the pending draft, e.g. to fix a misheard transcript
    pub async fn edit_draft(&self, text: impl Into<String>) -> Result<(), SessionClosed> {
        self.send(Event::EditDraft { text: text.into() }).await
    }

    pub async fn submit_draft(&self) -> Result<(), SessionClosed> {
        self.send(Event::SubmitDraft).await
    }

    pub async fn toggle_capture(&self) -> Result<(), SessionClosed> {
        self.send(Event::ToggleCapture).await
    }

    pub async fn toggle_mute(&self) -> Result<(), SessionClosed> {
        self.send(Event::ToggleMute).await
    }

    pub async fn replay(&self, turn_id: TurnId) -> Result<(), SessionClosed> {
        self.send(Event::Replay { turn_id }).await
    }

    /// Start over with a new topic
    pub async fn reset(&self, topic: Topic) -> Result<(), SessionClosed> {
        self.send(Event::Reset { topic: Some(topic) }).await
    }

    /// Start over with the current topic
    pub async fn restart(&self) -> Result<(), SessionClosed> {
        self.send(Event::Reset { topic: None }).await
    }

    /// Stop capture and playback, then wait for the runtime to exit
    pub async fn dispose(self) {
        if self.event_tx.send(Event::Dispose).await.is_err() {
            tracing::debug!("Session already stopped");
        }
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Session task failed");
        }
    }
}

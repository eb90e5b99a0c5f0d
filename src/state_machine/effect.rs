//! Effects produced by state transitions

use super::state::RequestId;
use crate::conversation::{TurnId, TurnRole};
use crate::speech::{CaptureId, UtteranceId};
use crate::topic::Topic;

/// Effects to be executed after state transition, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Append a turn to the conversation
    AppendTurn { role: TurnRole, content: String },

    /// Ask the generation client for the interviewer's reply (spawns a task)
    RequestGeneration { request_id: RequestId, prompt: String },

    /// Read text aloud
    Speak { utterance_id: UtteranceId, text: String },

    /// Read an existing turn aloud again
    SpeakTurn { utterance_id: UtteranceId, turn_id: TurnId },

    /// Stop the current utterance
    CancelPlayback,

    /// Begin listening
    StartCapture { capture_id: CaptureId },

    /// Stop listening
    StopCapture,

    SetMuted { muted: bool },

    /// Clear the conversation, install the topic greeting, renew the session id
    ResetSession { topic: Topic },

    /// Stop the coordinator loop
    Shutdown,
}

impl Effect {
    pub fn append_user(content: impl Into<String>) -> Self {
        Effect::AppendTurn {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn append_assistant(content: impl Into<String>) -> Self {
        Effect::AppendTurn {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }

    pub fn append_system_error(content: impl Into<String>) -> Self {
        Effect::AppendTurn {
            role: TurnRole::SystemError,
            content: content.into(),
        }
    }
}

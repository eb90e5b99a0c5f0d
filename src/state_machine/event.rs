//! Events that can occur in an interview session

use super::state::{RequestId, SessionId};
use crate::conversation::TurnId;
use crate::runtime::GenerationError;
use crate::speech::{CaptureError, CaptureId, Transcript, UtteranceId};
use crate::topic::Topic;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    Submit {
        text: String,
    },
    SubmitDraft,
    EditDraft {
        text: String,
    },
    ToggleCapture,
    ToggleMute,
    /// Hear an assistant turn again
    Replay {
        turn_id: TurnId,
    },
    /// `None` restarts with the current topic
    Reset {
        topic: Option<Topic>,
    },
    Dispose,

    // Generation events
    GenerationSucceeded {
        session_id: SessionId,
        request_id: RequestId,
        text: String,
    },
    GenerationFailed {
        session_id: SessionId,
        request_id: RequestId,
        error: GenerationError,
    },

    // Playback events
    PlaybackEnded {
        utterance_id: UtteranceId,
    },
    /// The engine failed; the executor has already logged why
    PlaybackFailed {
        utterance_id: UtteranceId,
    },

    // Capture events
    CaptureTranscript {
        capture_id: CaptureId,
        transcript: Transcript,
    },
    CaptureEnded {
        capture_id: CaptureId,
        error: Option<CaptureError>,
    },
}

impl Event {
    pub fn submit(text: impl Into<String>) -> Self {
        Event::Submit { text: text.into() }
    }

    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Event::Submit { .. } => "submit",
            Event::SubmitDraft => "submit_draft",
            Event::EditDraft { .. } => "edit_draft",
            Event::ToggleCapture => "toggle_capture",
            Event::ToggleMute => "toggle_mute",
            Event::Replay { .. } => "replay",
            Event::Reset { .. } => "reset",
            Event::Dispose => "dispose",
            Event::GenerationSucceeded { .. } => "generation_succeeded",
            Event::GenerationFailed { .. } => "generation_failed",
            Event::PlaybackEnded { .. } => "playback_ended",
            Event::PlaybackFailed { .. } => "playback_failed",
            Event::CaptureTranscript { .. } => "capture_transcript",
            Event::CaptureEnded { .. } => "capture_ended",
        }
    }
}

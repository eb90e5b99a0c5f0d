//! Coordinator state types

use crate::speech::{CaptureId, UtteranceId};
use crate::topic::Topic;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies one logical conversation; renewed on every reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Tag of one generation request within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Primary turn-taking phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Phase {
    /// Waiting for the candidate
    #[default]
    Idle,

    /// A generation request is in flight
    AwaitingGeneration { request_id: RequestId },

    /// The interviewer's reply is being read aloud
    Speaking { utterance_id: UtteranceId },
}

impl Phase {
    #[cfg(test)]
    pub fn is_idle(&self) -> bool {
        matches!(self, Phase::Idle)
    }

    pub fn is_speaking(&self) -> bool {
        matches!(self, Phase::Speaking { .. })
    }

    #[cfg(test)]
    pub fn is_awaiting_generation(&self) -> bool {
        matches!(self, Phase::AwaitingGeneration { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::AwaitingGeneration { .. } => "awaiting_generation",
            Phase::Speaking { .. } => "speaking",
        }
    }
}

/// Input-side flags, orthogonal to the phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputState {
    /// Text the candidate is composing
    pub draft: String,
    /// Active capture session, if listening
    pub capture: Option<CaptureId>,
    /// Latest hypothesis of the active capture
    pub transcript: String,
    /// Cleared for the rest of the session once the recognizer reports unavailable
    pub capture_available: bool,
    pub muted: bool,
}

impl InputState {
    pub fn new(capture_available: bool, muted: bool) -> Self {
        Self {
            draft: String::new(),
            capture: None,
            transcript: String::new(),
            capture_available,
            muted,
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::new(true, false)
    }
}

/// Complete coordinator state
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoachState {
    pub phase: Phase,
    pub input: InputState,
    /// Source of request, utterance and capture ids
    next_id: u64,
}

impl CoachState {
    pub fn new(input: InputState) -> Self {
        Self {
            phase: Phase::Idle,
            input,
            next_id: 1,
        }
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub(crate) fn next_request_id(&mut self) -> RequestId {
        RequestId(self.allocate())
    }

    pub(crate) fn next_utterance_id(&mut self) -> UtteranceId {
        UtteranceId(self.allocate())
    }

    pub(crate) fn next_capture_id(&mut self) -> CaptureId {
        CaptureId(self.allocate())
    }

    /// End the active capture, keeping its transcript as the draft
    pub(crate) fn commit_transcript(&mut self) {
        self.input.capture = None;
        self.input.draft = std::mem::take(&mut self.input.transcript);
    }
}

/// Immutable facts about the current session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub session_id: SessionId,
    pub topic: Topic,
}

impl SessionContext {
    pub fn new(topic: Topic) -> Self {
        Self {
            session_id: SessionId::new(),
            topic,
        }
    }
}

//! Pure state transition function
//!
//! Given the same state, context and event, `transition` always produces the
//! same new state and effects. All I/O happens in the executor.

use super::state::{InputState, RequestId, SessionId};
use super::{CoachState, Effect, Event, Phase, SessionContext};
use crate::speech::CaptureError;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: CoachState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: CoachState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("The interviewer is still thinking, wait for the reply")]
    GenerationInFlight,
    #[error("The interviewer is speaking, mute or wait for it to finish")]
    PlaybackInProgress,
    #[error("Speech capture is not available, type your answer instead")]
    CaptureUnavailable,
    #[error("Unmute to hear a reply again")]
    Muted,
    #[error("Ignoring stale {0}")]
    Stale(&'static str),
}

/// Pure transition function
#[allow(clippy::too_many_lines)] // One arm per event keeps the table readable
pub fn transition(
    state: &CoachState,
    context: &SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let mut next = state.clone();

    match event {
        // ============================================================
        // Candidate input
        // ============================================================
        Event::Submit { text } => submit(next, &text),

        Event::SubmitDraft => {
            let draft = state.input.draft.clone();
            submit(next, &draft)
        }

        Event::EditDraft { text } => {
            next.input.draft = text;
            Ok(TransitionResult::new(next))
        }

        // ============================================================
        // Generation results
        // ============================================================
        Event::GenerationSucceeded {
            session_id,
            request_id,
            text,
        } => {
            accept_generation(state, context, session_id, request_id)?;

            let mut effects = vec![Effect::append_assistant(text.clone())];
            if state.input.muted {
                next.phase = Phase::Idle;
            } else {
                // Capture and playback never overlap
                if state.input.is_capturing() {
                    next.commit_transcript();
                    effects.push(Effect::StopCapture);
                }
                let utterance_id = next.next_utterance_id();
                next.phase = Phase::Speaking { utterance_id };
                effects.push(Effect::Speak { utterance_id, text });
            }
            Ok(TransitionResult::new(next).with_effects(effects))
        }

        Event::GenerationFailed {
            session_id,
            request_id,
            error,
        } => {
            accept_generation(state, context, session_id, request_id)?;

            next.phase = Phase::Idle;
            Ok(TransitionResult::new(next)
                .with_effect(Effect::append_system_error(error.user_message())))
        }

        // ============================================================
        // Playback
        // ============================================================
        Event::PlaybackEnded { utterance_id } | Event::PlaybackFailed { utterance_id } => {
            match state.phase {
                Phase::Speaking {
                    utterance_id: current,
                } if current == utterance_id => {
                    next.phase = Phase::Idle;
                    Ok(TransitionResult::new(next))
                }
                _ => Err(TransitionError::Stale("playback notice")),
            }
        }

        Event::Replay { turn_id } => match state.phase {
            Phase::AwaitingGeneration { .. } => Err(TransitionError::GenerationInFlight),
            Phase::Speaking { .. } => Err(TransitionError::PlaybackInProgress),
            Phase::Idle if state.input.muted => Err(TransitionError::Muted),
            Phase::Idle => {
                let mut effects = vec![];
                if state.input.is_capturing() {
                    next.commit_transcript();
                    effects.push(Effect::StopCapture);
                }
                let utterance_id = next.next_utterance_id();
                next.phase = Phase::Speaking { utterance_id };
                effects.push(Effect::SpeakTurn {
                    utterance_id,
                    turn_id,
                });
                Ok(TransitionResult::new(next).with_effects(effects))
            }
        },

        Event::ToggleMute => {
            let muted = !state.input.muted;
            next.input.muted = muted;

            let mut effects = vec![];
            if muted && state.phase.is_speaking() {
                next.phase = Phase::Idle;
                effects.push(Effect::CancelPlayback);
            }
            effects.push(Effect::SetMuted { muted });
            Ok(TransitionResult::new(next).with_effects(effects))
        }

        // ============================================================
        // Capture
        // ============================================================
        Event::ToggleCapture => {
            if state.input.is_capturing() {
                next.commit_transcript();
                return Ok(TransitionResult::new(next).with_effect(Effect::StopCapture));
            }
            if !state.input.capture_available {
                return Err(TransitionError::CaptureUnavailable);
            }

            let mut effects = vec![];
            if state.phase.is_speaking() {
                next.phase = Phase::Idle;
                effects.push(Effect::CancelPlayback);
            }
            let capture_id = next.next_capture_id();
            next.input.capture = Some(capture_id);
            next.input.draft.clear();
            next.input.transcript.clear();
            effects.push(Effect::StartCapture { capture_id });
            Ok(TransitionResult::new(next).with_effects(effects))
        }

        Event::CaptureTranscript {
            capture_id,
            transcript,
        } => {
            if state.input.capture != Some(capture_id) {
                return Err(TransitionError::Stale("transcript"));
            }
            next.input.transcript = transcript.text;
            Ok(TransitionResult::new(next))
        }

        Event::CaptureEnded { capture_id, error } => {
            if state.input.capture != Some(capture_id) {
                return Err(TransitionError::Stale("capture end"));
            }
            next.commit_transcript();
            if error == Some(CaptureError::Unavailable) {
                next.input.capture_available = false;
            }
            Ok(TransitionResult::new(next))
        }

        // ============================================================
        // Session lifecycle
        // ============================================================
        Event::Reset { topic } => {
            let topic = topic.unwrap_or(context.topic);
            next.phase = Phase::Idle;
            next.input = InputState::new(state.input.capture_available, state.input.muted);
            Ok(TransitionResult::new(next)
                .with_effects(release_media(state))
                .with_effect(Effect::ResetSession { topic }))
        }

        Event::Dispose => {
            next.phase = Phase::Idle;
            next.input.capture = None;
            next.input.transcript.clear();
            Ok(TransitionResult::new(next)
                .with_effects(release_media(state))
                .with_effect(Effect::Shutdown))
        }
    }
}

fn submit(mut next: CoachState, text: &str) -> Result<TransitionResult, TransitionError> {
    match next.phase {
        Phase::AwaitingGeneration { .. } => Err(TransitionError::GenerationInFlight),
        Phase::Speaking { .. } => Err(TransitionError::PlaybackInProgress),
        Phase::Idle => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(TransitionResult::new(next));
            }

            let request_id = next.next_request_id();
            next.phase = Phase::AwaitingGeneration { request_id };
            next.input.draft.clear();
            Ok(TransitionResult::new(next)
                .with_effect(Effect::append_user(text))
                .with_effect(Effect::RequestGeneration {
                    request_id,
                    prompt: text.to_string(),
                }))
        }
    }
}

/// A result is accepted only for the current session's outstanding request
fn accept_generation(
    state: &CoachState,
    context: &SessionContext,
    session_id: SessionId,
    request_id: RequestId,
) -> Result<(), TransitionError> {
    if session_id != context.session_id {
        return Err(TransitionError::Stale("generation result from a previous session"));
    }
    match state.phase {
        Phase::AwaitingGeneration {
            request_id: current,
        } if current == request_id => Ok(()),
        _ => Err(TransitionError::Stale("generation result")),
    }
}

/// Effects that stop whatever media is active
fn release_media(state: &CoachState) -> Vec<Effect> {
    let mut effects = vec![];
    if state.phase.is_speaking() {
        effects.push(Effect::CancelPlayback);
    }
    if state.input.is_capturing() {
        effects.push(Effect::StopCapture);
    }
    effects
}

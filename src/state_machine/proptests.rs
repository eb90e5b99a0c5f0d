//! Property-based tests for the state machine
//!
//! Random action sequences are mapped onto events using the current state,
//! so generation and playback results mostly carry live ids, with stale ids
//! mixed in.

use super::state::*;
use super::transition::*;
use super::*;
use crate::conversation::{TurnId, TurnRole};
use crate::runtime::{GenerationCause, GenerationError};
use crate::speech::{CaptureError, CaptureId, Transcript, UtteranceId};
use crate::topic::Topic;
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context() -> SessionContext {
    SessionContext::new(Topic::JavaScript)
}

/// Abstract user or environment action
#[derive(Debug, Clone)]
enum Action {
    Submit(String),
    SubmitDraft,
    EditDraft(String),
    ToggleCapture,
    ToggleMute,
    Replay,
    GenerationOk(String),
    GenerationErr(GenerationCause),
    StaleGeneration,
    PlaybackEnd,
    PlaybackError,
    StalePlayback,
    Transcript(String),
    CaptureEnd(bool),
    Restart,
}

/// Turn an action into a concrete event for the given state
fn to_event(action: Action, state: &CoachState, ctx: &SessionContext) -> Event {
    let request_id = match state.phase {
        Phase::AwaitingGeneration { request_id } => request_id,
        _ => RequestId(u64::MAX),
    };
    let utterance_id = match state.phase {
        Phase::Speaking { utterance_id } => utterance_id,
        _ => UtteranceId(u64::MAX),
    };
    let capture_id = state.input.capture.unwrap_or(CaptureId(u64::MAX));

    match action {
        Action::Submit(text) => Event::Submit { text },
        Action::SubmitDraft => Event::SubmitDraft,
        Action::EditDraft(text) => Event::EditDraft { text },
        Action::ToggleCapture => Event::ToggleCapture,
        Action::ToggleMute => Event::ToggleMute,
        Action::Replay => Event::Replay { turn_id: TurnId(1) },
        Action::GenerationOk(text) => Event::GenerationSucceeded {
            session_id: ctx.session_id,
            request_id,
            text,
        },
        Action::GenerationErr(cause) => Event::GenerationFailed {
            session_id: ctx.session_id,
            request_id,
            error: GenerationError::new(cause, "provider failure"),
        },
        Action::StaleGeneration => Event::GenerationSucceeded {
            session_id: SessionId::new(),
            request_id,
            text: "stale".to_string(),
        },
        Action::PlaybackEnd => Event::PlaybackEnded { utterance_id },
        Action::PlaybackError => Event::PlaybackFailed { utterance_id },
        Action::StalePlayback => Event::PlaybackEnded {
            utterance_id: UtteranceId(utterance_id.0.wrapping_add(1)),
        },
        Action::Transcript(text) => Event::CaptureTranscript {
            capture_id,
            transcript: Transcript::interim(text),
        },
        Action::CaptureEnd(failed) => Event::CaptureEnded {
            capture_id,
            error: failed.then(|| CaptureError::Engine("no speech".to_string())),
        },
        Action::Restart => Event::Reset { topic: None },
    }
}

fn count_role(effects: &[Effect], wanted: TurnRole) -> usize {
    effects
        .iter()
        .filter(|e| matches!(e, Effect::AppendTurn { role, .. } if *role == wanted))
        .count()
}

fn position(effects: &[Effect], pred: impl Fn(&Effect) -> bool) -> Option<usize> {
    effects.iter().position(pred)
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("   ".to_string()),
        "[a-zA-Z ]{1,30}",
    ]
}

fn arb_cause() -> impl Strategy<Value = GenerationCause> {
    prop_oneof![
        Just(GenerationCause::Network),
        Just(GenerationCause::Quota),
        Just(GenerationCause::Malformed),
        Just(GenerationCause::Timeout),
        Just(GenerationCause::Rejected),
    ]
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        3 => arb_text().prop_map(Action::Submit),
        1 => Just(Action::SubmitDraft),
        1 => arb_text().prop_map(Action::EditDraft),
        2 => Just(Action::ToggleCapture),
        2 => Just(Action::ToggleMute),
        1 => Just(Action::Replay),
        3 => "[a-zA-Z ]{0,30}".prop_map(Action::GenerationOk),
        1 => arb_cause().prop_map(Action::GenerationErr),
        1 => Just(Action::StaleGeneration),
        2 => Just(Action::PlaybackEnd),
        1 => Just(Action::PlaybackError),
        1 => Just(Action::StalePlayback),
        1 => "[a-z ]{1,20}".prop_map(Action::Transcript),
        1 => any::<bool>().prop_map(Action::CaptureEnd),
        1 => Just(Action::Restart),
    ]
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    // User turns appended == non-empty submits accepted while Idle
    #[test]
    fn prop_user_turns_match_idle_submits(actions in proptest::collection::vec(arb_action(), 0..40)) {
        let ctx = test_context();
        let mut state = CoachState::new(InputState::default());
        let mut expected = 0usize;
        let mut appended = 0usize;

        for action in actions {
            let submitted = match &action {
                Action::Submit(text) => Some(text.clone()),
                Action::SubmitDraft => Some(state.input.draft.clone()),
                _ => None,
            };
            if let Some(text) = submitted {
                if state.phase.is_idle() && !text.trim().is_empty() {
                    expected += 1;
                }
            }

            let event = to_event(action, &state, &ctx);
            if let Ok(result) = transition(&state, &ctx, event) {
                appended += count_role(&result.effects, TurnRole::User);
                state = result.new_state;
            }
        }

        prop_assert_eq!(appended, expected);
    }

    // At most one generation request outstanding at any time
    #[test]
    fn prop_generation_periods_never_overlap(actions in proptest::collection::vec(arb_action(), 0..40)) {
        let ctx = test_context();
        let mut state = CoachState::new(InputState::default());

        for action in actions {
            let event = to_event(action, &state, &ctx);
            if let Ok(result) = transition(&state, &ctx, event) {
                let requests: Vec<RequestId> = result
                    .effects
                    .iter()
                    .filter_map(|e| match e {
                        Effect::RequestGeneration { request_id, .. } => Some(*request_id),
                        _ => None,
                    })
                    .collect();

                prop_assert!(requests.len() <= 1);
                if let Some(request_id) = requests.first() {
                    prop_assert!(state.phase.is_idle(), "request issued from {:?}", state.phase);
                    prop_assert_eq!(
                        result.new_state.phase,
                        Phase::AwaitingGeneration { request_id: *request_id }
                    );
                }
                state = result.new_state;
            }
        }
    }

    // Capture and playback are mutually exclusive, and stopping comes first
    #[test]
    fn prop_capture_and_playback_exclusive(actions in proptest::collection::vec(arb_action(), 0..40)) {
        let ctx = test_context();
        let mut state = CoachState::new(InputState::default());

        for action in actions {
            let event = to_event(action, &state, &ctx);
            if let Ok(result) = transition(&state, &ctx, event) {
                let new = &result.new_state;
                prop_assert!(
                    !(new.phase.is_speaking() && new.input.is_capturing()),
                    "speaking while capturing: {:?}",
                    new
                );

                let effects = &result.effects;
                if let Some(start) = position(effects, |e| matches!(e, Effect::StartCapture { .. })) {
                    if let Some(cancel) = position(effects, |e| *e == Effect::CancelPlayback) {
                        prop_assert!(cancel < start);
                    }
                }
                if let Some(speak) = position(effects, |e| {
                    matches!(e, Effect::Speak { .. } | Effect::SpeakTurn { .. })
                }) {
                    if let Some(stop) = position(effects, |e| *e == Effect::StopCapture) {
                        prop_assert!(stop < speak);
                    }
                    prop_assert!(!new.input.muted);
                }
                state = result.new_state;
            }
        }
    }

    // Stale results are never accepted and never append turns
    #[test]
    fn prop_stale_results_rejected(actions in proptest::collection::vec(arb_action(), 0..30)) {
        let ctx = test_context();
        let mut state = CoachState::new(InputState::default());

        for action in actions {
            let event = to_event(action, &state, &ctx);
            if let Ok(result) = transition(&state, &ctx, event) {
                state = result.new_state;
            }

            let stale = Event::GenerationSucceeded {
                session_id: SessionId::new(),
                request_id: RequestId(1),
                text: "stale".to_string(),
            };
            prop_assert!(matches!(
                transition(&state, &ctx, stale),
                Err(TransitionError::Stale(_))
            ));
        }
    }

    // Muting while speaking: straight to Idle with exactly one cancel
    #[test]
    fn prop_mute_while_speaking_cancels_once(reply in "[a-zA-Z ]{0,30}", capture_first in any::<bool>()) {
        let ctx = test_context();
        let mut state = CoachState::new(InputState::default());
        state = transition(&state, &ctx, Event::submit("question")).unwrap().new_state;
        if capture_first {
            state = transition(&state, &ctx, Event::ToggleCapture).unwrap().new_state;
        }
        let Phase::AwaitingGeneration { request_id } = state.phase else {
            return Err(TestCaseError::fail("expected awaiting generation"));
        };
        state = transition(&state, &ctx, Event::GenerationSucceeded {
            session_id: ctx.session_id,
            request_id,
            text: reply,
        }).unwrap().new_state;
        prop_assert!(state.phase.is_speaking());

        let result = transition(&state, &ctx, Event::ToggleMute).unwrap();

        prop_assert!(result.new_state.phase.is_idle());
        prop_assert!(result.new_state.input.muted);
        let cancels = result.effects.iter().filter(|e| **e == Effect::CancelPlayback).count();
        prop_assert_eq!(cancels, 1);
    }

    // Generation failure from any reachable awaiting state yields one system-error turn
    #[test]
    fn prop_failure_appends_one_system_error(cause in arb_cause(), muted in any::<bool>()) {
        let ctx = test_context();
        let mut state = CoachState::new(InputState::new(true, muted));
        state = transition(&state, &ctx, Event::submit("question")).unwrap().new_state;
        let Phase::AwaitingGeneration { request_id } = state.phase else {
            return Err(TestCaseError::fail("expected awaiting generation"));
        };

        let result = transition(&state, &ctx, Event::GenerationFailed {
            session_id: ctx.session_id,
            request_id,
            error: GenerationError::new(cause, "boom"),
        }).unwrap();

        prop_assert!(result.new_state.phase.is_idle());
        prop_assert_eq!(count_role(&result.effects, TurnRole::SystemError), 1);
        prop_assert_eq!(count_role(&result.effects, TurnRole::Assistant), 0);
    }

    // Reset always lands in a clean Idle state, keeping preferences
    #[test]
    fn prop_reset_is_clean(actions in proptest::collection::vec(arb_action(), 0..30)) {
        let ctx = test_context();
        let mut state = CoachState::new(InputState::default());
        for action in actions {
            let event = to_event(action, &state, &ctx);
            if let Ok(result) = transition(&state, &ctx, event) {
                state = result.new_state;
            }
        }

        let result = transition(&state, &ctx, Event::Reset { topic: Some(Topic::Database) }).unwrap();

        prop_assert!(result.new_state.phase.is_idle());
        prop_assert!(!result.new_state.input.is_capturing());
        prop_assert!(result.new_state.input.draft.is_empty());
        prop_assert_eq!(result.new_state.input.muted, state.input.muted);
        prop_assert_eq!(
            result.effects.last(),
            Some(&Effect::ResetSession { topic: Topic::Database })
        );
    }
}

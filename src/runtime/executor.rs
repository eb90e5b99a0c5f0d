//! Interview session runtime executor

use super::traits::{GenerationClient, GenerationRequest};
use super::{SessionConfig, SessionEvent, StateView};

use crate::conversation::{Conversation, TurnRole};
use crate::speech::{
    CaptureNotice, PlaybackNotice, SpeechCapture, SpeechPlayback,
    SpeechRecognizer, SpeechSynthesizer,
};
use crate::state_machine::{
    transition, CoachState, Effect, Event, InputState, SessionContext, TransitionError,
};
use crate::topic::Topic;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

/// Owns one interview session: conversation, coordinator state and speech adapters
pub struct SessionRuntime<G>
where
    G: GenerationClient + 'static,
{
    context: SessionContext,
    state: CoachState,
    conversation: Conversation,
    generation: Arc<G>,
    playback: SpeechPlayback,
    playback_rx: mpsc::UnboundedReceiver<PlaybackNotice>,
    capture: SpeechCapture,
    capture_rx: mpsc::UnboundedReceiver<CaptureNotice>,
    /// Events from the session handle
    event_rx: mpsc::Receiver<Event>,
    /// Results of background generation tasks
    internal_tx: mpsc::UnboundedSender<Event>,
    internal_rx: mpsc::UnboundedReceiver<Event>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    /// Token to abandon in-flight generation on reset or dispose
    generation_cancel: Option<CancellationToken>,
    stopped: bool,
}

impl<G> SessionRuntime<G>
where
    G: GenerationClient + 'static,
{
    pub fn new(
        topic: Topic,
        generation: Arc<G>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        recognizer: Arc<dyn SpeechRecognizer>,
        config: SessionConfig,
        event_rx: mpsc::Receiver<Event>,
        broadcast_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let (mut playback, playback_rx) = SpeechPlayback::new(synthesizer, config.voice);
        playback.set_muted(config.muted);
        let (capture, capture_rx) = SpeechCapture::new(recognizer);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();

        let input = InputState::new(capture.is_available(), config.muted);

        Self {
            context: SessionContext::new(topic),
            state: CoachState::new(input),
            conversation: Conversation::new(topic),
            generation,
            playback,
            playback_rx,
            capture,
            capture_rx,
            event_rx,
            internal_tx,
            internal_rx,
            broadcast_tx,
            generation_cancel: None,
            stopped: false,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            session = %self.context.session_id,
            topic = %self.context.topic,
            "Starting interview session"
        );

        self.playback.resolve_voice().await;
        self.publish_reset();
        self.publish_state();

        // Process events in a loop until disposed or every handle is gone
        while !self.stopped {
            tokio::select! {
                event = self.event_rx.recv() => {
                    let event = event.unwrap_or_else(|| {
                        tracing::debug!("Session handle dropped");
                        Event::Dispose
                    });
                    self.process_event(event);
                }
                Some(event) = self.internal_rx.recv() => self.process_event(event),
                Some(notice) = self.playback_rx.recv() => {
                    if let Some(event) = self.on_playback_notice(notice) {
                        self.process_event(event);
                    }
                }
                Some(notice) = self.capture_rx.recv() => {
                    let event = self.on_capture_notice(notice);
                    self.process_event(event);
                }
            }
        }

        tracing::info!(session = %self.context.session_id, "Interview session stopped");
    }

    fn on_playback_notice(&mut self, notice: PlaybackNotice) -> Option<Event> {
        match notice {
            PlaybackNotice::Started { id } => {
                tracing::debug!(utterance = %id, "Playback started");
                None
            }
            PlaybackNotice::Finished { id } => {
                self.playback.settle(id);
                Some(Event::PlaybackEnded { utterance_id: id })
            }
            PlaybackNotice::Failed { id, error } => {
                self.playback.settle(id);
                tracing::warn!(utterance = %id, error = %error, "Playback failed");
                Some(Event::PlaybackFailed { utterance_id: id })
            }
        }
    }

    fn on_capture_notice(&mut self, notice: CaptureNotice) -> Event {
        match notice {
            CaptureNotice::Transcript { id, transcript } => Event::CaptureTranscript {
                capture_id: id,
                transcript,
            },
            CaptureNotice::Ended { id, error } => {
                self.capture.settle(id);
                Event::CaptureEnded {
                    capture_id: id,
                    error,
                }
            }
        }
    }

    fn process_event(&mut self, event: Event) {
        // Effects may generate follow-up events; handle them without recursion
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            let name = current_event.name();

            let result = match transition(&self.state, &self.context, current_event) {
                Ok(r) => r,
                Err(TransitionError::Stale(what)) => {
                    tracing::debug!(event = name, "Ignoring stale {what}");
                    continue;
                }
                Err(e) => {
                    tracing::info!(event = name, error = %e, "Event rejected");
                    let _ = self.broadcast_tx.send(SessionEvent::Rejected {
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            let changed = result.new_state != self.state;
            self.state = result.new_state;
            tracing::debug!(event = name, phase = self.state.phase.name(), "Transition");

            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(effect) {
                    events_to_process.push(generated_event);
                }
            }

            if changed {
                self.publish_state();
            }
        }
    }

    /// Execute an effect and optionally return a generated event
    #[allow(clippy::too_many_lines)] // Effect handling is inherently complex
    fn execute_effect(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::AppendTurn { role, content } => {
                let turn = self.conversation.append(role, content);
                let _ = self.broadcast_tx.send(SessionEvent::TurnAppended { turn });
                None
            }

            Effect::RequestGeneration { request_id, prompt } => {
                // The user turn was appended just before this effect
                let history = match self.conversation.last() {
                    Some(turn) => self.conversation.history_before(turn.id),
                    None => self.conversation.history(),
                };
                let request = GenerationRequest {
                    topic: self.context.topic,
                    prompt,
                    history,
                };

                let cancel_token = CancellationToken::new();
                if let Some(previous) = self.generation_cancel.replace(cancel_token.clone()) {
                    previous.cancel();
                }

                let generation = self.generation.clone();
                let internal_tx = self.internal_tx.clone();
                let session_id = self.context.session_id;

                tokio::spawn(async move {
                    tracing::info!(
                        session = %session_id,
                        request = %request_id,
                        history_len = request.history.len(),
                        "Requesting interviewer reply (background)"
                    );

                    // Race generation against reset/dispose
                    tokio::select! {
                        biased;

                        () = cancel_token.cancelled() => {
                            tracing::debug!(request = %request_id, "Generation abandoned");
                        }

                        result = generation.generate(&request) => {
                            let event = match result {
                                Ok(text) => Event::GenerationSucceeded {
                                    session_id,
                                    request_id,
                                    text,
                                },
                                Err(error) => {
                                    tracing::warn!(
                                        request = %request_id,
                                        cause = %error.cause,
                                        detail = %error.detail,
                                        "Generation failed"
                                    );
                                    Event::GenerationFailed {
                                        session_id,
                                        request_id,
                                        error,
                                    }
                                }
                            };
                            let _ = internal_tx.send(event);
                        }
                    }
                });

                None
            }

            Effect::Speak { utterance_id, text } => {
                if self.playback.speak(utterance_id, &text) {
                    None
                } else {
                    Some(Event::PlaybackEnded { utterance_id })
                }
            }

            Effect::SpeakTurn {
                utterance_id,
                turn_id,
            } => {
                let content = self
                    .conversation
                    .get(turn_id)
                    .filter(|turn| turn.role == TurnRole::Assistant)
                    .map(|turn| turn.content.clone());

                let Some(content) = content else {
                    tracing::warn!(utterance = %utterance_id, turn = %turn_id, "No interviewer turn to replay");
                    return Some(Event::PlaybackFailed { utterance_id });
                };
                if self.playback.speak(utterance_id, &content) {
                    None
                } else {
                    Some(Event::PlaybackEnded { utterance_id })
                }
            }

            Effect::CancelPlayback => {
                self.playback.cancel();
                None
            }

            Effect::StartCapture { capture_id } => match self.capture.start(capture_id) {
                Ok(()) => None,
                Err(error) => {
                    tracing::warn!(capture = %capture_id, error = %error, "Could not start capture");
                    Some(Event::CaptureEnded {
                        capture_id,
                        error: Some(error),
                    })
                }
            },

            Effect::StopCapture => {
                self.capture.stop();
                None
            }

            Effect::SetMuted { muted } => {
                self.playback.set_muted(muted);
                None
            }

            Effect::ResetSession { topic } => {
                self.abandon_generation();
                self.conversation.reset(topic);
                self.context = SessionContext::new(topic);
                tracing::info!(
                    session = %self.context.session_id,
                    topic = %topic,
                    "Session reset"
                );
                self.publish_reset();
                self.publish_state();
                None
            }

            Effect::Shutdown => {
                self.abandon_generation();
                self.stopped = true;
                let _ = self.broadcast_tx.send(SessionEvent::Closed);
                None
            }
        }
    }

    fn abandon_generation(&mut self) {
        if let Some(token) = self.generation_cancel.take() {
            token.cancel();
        }
    }

    fn state_view(&self) -> StateView {
        StateView {
            topic: self.context.topic,
            phase: self.state.phase,
            input: self.state.input.clone(),
        }
    }

    fn publish_state(&self) {
        let _ = self.broadcast_tx.send(SessionEvent::StateChanged {
            state: self.state_view(),
        });
    }

    fn publish_reset(&self) {
        let _ = self.broadcast_tx.send(SessionEvent::Reset {
            topic: self.context.topic,
            turns: self.conversation.turns().to_vec(),
        });
    }
}

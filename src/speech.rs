//! Speech capture and playback adapters
//!
//! The platform engines are capability traits ([`SpeechRecognizer`],
//! [`SpeechSynthesizer`]). The adapters wrapping them own the "at most one
//! active" rules and report back through notification channels tagged with
//! capture/utterance ids, so a stale notification can always be told apart
//! from a live one.

mod capture;
mod command;
mod markdown;
mod playback;

pub use capture::{
    CaptureError, CaptureId, CaptureNotice, SpeechCapture, SpeechRecognizer, Transcript,
    UnavailableRecognizer,
};
pub use command::{CommandRecognizer, CommandSynthesizer, SilentSynthesizer};
pub use playback::{
    PlaybackError, PlaybackNotice, SpeechPlayback, SpeechSynthesizer, Utterance, UtteranceId,
    VoiceSettings,
};

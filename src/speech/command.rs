//! Speech engines backed by external programs
//!
//! The synthesizer pipes text into a TTS program (e.g. `espeak-ng`); the
//! recognizer reads transcript hypotheses line by line from an STT
//! program's stdout. Both are killed when cancelled.

use super::{
    CaptureError, PlaybackError, SpeechRecognizer, SpeechSynthesizer, Transcript, Utterance,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// espeak's default speaking rate in words per minute
const ESPEAK_BASE_WPM: f32 = 175.0;

/// Split a command line and locate the program on PATH
fn locate(command_line: &str) -> Option<(PathBuf, Vec<String>)> {
    let mut parts = command_line.split_whitespace();
    let program = parts.next()?;
    match which::which(program) {
        Ok(path) => Some((path, parts.map(str::to_string).collect())),
        Err(e) => {
            tracing::warn!(program = %program, error = %e, "Speech program not found on PATH");
            None
        }
    }
}

fn is_espeak(program: &Path) -> bool {
    program
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("espeak"))
}

/// Text-to-speech through an external program reading stdin
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandSynthesizer {
    /// Resolve `command_line`; `None` when the program is missing
    pub fn detect(command_line: &str) -> Option<Self> {
        let (program, args) = locate(command_line)?;
        Some(Self { program, args })
    }

    /// Engine-specific flags for voice, rate, pitch and volume
    fn voice_args(&self, utterance: &Utterance) -> Vec<String> {
        if !is_espeak(&self.program) {
            return Vec::new();
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let mut args = vec![
            "-s".to_string(),
            ((ESPEAK_BASE_WPM * utterance.rate).round() as u32).to_string(),
            "-p".to_string(),
            ((50.0 * utterance.pitch).round().clamp(0.0, 99.0) as u32).to_string(),
            "-a".to_string(),
            ((100.0 * utterance.volume).round().clamp(0.0, 200.0) as u32).to_string(),
        ];
        if let Some(voice) = &utterance.voice {
            args.push("-v".to_string());
            args.push(voice.clone());
        }
        args
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSynthesizer {
    async fn voices(&self) -> Vec<String> {
        if !is_espeak(&self.program) {
            return Vec::new();
        }

        let Ok(output) = Command::new(&self.program).arg("--voices").output().await else {
            return Vec::new();
        };
        if !output.status.success() {
            return Vec::new();
        }

        // Columns: Pty Language Age/Gender VoiceName File Other
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .skip(1)
            .filter_map(|line| line.split_whitespace().nth(3).map(str::to_string))
            .collect()
    }

    async fn speak(
        &self,
        utterance: &Utterance,
        cancel: CancellationToken,
    ) -> Result<(), PlaybackError> {
        if utterance.text.is_empty() {
            return Ok(());
        }

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .args(self.voice_args(utterance))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PlaybackError::Unavailable(format!("{}: {e}", self.program.display())))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(utterance.text.as_bytes())
                .await
                .map_err(|e| PlaybackError::Engine(format!("Failed to write text: {e}")))?;
            // stdin dropped here so the engine sees EOF
        }

        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                let _ = child.kill().await;
                Ok(())
            }

            status = child.wait() => {
                let status = status
                    .map_err(|e| PlaybackError::Engine(format!("Failed to wait for engine: {e}")))?;
                if status.success() {
                    Ok(())
                } else {
                    Err(PlaybackError::Engine(format!("engine exited with {status}")))
                }
            }
        }
    }
}

/// Synthesizer used when no TTS engine is installed
pub struct SilentSynthesizer;

#[async_trait]
impl SpeechSynthesizer for SilentSynthesizer {
    async fn speak(
        &self,
        _utterance: &Utterance,
        _cancel: CancellationToken,
    ) -> Result<(), PlaybackError> {
        Err(PlaybackError::Unavailable(
            "no text-to-speech engine configured".to_string(),
        ))
    }
}

/// Speech-to-text through an external program.
///
/// Each non-empty stdout line is an interim hypothesis; the last line seen
/// before the program exits is repeated as the final result.
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandRecognizer {
    /// Resolve `command_line`; `None` when the program is missing
    pub fn detect(command_line: &str) -> Option<Self> {
        let (program, args) = locate(command_line)?;
        Some(Self { program, args })
    }
}

#[async_trait]
impl SpeechRecognizer for CommandRecognizer {
    fn is_available(&self) -> bool {
        true
    }

    async fn listen(
        &self,
        transcripts: mpsc::UnboundedSender<Transcript>,
        cancel: CancellationToken,
    ) -> Result<(), CaptureError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CaptureError::Engine(format!("{}: {e}", self.program.display())))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CaptureError::Engine("engine stdout unavailable".to_string()))?;
        let mut lines = BufReader::new(stdout).lines();
        let mut last: Option<String> = None;

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    let _ = child.kill().await;
                    return Ok(());
                }

                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            let text = line.trim();
                            if !text.is_empty() {
                                let _ = transcripts.send(Transcript::interim(text));
                                last = Some(text.to_string());
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            let _ = child.kill().await;
                            return Err(CaptureError::Engine(format!("Failed to read transcript: {e}")));
                        }
                    }
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| CaptureError::Engine(format!("Failed to wait for engine: {e}")))?;

        if let Some(text) = last {
            let _ = transcripts.send(Transcript::final_result(text));
        }

        if status.success() {
            Ok(())
        } else {
            Err(CaptureError::Engine(format!("engine exited with {status}")))
        }
    }
}

//! Text-to-Speech
//!
//! Narration for reels. Hashtag lines are never spoken. Synthesis failures are
//! reported and turned into "no audio"; the reel is then rendered silent.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{error, info};

use crate::services::captions::strip_hashtag_lines;
use crate::services::notify::Notifier;

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("Failed to start TTS engine: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("TTS engine exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("TTS engine timed out after {0:?}")]
    Timeout(Duration),
    #[error("TTS engine produced no audio at {0}")]
    MissingOutput(PathBuf),
    #[error("Nothing to speak once hashtag lines are removed")]
    NothingToSay,
}

/// Speech engine that writes an audio file for `text`
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str, output: &Path) -> Result<(), SpeechError>;
}

/// `edge-tts` command-line engine
pub struct EdgeTtsEngine {
    command: String,
    timeout: Duration,
}

impl EdgeTtsEngine {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }
}

#[async_trait]
impl SpeechEngine for EdgeTtsEngine {
    async fn synthesize(&self, text: &str, voice: &str, output: &Path) -> Result<(), SpeechError> {
        let child = Command::new(&self.command)
            .args(edge_tts_args(text, voice, output))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let result = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| SpeechError::Timeout(self.timeout))??;

        if !result.status.success() {
            return Err(SpeechError::Failed {
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        if !output.exists() {
            return Err(SpeechError::MissingOutput(output.to_path_buf()));
        }

        Ok(())
    }
}

/// Command line for one narration; the text is attached to its flag so a
/// leading `-` is never parsed as an option.
fn edge_tts_args(text: &str, voice: &str, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--voice".into(),
        voice.into(),
        format!("--text={}", text).into(),
        "--write-media".into(),
    ];
    args.push(output.as_os_str().to_os_string());
    args
}

pub struct SpeechSynthesizer {
    engine: Arc<dyn SpeechEngine>,
    voice: String,
    notifier: Notifier,
}

impl SpeechSynthesizer {
    pub fn new(engine: Arc<dyn SpeechEngine>, voice: impl Into<String>, notifier: Notifier) -> Self {
        Self {
            engine,
            voice: voice.into(),
            notifier,
        }
    }

    /// Narrate `script` into `output`, or `None` if synthesis failed
    pub async fn synthesize(&self, script: &str, output: &Path) -> Option<PathBuf> {
        match self.try_synthesize(script, output).await {
            Ok(()) => {
                info!("Narration written to {}", output.display());
                Some(output.to_path_buf())
            }
            Err(e) => {
                error!("TTS error for {}: {}", output.display(), e);
                self.notifier.notify(&format!("TTS failed: {}", e)).await;
                None
            }
        }
    }

    async fn try_synthesize(&self, script: &str, output: &Path) -> Result<(), SpeechError> {
        let spoken = strip_hashtag_lines(script);
        if spoken.is_empty() {
            return Err(SpeechError::NothingToSay);
        }
        self.engine.synthesize(&spoken, &self.voice, output).await
    }
}

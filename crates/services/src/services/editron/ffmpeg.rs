//! FFmpeg wrapper for rendering and probing

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use super::{EditronError, EditronResult, MediaEncoder};

/// FFmpeg client for rendering
pub struct FFmpegClient {
    ffmpeg_path: PathBuf,
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl FFmpegClient {
    pub fn new(ffmpeg: &str, ffprobe: &str, timeout: Duration) -> Self {
        Self {
            ffmpeg_path: Self::find_executable(ffmpeg),
            ffprobe_path: Self::find_executable(ffprobe),
            timeout,
        }
    }

    /// Resolve `name` through PATH; unresolved names are kept as given and fail at spawn time
    fn find_executable(name: &str) -> PathBuf {
        which::which(name).unwrap_or_else(|_| PathBuf::from(name))
    }

    async fn execute(&self, program: &Path, args: &[String]) -> EditronResult<Output> {
        debug!("Running {} {}", program.display(), args.join(" "));

        let child = Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| EditronError::Timeout(program.display().to_string(), self.timeout))?
            .map_err(|e| EditronError::Process(format!("{}: {}", program.display(), e)))
    }

    /// Get the FFmpeg executable path
    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg_path
    }
}

#[async_trait]
impl MediaEncoder for FFmpegClient {
    async fn probe_duration(&self, path: &Path) -> EditronResult<f64> {
        if !path.exists() {
            return Err(EditronError::FileNotFound(path.to_path_buf()));
        }

        let args = vec![
            "-v".to_string(),
            "quiet".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            "-show_format".to_string(),
            path.to_string_lossy().to_string(),
        ];

        let output = self.execute(&self.ffprobe_path, &args).await?;
        if !output.status.success() {
            return Err(EditronError::FFmpeg(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }

        parse_probe_duration(&output.stdout)
    }

    async fn encode(&self, args: &[String], output: &Path) -> EditronResult<()> {
        let mut full_args = vec!["-y".to_string(), "-hide_banner".to_string()];
        full_args.extend_from_slice(args);
        full_args.push(output.to_string_lossy().to_string());

        let result = self.execute(&self.ffmpeg_path, &full_args).await?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            // The tail of the log carries the actual error.
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            return Err(EditronError::FFmpeg(format!(
                "FFmpeg failed with status {}: {}",
                result.status,
                tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
            )));
        }

        if !output.exists() {
            return Err(EditronError::FileNotFound(output.to_path_buf()));
        }

        Ok(())
    }
}

/// Read `format.duration` from `ffprobe -print_format json -show_format` output
pub fn parse_probe_duration(stdout: &[u8]) -> EditronResult<f64> {
    let json: Value =
        serde_json::from_slice(stdout).map_err(|e| EditronError::FFmpeg(e.to_string()))?;

    json["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| EditronError::FFmpeg("No duration in probe output".to_string()))
}

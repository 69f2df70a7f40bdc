//! Editron - Media Rendering
//!
//! Renders the day's media locally through FFmpeg:
//! - `reel`: caption cards over a solid background, faded and concatenated,
//!   muxed with narration (or a silent track)
//! - `card`: square image cards with a border, an optional title and wrapped body text
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   ┌──────────────────┐
//! │  VideoAssembler  │   │   CardRenderer   │
//! │   (ReelPlan)     │   │   (CardLayout)   │
//! └────────┬─────────┘   └────────┬─────────┘
//!          │   ffmpeg args        │
//!          └──────────┬───────────┘
//!            ┌────────▼────────┐
//!            │  MediaEncoder   │  (FFmpegClient)
//!            └─────────────────┘
//! ```

pub mod card;
pub mod ffmpeg;
pub mod reel;

pub use card::{CardLayout, CardRenderer, OverflowPolicy};
pub use ffmpeg::FFmpegClient;
pub use reel::{ReelPlan, ReelStyle, VideoAssembler};

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EditronError {
    #[error("FFmpeg error: {0}")]
    FFmpeg(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Process error: {0}")]
    Process(String),

    #[error("{0} timed out after {1:?}")]
    Timeout(String, Duration),

    #[error("Script has no words to show")]
    EmptyScript,
}

pub type EditronResult<T> = Result<T, EditronError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Image,
}

/// A rendered file on local disk, owned by the run until it is uploaded
#[derive(Debug, Clone, PartialEq)]
pub struct MediaAsset {
    pub local_path: PathBuf,
    pub kind: MediaKind,
    /// Rendered length in seconds, for videos
    pub duration_hint: Option<f64>,
}

/// Solid RGB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Background used by every reel and card.
pub const BRAND_BLUE: Rgb = Rgb(0, 90, 200);

impl fmt::Display for Rgb {
    /// FFmpeg colour syntax, e.g. `0x005AC8`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

/// Rendering engine the assemblers drive
#[async_trait]
pub trait MediaEncoder: Send + Sync {
    /// Duration of a media file in seconds
    async fn probe_duration(&self, path: &Path) -> EditronResult<f64>;

    /// Run one encode with `args` (inputs, filters, codecs) writing to `output`
    async fn encode(&self, args: &[String], output: &Path) -> EditronResult<()>;
}

/// Escape a value for a filter option inside a filtergraph.
///
/// The option parser and the graph parser each strip one level of escaping,
/// so the value is escaped for the option level first and the graph level second.
pub fn escape_filter_value(value: &str) -> String {
    let option_level = escape_chars(value, &['\\', '\'', ':']);
    escape_chars(&option_level, &['\\', '\'', '[', ']', ',', ';'])
}

fn escape_chars(value: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Format seconds the way filter arguments expect them
pub(crate) fn secs(value: f64) -> String {
    format!("{:.3}", value)
}

//! Square image cards for the static post and carousel slides

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::{escape_filter_value, EditronResult, MediaAsset, MediaEncoder, MediaKind, Rgb, BRAND_BLUE};
use crate::services::captions::wrap;
use crate::services::notify::Notifier;

pub const CARD_SIZE: u32 = 1080;
const BORDER_INSET: u32 = 20;
const BORDER_THICKNESS: u32 = 5;
const MARGIN_X: u32 = 60;
const TOP_Y: u32 = 60;
const TITLE_FONT_SIZE: u32 = 80;
const TITLE_ADVANCE: u32 = 140;
const BODY_FONT_SIZE: u32 = 56;
const BODY_ADVANCE: u32 = 70;
/// Drawing stops once the cursor passes this line.
const BOTTOM_LIMIT: u32 = 980;
const WRAP_WIDTH: usize = 24;

/// What happens to body lines that do not fit on the card
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Drop the remaining lines without any marker
    #[default]
    Truncate,
    /// Drop the remaining lines and end the last drawn line with `…`
    Ellipsis,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedLine {
    pub y: u32,
    pub text: String,
}

/// Positions of the title and body lines on a card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardLayout {
    pub title: Option<String>,
    pub lines: Vec<PlacedLine>,
    /// Whether any body line was left out
    pub truncated: bool,
}

impl CardLayout {
    pub fn layout(text: &str, title: Option<&str>, policy: OverflowPolicy) -> Self {
        let mut y = TOP_Y;
        if title.is_some() {
            y += TITLE_ADVANCE;
        }

        // Blank source lines keep their vertical space.
        let wrapped: Vec<String> = text
            .lines()
            .flat_map(|line| {
                let lines = wrap(line, WRAP_WIDTH);
                if lines.is_empty() {
                    vec![String::new()]
                } else {
                    lines
                }
            })
            .collect();

        let mut lines = Vec::new();
        for text in &wrapped {
            lines.push(PlacedLine {
                y,
                text: text.clone(),
            });
            y += BODY_ADVANCE;
            if y > BOTTOM_LIMIT {
                break;
            }
        }

        let truncated = lines.len() < wrapped.len();
        if truncated && policy == OverflowPolicy::Ellipsis {
            if let Some(last) = lines.last_mut() {
                let kept: String = last.text.chars().take(WRAP_WIDTH - 1).collect();
                last.text = format!("{}…", kept.trim_end());
            }
        }

        Self {
            title: title.map(str::to_string),
            lines,
            truncated,
        }
    }

    /// FFmpeg arguments drawing this layout as a single PNG frame
    pub fn ffmpeg_args(&self, font_path: &Path, background: Rgb) -> Vec<String> {
        let font = escape_filter_value(&font_path.to_string_lossy());
        let white = Rgb(255, 255, 255);

        let mut filters = vec![format!(
            "drawbox=x={inset}:y={inset}:w={side}:h={side}:color={white}:t={t}",
            inset = BORDER_INSET,
            side = CARD_SIZE - 2 * BORDER_INSET,
            white = white,
            t = BORDER_THICKNESS
        )];

        if let Some(title) = &self.title {
            filters.push(drawtext(&font, title, TITLE_FONT_SIZE, white, TOP_Y));
        }

        for line in self.lines.iter().filter(|l| !l.text.is_empty()) {
            filters.push(drawtext(&font, &line.text, BODY_FONT_SIZE, white, line.y));
        }

        vec![
            "-f".to_string(),
            "lavfi".to_string(),
            "-i".to_string(),
            format!("color=c={}:s={}x{}", background, CARD_SIZE, CARD_SIZE),
            "-vf".to_string(),
            filters.join(","),
            "-frames:v".to_string(),
            "1".to_string(),
        ]
    }
}

fn drawtext(font: &str, text: &str, size: u32, color: Rgb, y: u32) -> String {
    format!(
        "drawtext=fontfile={}:expansion=none:text={}:fontsize={}:fontcolor={}:x={}:y={}",
        font,
        escape_filter_value(text),
        size,
        color,
        MARGIN_X,
        y
    )
}

/// Renders text cards to PNG files
pub struct CardRenderer {
    encoder: Arc<dyn MediaEncoder>,
    font_path: PathBuf,
    overflow: OverflowPolicy,
    notifier: Notifier,
}

impl CardRenderer {
    pub fn new(
        encoder: Arc<dyn MediaEncoder>,
        font_path: impl Into<PathBuf>,
        overflow: OverflowPolicy,
        notifier: Notifier,
    ) -> Self {
        Self {
            encoder,
            font_path: font_path.into(),
            overflow,
            notifier,
        }
    }

    /// Render `text` (and an optional `title`) to `output`, or `None` on failure
    pub async fn render(&self, text: &str, output: &Path, title: Option<&str>) -> Option<MediaAsset> {
        match self.try_render(text, output, title).await {
            Ok(asset) => {
                info!("Card rendered to {}", output.display());
                Some(asset)
            }
            Err(e) => {
                error!("Image creation error for {}: {}", output.display(), e);
                self.notifier
                    .notify(&format!("Image creation failed: {}", e))
                    .await;
                None
            }
        }
    }

    async fn try_render(
        &self,
        text: &str,
        output: &Path,
        title: Option<&str>,
    ) -> EditronResult<MediaAsset> {
        let layout = CardLayout::layout(text, title, self.overflow);
        if layout.truncated {
            warn!(
                "Card text for {} does not fit, {} lines drawn",
                output.display(),
                layout.lines.len()
            );
        }

        let args = layout.ffmpeg_args(&self.font_path, BRAND_BLUE);
        self.encoder.encode(&args, output).await?;

        Ok(MediaAsset {
            local_path: output.to_path_buf(),
            kind: MediaKind::Image,
            duration_hint: None,
        })
    }
}

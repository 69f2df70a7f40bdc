//! Reel assembly
//!
//! A reel is a sequence of fixed-length caption cards over a solid background.
//! Each card fades in and out; cards are concatenated in script order and
//! muxed with the narration. When the narration outlasts the captions the last
//! frame is held, when the captions outlast the narration the audio is padded
//! with silence, so neither stream is cut short.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn};

use super::{
    escape_filter_value, secs, EditronError, EditronResult, MediaAsset, MediaEncoder, MediaKind,
    Rgb, BRAND_BLUE,
};
use crate::services::captions::{chunk, on_screen_script, wrap, DEFAULT_WORDS_PER_CHUNK};
use crate::services::notify::Notifier;

/// Seconds each caption card stays on screen.
pub const CAPTION_SECONDS: f64 = 3.5;

/// Fade-in and fade-out length of every caption card.
pub const FADE_SECONDS: f64 = 0.5;

pub const REEL_FPS: u32 = 30;

/// Visual parameters of a reel
#[derive(Debug, Clone, PartialEq)]
pub struct ReelStyle {
    pub width: u32,
    pub height: u32,
    pub background: Rgb,
    pub text_color: Rgb,
    pub font_path: PathBuf,
    pub font_size: u32,
    /// Characters per caption line
    pub wrap_width: usize,
    pub words_per_chunk: usize,
    pub caption_seconds: f64,
    pub fade_seconds: f64,
    pub fps: u32,
}

impl ReelStyle {
    /// 1080x1920 portrait reel with white captions on the brand background
    pub fn vertical(font_path: impl Into<PathBuf>) -> Self {
        Self {
            width: 1080,
            height: 1920,
            background: BRAND_BLUE,
            text_color: Rgb(255, 255, 255),
            font_path: font_path.into(),
            font_size: 70,
            wrap_width: 22,
            words_per_chunk: DEFAULT_WORDS_PER_CHUNK,
            caption_seconds: CAPTION_SECONDS,
            fade_seconds: FADE_SECONDS,
            fps: REEL_FPS,
        }
    }

    fn line_height(&self) -> u32 {
        self.font_size + 16
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Narration {
    path: PathBuf,
    duration: f64,
}

/// Everything needed to render one reel
#[derive(Debug, Clone)]
pub struct ReelPlan {
    chunks: Vec<String>,
    style: ReelStyle,
    narration: Option<Narration>,
}

impl ReelPlan {
    /// Plan captions for `script`; hashtag lines are not shown unless nothing else is left
    pub fn new(script: &str, style: &ReelStyle) -> EditronResult<Self> {
        let chunks = chunk(&on_screen_script(script), style.words_per_chunk);
        if chunks.is_empty() {
            return Err(EditronError::EmptyScript);
        }

        Ok(Self {
            chunks,
            style: style.clone(),
            narration: None,
        })
    }

    pub fn with_narration(mut self, path: impl Into<PathBuf>, duration: f64) -> Self {
        self.narration = Some(Narration {
            path: path.into(),
            duration: duration.max(0.0),
        });
        self
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    pub fn has_narration(&self) -> bool {
        self.narration.is_some()
    }

    /// Length of the concatenated caption cards
    pub fn caption_duration(&self) -> f64 {
        self.chunks.len() as f64 * self.style.caption_seconds
    }

    /// Length of the rendered reel: the longer of captions and narration
    pub fn final_duration(&self) -> f64 {
        match &self.narration {
            Some(narration) => self.caption_duration().max(narration.duration),
            None => self.caption_duration(),
        }
    }

    /// FFmpeg arguments (without the leading `-y` and the output path)
    pub fn ffmpeg_args(&self) -> Vec<String> {
        let style = &self.style;
        let total = self.final_duration();
        let mut args = Vec::new();

        for _ in &self.chunks {
            args.extend([
                "-f".to_string(),
                "lavfi".to_string(),
                "-t".to_string(),
                secs(style.caption_seconds),
                "-i".to_string(),
                format!(
                    "color=c={}:s={}x{}:r={}",
                    style.background, style.width, style.height, style.fps
                ),
            ]);
        }

        let audio_input = self.chunks.len();
        match &self.narration {
            Some(narration) => {
                args.push("-i".to_string());
                args.push(narration.path.to_string_lossy().to_string());
            }
            None => {
                args.extend([
                    "-f".to_string(),
                    "lavfi".to_string(),
                    "-t".to_string(),
                    secs(total),
                    "-i".to_string(),
                    "anullsrc=channel_layout=stereo:sample_rate=44100".to_string(),
                ]);
            }
        }

        args.push("-filter_complex".to_string());
        args.push(self.filter_graph(audio_input));

        args.extend([
            "-map".to_string(),
            "[vout]".to_string(),
            "-map".to_string(),
            "[aout]".to_string(),
            "-t".to_string(),
            secs(total),
            "-r".to_string(),
            style.fps.to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            "128k".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
        ]);

        args
    }

    fn filter_graph(&self, audio_input: usize) -> String {
        let style = &self.style;
        let fade_out_start = (style.caption_seconds - style.fade_seconds).max(0.0);
        let mut graph: Vec<String> = Vec::new();

        for (i, text) in self.chunks.iter().enumerate() {
            let mut filters = self.caption_filters(text);
            filters.push(format!("fade=t=in:st=0:d={}", secs(style.fade_seconds)));
            filters.push(format!(
                "fade=t=out:st={}:d={}",
                secs(fade_out_start),
                secs(style.fade_seconds)
            ));
            graph.push(format!("[{}:v]{}[v{}]", i, filters.join(","), i));
        }

        let labels: String = (0..self.chunks.len()).map(|i| format!("[v{}]", i)).collect();
        graph.push(format!(
            "{}concat=n={}:v=1:a=0[vcat]",
            labels,
            self.chunks.len()
        ));

        let hold = self.final_duration() - self.caption_duration();
        if hold > 0.0 {
            // Hold on the plain background, not the faded-out last frame.
            graph.push(format!(
                "[vcat]tpad=stop_mode=add:stop_duration={}:color={}[vout]",
                secs(hold),
                style.background
            ));
        } else {
            graph.push("[vcat]null[vout]".to_string());
        }

        graph.push(format!(
            "[{}:a]apad=whole_dur={}[aout]",
            audio_input,
            secs(self.final_duration())
        ));

        graph.join(";")
    }

    /// One centred `drawtext` per wrapped caption line
    fn caption_filters(&self, text: &str) -> Vec<String> {
        let style = &self.style;
        let lines = wrap(text, style.wrap_width);
        let block_height = lines.len() as u32 * style.line_height();
        let top = style.height.saturating_sub(block_height) / 2;
        let font = escape_filter_value(&style.font_path.to_string_lossy());

        lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                format!(
                    "drawtext=fontfile={}:expansion=none:text={}:fontsize={}:fontcolor={}:x=(w-text_w)/2:y={}",
                    font,
                    escape_filter_value(line),
                    style.font_size,
                    style.text_color,
                    top + i as u32 * style.line_height()
                )
            })
            .collect()
    }
}

/// Renders reel scripts into MP4 files
pub struct VideoAssembler {
    encoder: Arc<dyn MediaEncoder>,
    style: ReelStyle,
    notifier: Notifier,
}

impl VideoAssembler {
    pub fn new(encoder: Arc<dyn MediaEncoder>, style: ReelStyle, notifier: Notifier) -> Self {
        Self {
            encoder,
            style,
            notifier,
        }
    }

    /// Render `script` to `output`, or `None` if rendering failed
    pub async fn assemble(
        &self,
        script: &str,
        audio: Option<&Path>,
        output: &Path,
    ) -> Option<MediaAsset> {
        match self.try_assemble(script, audio, output).await {
            Ok(asset) => {
                info!(
                    "Reel rendered to {} ({:.1}s)",
                    output.display(),
                    asset.duration_hint.unwrap_or_default()
                );
                Some(asset)
            }
            Err(e) => {
                error!("Reel creation error for {}: {}", output.display(), e);
                self.notifier
                    .notify(&format!("Reel creation failed: {}", e))
                    .await;
                None
            }
        }
    }

    async fn try_assemble(
        &self,
        script: &str,
        audio: Option<&Path>,
        output: &Path,
    ) -> EditronResult<MediaAsset> {
        let mut plan = ReelPlan::new(script, &self.style)?;

        if let Some(audio) = audio {
            match self.encoder.probe_duration(audio).await {
                Ok(duration) => plan = plan.with_narration(audio, duration),
                Err(e) => warn!(
                    "Could not read narration {}, rendering silent reel: {}",
                    audio.display(),
                    e
                ),
            }
        }

        self.encoder.encode(&plan.ffmpeg_args(), output).await?;

        Ok(MediaAsset {
            local_path: output.to_path_buf(),
            kind: MediaKind::Video,
            duration_hint: Some(plan.final_duration()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{FakeEncoder, RecordingChannel};

    const SCRIPT: &str = "Stop saying I am agree because it is wrong. Say I agree instead, it is short and natural!\nComment your answer below\n#EnglishLearning #Grammar";

    fn style() -> ReelStyle {
        ReelStyle::vertical("/fonts/DejaVuSans-Bold.ttf")
    }

    fn graph(args: &[String]) -> &str {
        let idx = args.iter().position(|a| a == "-filter_complex").unwrap();
        &args[idx + 1]
    }

    #[test]
    fn test_plan_drops_hashtag_lines_and_chunks_by_ten() {
        let plan = ReelPlan::new(SCRIPT, &style()).unwrap();
        assert_eq!(plan.chunks().len(), 3);
        assert_eq!(
            plan.chunks()[0],
            "Stop saying I am agree because it is wrong. Say"
        );
        assert!(plan.chunks().iter().all(|c| !c.contains('#')));
        assert!((plan.caption_duration() - 10.5).abs() < 1e-9);
    }

    #[test]
    fn test_hashtag_only_script_is_shown_raw() {
        let plan = ReelPlan::new("#EnglishLearning #ESL", &style()).unwrap();
        assert_eq!(plan.chunks(), ["#EnglishLearning #ESL"]);
    }

    #[test]
    fn test_blank_script_is_rejected() {
        assert!(matches!(
            ReelPlan::new("  \n ", &style()),
            Err(EditronError::EmptyScript)
        ));
    }

    #[test]
    fn test_long_narration_extends_video() {
        let plan = ReelPlan::new(SCRIPT, &style())
            .unwrap()
            .with_narration("/tmp/reel1_audio.mp3", 14.0);
        assert!((plan.final_duration() - 14.0).abs() < 1e-9);

        let args = plan.ffmpeg_args();
        let graph = graph(&args);
        assert!(graph.contains("tpad=stop_mode=add:stop_duration=3.500:color=0x005AC8[vout]"));
        assert!(!graph.contains("stop_mode=clone"));
        assert!(graph.contains("[3:a]apad=whole_dur=14.000[aout]"));
        assert!(args.contains(&"/tmp/reel1_audio.mp3".to_string()));
    }

    #[test]
    fn test_short_narration_is_padded_to_captions() {
        let plan = ReelPlan::new(SCRIPT, &style())
            .unwrap()
            .with_narration("/tmp/a.mp3", 4.0);
        assert!((plan.final_duration() - 10.5).abs() < 1e-9);

        let args = plan.ffmpeg_args();
        assert!(graph(&args).contains("[vcat]null[vout]"));
        assert!(graph(&args).contains("apad=whole_dur=10.500"));
        let t = args.iter().rposition(|a| a == "-t").unwrap();
        assert_eq!(args[t + 1], "10.500");
    }

    #[test]
    fn test_cards_fade_and_concatenate_in_order() {
        let plan = ReelPlan::new(SCRIPT, &style()).unwrap();
        let args = plan.ffmpeg_args();
        let graph = graph(&args);

        assert_eq!(graph.matches("fade=t=in:st=0:d=0.500").count(), 3);
        assert_eq!(graph.matches("fade=t=out:st=3.000:d=0.500").count(), 3);
        assert!(graph.contains("[v0][v1][v2]concat=n=3:v=1:a=0[vcat]"));
        assert!(graph.find("[0:v]").unwrap() < graph.find("[1:v]").unwrap());
        assert!(args.contains(&"color=c=0x005AC8:s=1080x1920:r=30".to_string()));
    }

    #[test]
    fn test_silent_reel_uses_generated_track() {
        let plan = ReelPlan::new(SCRIPT, &style()).unwrap();
        let args = plan.ffmpeg_args();
        assert!(args.iter().any(|a| a.starts_with("anullsrc")));
        assert!(graph(&args).contains("[3:a]apad"));
    }

    #[test]
    fn test_encoding_settings() {
        let args = ReelPlan::new("Hello there", &style()).unwrap().ffmpeg_args();
        let joined = args.join(" ");
        assert!(joined.contains("-r 30"));
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-c:a aac"));
        assert!(joined.contains("-pix_fmt yuv420p"));
    }

    #[test]
    fn test_caption_text_is_escaped() {
        let plan = ReelPlan::new("Quiz: pick A, B or C", &style()).unwrap();
        let args = plan.ffmpeg_args();
        assert!(graph(&args).contains("text=Quiz\\\\: pick A\\, B or C"));
        assert!(graph(&args).contains("expansion=none"));
    }

    #[tokio::test]
    async fn test_assemble_probes_narration() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = Arc::new(FakeEncoder::with_probe(20.0));
        let channel = Arc::new(RecordingChannel::default());
        let assembler = VideoAssembler::new(
            encoder.clone(),
            style(),
            Notifier::new(channel.clone()),
        );
        let audio = dir.path().join("reel1_audio.mp3");
        std::fs::write(&audio, b"mp3").unwrap();
        let output = dir.path().join("reel1.mp4");

        let asset = assembler
            .assemble(SCRIPT, Some(&audio), &output)
            .await
            .unwrap();

        assert_eq!(asset.local_path, output);
        assert_eq!(asset.kind, MediaKind::Video);
        assert_eq!(asset.duration_hint, Some(20.0));
        assert!(output.exists());
        assert_eq!(encoder.encodes().len(), 1);
        assert!(channel.messages().is_empty());
    }

    #[tokio::test]
    async fn test_probe_failure_renders_silent() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = Arc::new(FakeEncoder::probe_failing());
        let assembler = VideoAssembler::new(
            encoder.clone(),
            style(),
            Notifier::new(Arc::new(RecordingChannel::default())),
        );

        let asset = assembler
            .assemble(SCRIPT, Some(Path::new("/missing.mp3")), &dir.path().join("r.mp4"))
            .await;

        assert!(asset.is_some());
        let encodes = encoder.encodes();
        assert!(encodes[0].0.iter().any(|a| a.starts_with("anullsrc")));
    }

    #[tokio::test]
    async fn test_encode_failure_notifies_and_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let channel = Arc::new(RecordingChannel::default());
        let assembler = VideoAssembler::new(
            Arc::new(FakeEncoder::failing()),
            style(),
            Notifier::new(channel.clone()),
        );

        let asset = assembler
            .assemble(SCRIPT, None, &dir.path().join("reel2.mp4"))
            .await;

        assert!(asset.is_none());
        assert!(channel.messages()[0].starts_with("Reel creation failed"));
    }
}

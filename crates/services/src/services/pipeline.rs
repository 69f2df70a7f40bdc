//! Daily Run Orchestration
//!
//! One run produces and posts the day's content in a fixed order:
//!
//! ```text
//! schedule -> texts (2 reels, post, 4 slides) -> narration -> reels -> cards
//!          -> reel 1 -> reel 2 -> static post -> carousel
//! ```
//!
//! Every post is uploaded, then published, and consecutive publish attempts
//! are spaced by the posting policy. Only a schedule failure ends the run early.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::services::content::{ContentGenerator, ContentKind, ContentPiece};
use crate::services::editron::{CardRenderer, MediaAsset, VideoAssembler};
use crate::services::notify::Notifier;
use crate::services::schedule::{Schedule, ScheduleError, Topic};
use crate::services::social::{PublishJob, Publisher, CAROUSEL_SIZE};
use crate::services::speech::SpeechSynthesizer;
use crate::services::storage::{AssetUploader, RemoteAsset};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),
}

/// Minimum spacing between consecutive publish attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingPolicy {
    pub min_interval: Duration,
}

impl Default for PostingPolicy {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(120),
        }
    }
}

/// Enforces a [`PostingPolicy`]: the first post goes out immediately, later
/// posts wait until the interval since the previous attempt has passed.
#[derive(Debug)]
pub struct Pacer {
    policy: PostingPolicy,
    last_attempt: Option<Instant>,
}

impl Pacer {
    pub fn new(policy: PostingPolicy) -> Self {
        Self {
            policy,
            last_attempt: None,
        }
    }

    /// Wait until the next publish attempt is allowed
    pub async fn ready(&self) {
        let Some(last) = self.last_attempt else {
            return;
        };

        let next = last + self.policy.min_interval;
        if next > Instant::now() {
            info!(
                "Cooling down {:?} before the next post",
                next - Instant::now()
            );
            tokio::time::sleep_until(next).await;
        }
    }

    /// Mark a publish attempt as made now
    pub fn record(&mut self) {
        self.last_attempt = Some(Instant::now());
    }
}

/// Result of one run, by post label
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub published: Vec<String>,
    /// Upload or publish failed
    pub failed: Vec<String>,
    /// Media was never ready to post
    pub skipped: Vec<String>,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} published, {} failed, {} skipped",
            self.published.len(),
            self.failed.len(),
            self.skipped.len()
        )
    }
}

/// The components a run drives
pub struct RunComponents {
    pub generator: ContentGenerator,
    pub speech: SpeechSynthesizer,
    pub assembler: VideoAssembler,
    pub cards: CardRenderer,
    pub uploader: AssetUploader,
    pub publisher: Publisher,
    pub notifier: Notifier,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub schedule_path: PathBuf,
    pub work_dir: PathBuf,
    /// Keep narration files after their reel is rendered
    pub keep_local_media: bool,
    pub posting: PostingPolicy,
}

/// The day's texts, one per content slot
struct DailyTexts {
    reels: Vec<ContentPiece>,
    post: ContentPiece,
    slides: Vec<ContentPiece>,
}

pub struct DailyRun {
    parts: RunComponents,
    options: RunOptions,
    pacer: Pacer,
}

impl DailyRun {
    pub fn new(parts: RunComponents, options: RunOptions) -> Self {
        let pacer = Pacer::new(options.posting);
        Self {
            parts,
            options,
            pacer,
        }
    }

    /// Produce and post today's content
    pub async fn run(&mut self, today: NaiveDate) -> Result<RunReport, PipelineError> {
        let notifier = self.parts.notifier.clone();
        notifier
            .notify("🚀 Daily run started, generating today's content...")
            .await;

        let topic = match load_topic(&self.options.schedule_path, today) {
            Ok(topic) => topic,
            Err(e) => {
                error!("Schedule error: {}", e);
                notifier.notify(&format!("Schedule error: {}", e)).await;
                return Err(e.into());
            }
        };

        info!("Today: theme = {}, topic = {}", topic.theme, topic.subtopic);
        notifier
            .notify(&format!(
                "Today: Theme = {}, Topic = {}",
                topic.theme, topic.subtopic
            ))
            .await;

        let texts = self.generate_texts(&topic).await;
        let reels = self.render_reels(&texts.reels).await;
        let post_card = self.render_post_card(&topic, &texts.post).await;
        let slide_cards = self.render_slide_cards(&topic, &texts.slides).await;

        let mut report = RunReport::default();

        for (i, (reel, script)) in reels.iter().zip(&texts.reels).enumerate() {
            let label = format!("reel{}", i + 1);
            match reel {
                Some(asset) => {
                    self.upload_and_publish(&label, asset, &mut report, |remote| {
                        PublishJob::video(remote, script.text.clone())
                    })
                    .await
                }
                None => report.skipped.push(label),
            }
        }

        match &post_card {
            Some(asset) => {
                self.upload_and_publish("post", asset, &mut report, |remote| {
                    PublishJob::image(remote, texts.post.text.clone())
                })
                .await
            }
            None => report.skipped.push("post".to_string()),
        }

        self.post_carousel(&topic, slide_cards, &mut report).await;

        info!("Daily run complete: {}", report);
        notifier
            .notify(&format!("✅ Daily run complete: {}.", report))
            .await;

        Ok(report)
    }

    async fn generate_texts(&self, topic: &Topic) -> DailyTexts {
        let generator = &self.parts.generator;
        let (theme, subtopic) = (topic.theme.as_str(), topic.subtopic.as_str());

        let mut reels = Vec::with_capacity(2);
        for ordinal in 1..=2 {
            reels.push(
                generator
                    .generate(ContentKind::Reel { ordinal }, theme, subtopic)
                    .await,
            );
        }

        let post = generator.generate(ContentKind::Post, theme, subtopic).await;

        let mut slides = Vec::with_capacity(CAROUSEL_SIZE);
        for index in 1..=CAROUSEL_SIZE as u8 {
            slides.push(
                generator
                    .generate(ContentKind::CarouselSlide { index }, theme, subtopic)
                    .await,
            );
        }

        DailyTexts {
            reels,
            post,
            slides,
        }
    }

    /// Narrate every script first, then render every reel
    async fn render_reels(&self, scripts: &[ContentPiece]) -> Vec<Option<MediaAsset>> {
        let mut narrations = Vec::with_capacity(scripts.len());
        for (i, script) in scripts.iter().enumerate() {
            let output = self.media_path(&format!("reel{}_audio.mp3", i + 1));
            narrations.push(self.parts.speech.synthesize(&script.text, &output).await);
        }

        let mut reels = Vec::with_capacity(scripts.len());
        for (i, (script, narration)) in scripts.iter().zip(narrations).enumerate() {
            let output = self.media_path(&format!("reel{}.mp4", i + 1));
            let reel = self
                .parts
                .assembler
                .assemble(&script.text, narration.as_deref(), &output)
                .await;

            if let Some(audio) = narration {
                if !self.options.keep_local_media {
                    remove_local(&audio).await;
                }
            }
            reels.push(reel);
        }

        reels
    }

    async fn render_post_card(&self, topic: &Topic, post: &ContentPiece) -> Option<MediaAsset> {
        let title = format!("{}: {}", topic.theme, topic.subtopic);
        self.parts
            .cards
            .render(&post.text, &self.media_path("post.png"), Some(&title))
            .await
    }

    async fn render_slide_cards(&self, topic: &Topic, slides: &[ContentPiece]) -> Vec<MediaAsset> {
        let mut cards = Vec::with_capacity(slides.len());
        for (i, slide) in slides.iter().enumerate() {
            let title = format!("{} - Slide {}", topic.theme, i + 1);
            let output = self.media_path(&format!("carousel{}.png", i + 1));
            if let Some(card) = self.parts.cards.render(&slide.text, &output, Some(&title)).await {
                cards.push(card);
            }
        }
        cards
    }

    async fn post_carousel(&mut self, topic: &Topic, cards: Vec<MediaAsset>, report: &mut RunReport) {
        const LABEL: &str = "carousel";

        if cards.len() < CAROUSEL_SIZE {
            info!(
                "Only {} of {} carousel slides rendered, skipping carousel",
                cards.len(),
                CAROUSEL_SIZE
            );
            report.skipped.push(LABEL.to_string());
            return;
        }

        let mut remotes = Vec::with_capacity(CAROUSEL_SIZE);
        for card in &cards {
            match self.parts.uploader.upload(card).await {
                Some(remote) => remotes.push(remote),
                None => {
                    warn!("Carousel slide upload failed, skipping carousel");
                    report.failed.push(LABEL.to_string());
                    return;
                }
            }
        }

        match PublishJob::carousel(remotes, carousel_caption(topic)) {
            Ok(job) => self.publish(LABEL, job, report).await,
            Err(e) => {
                error!("Carousel job rejected: {}", e);
                report.failed.push(LABEL.to_string());
            }
        }
    }

    async fn upload_and_publish<F>(
        &mut self,
        label: &str,
        asset: &MediaAsset,
        report: &mut RunReport,
        build_job: F,
    ) where
        F: FnOnce(RemoteAsset) -> PublishJob,
    {
        match self.parts.uploader.upload(asset).await {
            Some(remote) => self.publish(label, build_job(remote), report).await,
            None => report.failed.push(label.to_string()),
        }
    }

    async fn publish(&mut self, label: &str, job: PublishJob, report: &mut RunReport) {
        self.pacer.ready().await;
        let outcome = self.parts.publisher.publish(job).await;
        self.pacer.record();

        if outcome.is_published() {
            report.published.push(label.to_string());
        } else {
            report.failed.push(label.to_string());
        }
    }

    fn media_path(&self, name: &str) -> PathBuf {
        self.options.work_dir.join(name)
    }
}

fn load_topic(path: &Path, today: NaiveDate) -> Result<Topic, ScheduleError> {
    let schedule = Schedule::load(path)?;
    let mut rng = rand::thread_rng();
    Ok(schedule.resolve(today, &mut rng))
}

pub fn carousel_caption(topic: &Topic) -> String {
    format!(
        "Today's {} carousel on {}! Save this and comment your score 👇 #EnglishLearning #EnglishTips",
        topic.theme, topic.subtopic
    )
}

async fn remove_local(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!("Could not remove {}: {}", path.display(), e);
    }
}

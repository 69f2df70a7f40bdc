//! Content Generation
//!
//! Produces one on-brand text per content slot from an LLM backend. Backend
//! errors and degenerate output never escape this module: they are replaced by
//! a templated fallback that still names the sub-topic and carries hashtags.

pub mod huggingface;

pub use huggingface::HuggingFaceBackend;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::services::config::GenerationSettings;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Response parse error: {0}")]
    Parse(String),
    #[error("Generated text too short ({len} < {min} characters)")]
    TooShort { len: usize, min: usize },
}

/// The content slot a piece of text is written for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Narrated reel script; `ordinal` starts at 1
    Reel { ordinal: u8 },
    /// Caption for the static image post
    Post,
    /// Text for one carousel slide; `index` starts at 1
    CarouselSlide { index: u8 },
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Reel { ordinal: 1 } => write!(f, "20-second Reel script"),
            ContentKind::Reel { .. } => write!(f, "another 20-second Reel script"),
            ContentKind::Post => write!(f, "Static post caption with poll-style CTA"),
            ContentKind::CarouselSlide { index } => write!(f, "Carousel slide {}", index),
        }
    }
}

/// Where the text of a [`ContentPiece`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSource {
    Generated,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct ContentPiece {
    pub kind: ContentKind,
    pub theme: String,
    pub subtopic: String,
    pub text: String,
    pub source: ContentSource,
}

/// Sampling parameters sent with every generation request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub repetition_penalty: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 220,
            temperature: 0.9,
            top_p: 0.95,
            repetition_penalty: 1.05,
        }
    }
}

impl From<&GenerationSettings> for GenerationParams {
    fn from(settings: &GenerationSettings) -> Self {
        Self {
            max_new_tokens: settings.max_new_tokens,
            temperature: settings.temperature,
            top_p: settings.top_p,
            repetition_penalty: settings.repetition_penalty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub params: GenerationParams,
}

/// Text-generation engine
#[async_trait]
pub trait TextBackend: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

pub struct ContentGenerator {
    backend: Arc<dyn TextBackend>,
    params: GenerationParams,
    min_chars: usize,
}

impl ContentGenerator {
    pub fn new(backend: Arc<dyn TextBackend>, params: GenerationParams, min_chars: usize) -> Self {
        Self {
            backend,
            params,
            min_chars,
        }
    }

    /// Generate text for `kind`; never fails
    pub async fn generate(&self, kind: ContentKind, theme: &str, subtopic: &str) -> ContentPiece {
        let request = GenerationRequest {
            prompt: build_prompt(kind, theme, subtopic),
            params: self.params,
        };

        let outcome = match self.backend.generate(&request).await {
            Ok(text) => self.validate(text),
            Err(e) => Err(e),
        };

        let (text, source) = match outcome {
            Ok(text) => {
                info!("Generated {} ({} chars)", kind, text.chars().count());
                (text, ContentSource::Generated)
            }
            Err(e) => {
                warn!("Generation failed for {}, using fallback: {}", kind, e);
                (fallback_text(kind, subtopic), ContentSource::Fallback)
            }
        };

        ContentPiece {
            kind,
            theme: theme.to_string(),
            subtopic: subtopic.to_string(),
            text,
            source,
        }
    }

    fn validate(&self, text: String) -> Result<String, GenerationError> {
        let text = text.trim();
        let len = text.chars().count();
        if len < self.min_chars {
            return Err(GenerationError::TooShort {
                len,
                min: self.min_chars,
            });
        }
        Ok(text.to_string())
    }
}

/// Prompt asking for one finished piece of English-learning content
pub fn build_prompt(kind: ContentKind, theme: &str, subtopic: &str) -> String {
    format!(
        r#"
You write viral Instagram content for an account that teaches English.

Format: {kind}
Theme: {theme}
Sub-topic: {subtopic}

Rules:
- Open with a scroll-stopping HOOK on the first line.
- Teach exactly ONE point (a definition, an example, or a common mistake).
- Include one quiz or challenge (e.g. "Choose A/B/C" or "Fill in the blank").
- Finish with a clear call to action such as "Comment your score" or "Tag a friend".
- Use 3 to 8 natural emojis in total.
- End with 3 to 5 relevant English-learning hashtags.
Reply with the final text only: no explanations, no markdown, no quotes, no labels.
"#
    )
}

/// Deterministic text used whenever generation fails
pub fn fallback_text(kind: ContentKind, subtopic: &str) -> String {
    format!(
        "{} about {}: What does it mean to you? Comment your own example! 😎 #EnglishLearning #EnglishReels",
        kind, subtopic
    )
}

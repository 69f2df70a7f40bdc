//! Reel idea digest
//!
//! Generates one complete reel concept and sends it to the operator channel.
//! Unlike the daily run there is no templated fallback: a digest is only
//! delivered when the backend produced one.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

use crate::services::content::{GenerationError, GenerationParams, GenerationRequest, TextBackend};
use crate::services::notify::{Notifier, NotifyError};

const IDEA_HEADER: &str = "🔥 New Instagram Reel idea";
const IDEA_FOOTER: &str = "If this was useful, save this chat.";

/// Token budget for a full concept (hook, script, caption, hashtags).
pub const IDEA_MAX_NEW_TOKENS: u32 = 700;

const IDEA_PROMPT: &str = r#"
You create viral Instagram Reels for people learning English.

Write ONE complete reel concept in plain text with these sections:

[HOOK - max 8 words]
A catchy first line that stops the scroll.

[ON-SCREEN SCRIPT - max 90 seconds]
What the creator says on camera. Short, punchy sentences in simple English,
one idea per line.

[CAPTION]
A short caption for the post.

[HASHTAGS]
10 to 15 relevant hashtags on one line.

Audience: learners improving their English or preparing for exams.
Tone: motivating, clear, a little funny.
"#;

#[derive(Debug, Error)]
pub enum IdeaError {
    #[error("Reel idea generation failed: {0}")]
    Generation(#[from] GenerationError),
    #[error("Reel idea delivery failed: {0}")]
    Delivery(#[from] NotifyError),
}

pub struct IdeaDigest {
    backend: Arc<dyn TextBackend>,
    params: GenerationParams,
    notifier: Notifier,
}

impl IdeaDigest {
    pub fn new(backend: Arc<dyn TextBackend>, params: GenerationParams, notifier: Notifier) -> Self {
        Self {
            backend,
            params: GenerationParams {
                max_new_tokens: IDEA_MAX_NEW_TOKENS,
                ..params
            },
            notifier,
        }
    }

    /// Generate a concept and deliver it; generation and delivery errors are returned
    pub async fn deliver(&self) -> Result<(), IdeaError> {
        let idea = match self.generate().await {
            Ok(idea) => idea,
            Err(e) => {
                error!("Reel idea generation failed: {}", e);
                self.notifier
                    .notify(&format!("Reel idea generation failed: {}", e))
                    .await;
                return Err(e.into());
            }
        };

        if let Err(e) = self.notifier.send_long(&frame_digest(&idea)).await {
            error!("Reel idea delivery failed: {}", e);
            return Err(e.into());
        }
        info!("Reel idea delivered ({} chars)", idea.chars().count());
        Ok(())
    }

    async fn generate(&self) -> Result<String, GenerationError> {
        let request = GenerationRequest {
            prompt: IDEA_PROMPT.to_string(),
            params: self.params,
        };

        let text = self.backend.generate(&request).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(GenerationError::TooShort { len: 0, min: 1 });
        }
        Ok(text.to_string())
    }
}

pub fn frame_digest(idea: &str) -> String {
    format!("{}\n\n{}\n\n---\n{}", IDEA_HEADER, idea, IDEA_FOOTER)
}

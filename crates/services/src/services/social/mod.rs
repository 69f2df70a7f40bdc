//! Social Media Publishing
//!
//! Two-phase publishing against the platform's media-container API:
//! - Create: register the media (or carousel children, then the parent) and
//!   receive a creation handle
//! - Publish: hand the creation handle back to make the post live
//!
//! A carousel is all-or-nothing: the parent is only created once every child
//! container exists.

pub mod connectors;
pub mod publisher;

pub use connectors::instagram::InstagramConnector;
pub use publisher::{PublishOutcome, PublishStage, Publisher};

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::services::storage::RemoteAsset;

/// Number of slides in every carousel post.
pub const CAROUSEL_SIZE: usize = 4;

#[derive(Debug, Error)]
pub enum SocialError {
    #[error("Content validation failed: {0}")]
    ValidationError(String),
    #[error("Platform API error ({status}): {body}")]
    PlatformError { status: u16, body: String },
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("No id in create response: {0}")]
    MissingIdentifier(String),
}

impl From<reqwest::Error> for SocialError {
    fn from(err: reqwest::Error) -> Self {
        SocialError::NetworkError(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostType {
    Video,
    Image,
    Carousel,
}

impl fmt::Display for PostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostType::Video => write!(f, "Reel"),
            PostType::Image => write!(f, "image"),
            PostType::Carousel => write!(f, "carousel"),
        }
    }
}

/// One post waiting to be published
#[derive(Debug, Clone, PartialEq)]
pub struct PublishJob {
    post_type: PostType,
    assets: Vec<RemoteAsset>,
    caption: String,
}

impl PublishJob {
    pub fn video(asset: RemoteAsset, caption: impl Into<String>) -> Self {
        Self {
            post_type: PostType::Video,
            assets: vec![asset],
            caption: caption.into(),
        }
    }

    pub fn image(asset: RemoteAsset, caption: impl Into<String>) -> Self {
        Self {
            post_type: PostType::Image,
            assets: vec![asset],
            caption: caption.into(),
        }
    }

    /// A carousel needs exactly [`CAROUSEL_SIZE`] slides, in display order
    pub fn carousel(
        assets: Vec<RemoteAsset>,
        caption: impl Into<String>,
    ) -> Result<Self, SocialError> {
        if assets.len() != CAROUSEL_SIZE {
            return Err(SocialError::ValidationError(format!(
                "carousel needs {} slides, got {}",
                CAROUSEL_SIZE,
                assets.len()
            )));
        }

        Ok(Self {
            post_type: PostType::Carousel,
            assets,
            caption: caption.into(),
        })
    }

    pub fn post_type(&self) -> PostType {
        self.post_type
    }

    pub fn assets(&self) -> &[RemoteAsset] {
        &self.assets
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }
}

/// Platform token linking a create call to its publish call; consumed by publishing
#[derive(Debug, PartialEq, Eq)]
pub struct CreationHandle(String);

impl CreationHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Body of a create-container call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerPayload {
    Video { video_url: String, caption: String },
    Image { image_url: String, caption: String },
    CarouselChild { image_url: String },
    CarouselParent { children: Vec<String>, caption: String },
}

impl ContainerPayload {
    /// Form fields sent to the media endpoint (credentials excluded)
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            ContainerPayload::Video { video_url, caption } => vec![
                ("media_type", "REELS".to_string()),
                ("video_url", video_url.clone()),
                ("caption", caption.clone()),
            ],
            ContainerPayload::Image { image_url, caption } => vec![
                ("image_url", image_url.clone()),
                ("caption", caption.clone()),
            ],
            ContainerPayload::CarouselChild { image_url } => vec![
                ("image_url", image_url.clone()),
                ("is_carousel_item", "true".to_string()),
            ],
            ContainerPayload::CarouselParent { children, caption } => vec![
                ("media_type", "CAROUSEL".to_string()),
                ("children", children.join(",")),
                ("caption", caption.clone()),
            ],
        }
    }
}

/// Media-container endpoints of the platform
#[async_trait]
pub trait GraphApi: Send + Sync {
    /// Create a media container; returns the decoded response body
    async fn create_container(&self, payload: &ContainerPayload) -> Result<Value, SocialError>;

    /// Publish a created container
    async fn publish_container(&self, creation_id: &str) -> Result<Value, SocialError>;
}

//! Social Media Publisher Service
//!
//! Drives create-then-publish for each job. Failures never escape: they are
//! reported to the operator and returned as a failed outcome.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info};

use super::{ContainerPayload, CreationHandle, GraphApi, PostType, PublishJob, SocialError};
use crate::services::notify::Notifier;

/// Step of the publishing protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStage {
    /// Carousel child container; `index` starts at 1
    CreateChild { index: usize },
    Create,
    Publish,
}

impl fmt::Display for PublishStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishStage::CreateChild { index } => write!(f, "create carousel child {}", index),
            PublishStage::Create => write!(f, "create"),
            PublishStage::Publish => write!(f, "publish"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published { media_id: Option<String> },
    Failed { stage: PublishStage, reason: String },
}

impl PublishOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, PublishOutcome::Published { .. })
    }
}

/// Read the `id` field of a platform response; numeric ids are accepted
pub fn extract_identifier(response: &Value) -> Option<String> {
    match &response["id"] {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Social Media Publisher
pub struct Publisher {
    api: Arc<dyn GraphApi>,
    notifier: Notifier,
}

impl Publisher {
    pub fn new(api: Arc<dyn GraphApi>, notifier: Notifier) -> Self {
        Self { api, notifier }
    }

    /// Publish one job; the job is consumed whatever the outcome
    pub async fn publish(&self, job: PublishJob) -> PublishOutcome {
        let post_type = job.post_type();

        match self.try_publish(&job).await {
            Ok(media_id) => {
                info!("Published {} ({})", post_type, media_id.as_deref().unwrap_or("no id"));
                PublishOutcome::Published { media_id }
            }
            Err((stage, e)) => {
                error!("Posting {} failed at {}: {}", post_type, stage, e);
                self.notifier
                    .notify(&format!("Posting {} error at {}: {}", post_type, stage, e))
                    .await;
                PublishOutcome::Failed {
                    stage,
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn try_publish(
        &self,
        job: &PublishJob,
    ) -> Result<Option<String>, (PublishStage, SocialError)> {
        let handle = match job.post_type() {
            PostType::Video => {
                let payload = ContainerPayload::Video {
                    video_url: job.assets()[0].secure_url.clone(),
                    caption: job.caption().to_string(),
                };
                self.create(&payload)
                    .await
                    .map_err(|e| (PublishStage::Create, e))?
            }
            PostType::Image => {
                let payload = ContainerPayload::Image {
                    image_url: job.assets()[0].secure_url.clone(),
                    caption: job.caption().to_string(),
                };
                self.create(&payload)
                    .await
                    .map_err(|e| (PublishStage::Create, e))?
            }
            PostType::Carousel => self.create_carousel(job).await?,
        };

        let response = self
            .api
            .publish_container(handle.as_str())
            .await
            .map_err(|e| (PublishStage::Publish, e))?;

        Ok(extract_identifier(&response))
    }

    /// Create every child, then the parent; any child failure stops the job
    async fn create_carousel(
        &self,
        job: &PublishJob,
    ) -> Result<CreationHandle, (PublishStage, SocialError)> {
        let mut children = Vec::with_capacity(job.assets().len());

        for (i, asset) in job.assets().iter().enumerate() {
            let payload = ContainerPayload::CarouselChild {
                image_url: asset.secure_url.clone(),
            };
            let child = self
                .create(&payload)
                .await
                .map_err(|e| (PublishStage::CreateChild { index: i + 1 }, e))?;
            children.push(child.into_inner());
        }

        let parent = ContainerPayload::CarouselParent {
            children,
            caption: job.caption().to_string(),
        };

        self.create(&parent)
            .await
            .map_err(|e| (PublishStage::Create, e))
    }

    async fn create(&self, payload: &ContainerPayload) -> Result<CreationHandle, SocialError> {
        let response = self.api.create_container(payload).await?;
        extract_identifier(&response)
            .map(CreationHandle::new)
            .ok_or_else(|| SocialError::MissingIdentifier(response.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::RemoteAsset;
    use crate::services::testing::{FakeGraph, RecordingChannel};
    use serde_json::json;

    fn remote(name: &str) -> RemoteAsset {
        RemoteAsset {
            secure_url: format!("https://cdn.example.com/{}", name),
        }
    }

    fn carousel_job() -> PublishJob {
        let slides = (1..=4).map(|i| remote(&format!("carousel{}.png", i))).collect();
        PublishJob::carousel(slides, "Save this!").unwrap()
    }

    fn publisher(graph: Arc<FakeGraph>) -> (Publisher, Arc<RecordingChannel>) {
        let channel = Arc::new(RecordingChannel::default());
        (Publisher::new(graph, Notifier::new(channel.clone())), channel)
    }

    #[test]
    fn test_extract_identifier() {
        assert_eq!(extract_identifier(&json!({"id": "1789"})), Some("1789".to_string()));
        assert_eq!(extract_identifier(&json!({"id": 1789})), Some("1789".to_string()));
        assert_eq!(extract_identifier(&json!({"id": ""})), None);
        assert_eq!(extract_identifier(&json!({"error": {"message": "bad url"}})), None);
        assert_eq!(extract_identifier(&Value::Null), None);
    }

    #[tokio::test]
    async fn test_video_creates_then_publishes() {
        let graph = Arc::new(FakeGraph::default());
        let (publisher, channel) = publisher(graph.clone());

        let outcome = publisher
            .publish(PublishJob::video(remote("reel1.mp4"), "Reel caption"))
            .await;

        assert!(outcome.is_published());
        assert_eq!(
            graph.creates(),
            vec![ContainerPayload::Video {
                video_url: "https://cdn.example.com/reel1.mp4".to_string(),
                caption: "Reel caption".to_string(),
            }]
        );
        assert_eq!(graph.publishes(), vec!["container-1".to_string()]);
        assert!(channel.messages().is_empty());
    }

    #[tokio::test]
    async fn test_missing_identifier_never_publishes() {
        let graph = Arc::new(FakeGraph::failing_create_at(1));
        let (publisher, channel) = publisher(graph.clone());

        let outcome = publisher
            .publish(PublishJob::image(remote("post.png"), "Vote!"))
            .await;

        assert!(matches!(
            outcome,
            PublishOutcome::Failed { stage: PublishStage::Create, .. }
        ));
        assert!(graph.publishes().is_empty());
        let message = &channel.messages()[0];
        assert!(message.starts_with("Posting image error"));
        assert!(message.contains("Invalid image url"));
    }

    #[tokio::test]
    async fn test_carousel_builds_parent_from_children_in_order() {
        let graph = Arc::new(FakeGraph::default());
        let (publisher, _) = publisher(graph.clone());

        let outcome = publisher.publish(carousel_job()).await;

        assert!(outcome.is_published());
        let creates = graph.creates();
        assert_eq!(creates.len(), 5);
        assert_eq!(
            creates[4],
            ContainerPayload::CarouselParent {
                children: vec![
                    "container-1".to_string(),
                    "container-2".to_string(),
                    "container-3".to_string(),
                    "container-4".to_string(),
                ],
                caption: "Save this!".to_string(),
            }
        );
        assert_eq!(graph.publishes(), vec!["container-5".to_string()]);
    }

    #[tokio::test]
    async fn test_carousel_child_failure_aborts_job() {
        let graph = Arc::new(FakeGraph::failing_create_at(3));
        let (publisher, channel) = publisher(graph.clone());

        let outcome = publisher.publish(carousel_job()).await;

        assert!(matches!(
            outcome,
            PublishOutcome::Failed {
                stage: PublishStage::CreateChild { index: 3 },
                ..
            }
        ));
        // Three child attempts, no fourth child, no parent.
        let creates = graph.creates();
        assert_eq!(creates.len(), 3);
        assert!(creates
            .iter()
            .all(|p| matches!(p, ContainerPayload::CarouselChild { .. })));
        assert!(graph.publishes().is_empty());
        assert!(channel.messages()[0].contains("create carousel child 3"));
    }

    #[tokio::test]
    async fn test_last_child_failure_also_aborts() {
        let graph = Arc::new(FakeGraph::failing_create_at(4));
        let (publisher, _) = publisher(graph.clone());

        let outcome = publisher.publish(carousel_job()).await;

        assert!(!outcome.is_published());
        assert_eq!(graph.creates().len(), 4);
        assert!(graph.publishes().is_empty());
    }

    #[tokio::test]
    async fn test_publish_rejection_is_failure() {
        let graph = Arc::new(FakeGraph::rejecting_publish());
        let (publisher, channel) = publisher(graph.clone());

        let outcome = publisher
            .publish(PublishJob::video(remote("reel2.mp4"), "caption"))
            .await;

        assert!(matches!(
            outcome,
            PublishOutcome::Failed { stage: PublishStage::Publish, .. }
        ));
        assert_eq!(graph.publishes().len(), 1);
        assert!(channel.messages()[0].starts_with("Posting Reel error at publish"));
    }
}

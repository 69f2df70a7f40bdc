//! Asset Storage
//!
//! Uploads rendered media to public storage so the platform can fetch it.
//! An upload only counts when the store hands back a durable `secure_url`.

pub mod cloudinary;

pub use cloudinary::CloudinaryStore;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::services::editron::MediaAsset;
use crate::services::notify::Notifier;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Storage API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("No secure_url in storage response: {0}")]
    MissingSecureUrl(String),
}

/// A publicly resolvable copy of a local asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAsset {
    pub secure_url: String,
}

/// Remote media store; returns the raw upload response
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn upload(&self, path: &Path) -> Result<Value, StorageError>;
}

/// Pull the `secure_url` out of an upload response
pub fn extract_secure_url(response: &Value) -> Result<RemoteAsset, StorageError> {
    response["secure_url"]
        .as_str()
        .filter(|url| !url.is_empty())
        .map(|url| RemoteAsset {
            secure_url: url.to_string(),
        })
        .ok_or_else(|| StorageError::MissingSecureUrl(response.to_string()))
}

pub struct AssetUploader {
    store: Arc<dyn AssetStore>,
    notifier: Notifier,
    keep_local: bool,
}

impl AssetUploader {
    pub fn new(store: Arc<dyn AssetStore>, notifier: Notifier, keep_local: bool) -> Self {
        Self {
            store,
            notifier,
            keep_local,
        }
    }

    /// Upload `asset`, or `None` if the store failed or returned no URL.
    ///
    /// The local file is removed after a successful upload unless local media is kept.
    pub async fn upload(&self, asset: &MediaAsset) -> Option<RemoteAsset> {
        let path = &asset.local_path;

        let result = match self.store.upload(path).await {
            Ok(response) => extract_secure_url(&response),
            Err(e) => Err(e),
        };

        match result {
            Ok(remote) => {
                info!("Uploaded {} to {}", path.display(), remote.secure_url);
                if !self.keep_local {
                    self.remove_local(path).await;
                }
                Some(remote)
            }
            Err(e) => {
                error!("Upload error for {}: {}", path.display(), e);
                self.notifier
                    .notify(&format!("Upload failed for {}: {}", path.display(), e))
                    .await;
                None
            }
        }
    }

    async fn remove_local(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!("Removed local media {}", path.display()),
            Err(e) => warn!("Could not remove {}: {}", path.display(), e),
        }
    }
}

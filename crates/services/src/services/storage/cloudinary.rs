//! Cloudinary signed uploads

use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use sha1::{Digest, Sha1};
use tracing::debug;

use super::{AssetStore, StorageError};

const CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com/v1_1";

pub struct CloudinaryStore {
    client: Client,
    cloud_name: String,
    api_key: String,
    api_secret: SecretString,
}

impl CloudinaryStore {
    pub fn new(
        client: Client,
        cloud_name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: SecretString,
    ) -> Self {
        Self {
            client,
            cloud_name: cloud_name.into(),
            api_key: api_key.into(),
            api_secret,
        }
    }

    /// `auto` lets the service detect image vs video
    fn upload_url(&self) -> String {
        format!("{}/{}/auto/upload", CLOUDINARY_API_BASE, self.cloud_name)
    }
}

/// Request signature: SHA-1 over the parameters sorted by name, joined as
/// `k=v&k=v`, followed by the API secret.
pub fn sign_params(params: &[(&str, &str)], secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl AssetStore for CloudinaryStore {
    async fn upload(&self, path: &Path) -> Result<Value, StorageError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[("timestamp", timestamp.as_str())],
            self.api_secret.expose_secret(),
        );

        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name))
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature);

        debug!("Uploading {} to {}", path.display(), self.cloud_name);

        let response = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(StorageError::Api {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|_| StorageError::MissingSecureUrl(body))
    }
}

//! Instagram Platform Connector
//!
//! Implements the Instagram Graph API content-publishing endpoints for a
//! business account. Every call carries the long-lived access token as a form field.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::debug;

use crate::services::social::{ContainerPayload, GraphApi, SocialError};

pub struct InstagramConnector {
    client: Client,
    graph_api_base: String,
    business_id: String,
    access_token: SecretString,
}

impl InstagramConnector {
    pub fn new(
        client: Client,
        graph_api_base: impl Into<String>,
        business_id: impl Into<String>,
        access_token: SecretString,
    ) -> Self {
        Self {
            client,
            graph_api_base: graph_api_base.into(),
            business_id: business_id.into(),
            access_token,
        }
    }

    fn endpoint(&self, edge: &str) -> String {
        format!(
            "{}/{}/{}",
            self.graph_api_base.trim_end_matches('/'),
            self.business_id,
            edge
        )
    }

    async fn post_form(&self, url: String, fields: Vec<(&str, String)>) -> Result<Value, SocialError> {
        let mut params = fields;
        params.push(("access_token", self.access_token.expose_secret().to_string()));

        let response = self.client.post(&url).form(&params).send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(SocialError::PlatformError {
                status: status.as_u16(),
                body,
            });
        }

        // A 2xx status is success; the body is only read for an id.
        Ok(serde_json::from_str(&body).unwrap_or(Value::Null))
    }
}

#[async_trait]
impl GraphApi for InstagramConnector {
    async fn create_container(&self, payload: &ContainerPayload) -> Result<Value, SocialError> {
        debug!("Creating media container: {:?}", payload);
        self.post_form(self.endpoint("media"), payload.form_fields())
            .await
    }

    async fn publish_container(&self, creation_id: &str) -> Result<Value, SocialError> {
        debug!("Publishing container {}", creation_id);
        self.post_form(
            self.endpoint("media_publish"),
            vec![("creation_id", creation_id.to_string())],
        )
        .await
    }
}

//! Telegram Bot API channel

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

use super::{NotifyChannel, NotifyError};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

pub struct TelegramChannel {
    client: Client,
    bot_token: SecretString,
    chat_id: String,
}

impl TelegramChannel {
    pub fn new(client: Client, bot_token: SecretString, chat_id: impl Into<String>) -> Self {
        Self {
            client,
            bot_token,
            chat_id: chat_id.into(),
        }
    }
}

#[async_trait]
impl NotifyChannel for TelegramChannel {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        let url = format!(
            "{}/bot{}/sendMessage",
            TELEGRAM_API_BASE,
            self.bot_token.expose_secret()
        );

        let response = self
            .client
            .get(&url)
            .query(&[("chat_id", self.chat_id.as_str()), ("text", text)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected { status, body });
        }

        Ok(())
    }
}

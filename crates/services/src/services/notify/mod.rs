//! Operator Notifications
//!
//! Best-effort status reporting to the operator channel. Delivery failures are
//! logged locally and swallowed; no pipeline step ever fails because of them.
//! Digests sent with [`Notifier::send_long`] are the exception and return errors.

pub mod telegram;

pub use telegram::TelegramChannel;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

/// Hard cap applied to every delivered message.
pub const MESSAGE_LIMIT: usize = 4000;

/// Piece size used when a long digest is split across several messages.
pub const DIGEST_PIECE_LIMIT: usize = 3900;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Channel rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Transport that delivers a single text message
#[async_trait]
pub trait NotifyChannel: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), NotifyError>;
}

/// Fire-and-forget wrapper around a [`NotifyChannel`]
#[derive(Clone)]
pub struct Notifier {
    channel: Arc<dyn NotifyChannel>,
}

impl Notifier {
    pub fn new(channel: Arc<dyn NotifyChannel>) -> Self {
        Self { channel }
    }

    /// Send a message, truncated to [`MESSAGE_LIMIT`] characters
    pub async fn notify(&self, message: &str) {
        let text = truncate_chars(message, MESSAGE_LIMIT);
        debug!("Notifying operator: {}", text);

        if let Err(e) = self.channel.send(text).await {
            warn!("Notification delivery failed: {}", e);
        }
    }

    /// Deliver a long message as consecutive pieces of at most [`DIGEST_PIECE_LIMIT`]
    /// characters, stopping at the first failed piece
    pub async fn send_long(&self, message: &str) -> Result<(), NotifyError> {
        for piece in split_pieces(message, DIGEST_PIECE_LIMIT) {
            self.channel.send(&piece).await?;
        }
        Ok(())
    }
}

/// Cut `text` to at most `max` characters without splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Split `message` into pieces of at most `limit` characters, preferring line boundaries.
pub fn split_pieces(message: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in message.lines() {
        let mut rest = line;
        loop {
            let rest_len = rest.chars().count();
            let separator = usize::from(!current.is_empty());

            if current_len + separator + rest_len <= limit {
                if separator == 1 {
                    current.push('\n');
                }
                current.push_str(rest);
                current_len += separator + rest_len;
                break;
            }

            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
                current_len = 0;
                continue;
            }

            // A single line longer than the limit gets hard-split.
            let head = truncate_chars(rest, limit);
            pieces.push(head.to_string());
            rest = &rest[head.len()..];
            if rest.is_empty() {
                break;
            }
        }
    }

    if !current.is_empty() {
        pieces.push(current);
    }

    pieces
}

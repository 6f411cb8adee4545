use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;

use crate::errors::Result;

pub mod outbox;
pub mod telegram;

/// Conversation an answer is delivered to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct ChatId(pub String);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Front end that carries replies back to the requester
#[async_trait]
pub trait Delivery {
    async fn send_text(&self, chat: &ChatId, text: &str) -> Result<()>;

    /// `file_name` is the name the recipient sees, not a local path.
    async fn send_photo(&self, chat: &ChatId, file_name: &str, bytes: Vec<u8>) -> Result<()>;

    async fn send_document(&self, chat: &ChatId, file_name: &str, bytes: Vec<u8>) -> Result<()>;
}

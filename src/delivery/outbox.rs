use async_trait::async_trait;
use log::info;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::delivery::{ChatId, Delivery};
use crate::errors::Result;

/// Delivers into a local directory, one numbered file per message.
pub struct OutboxDelivery {
    dir: PathBuf,
    sequence: AtomicUsize,
}

impl OutboxDelivery {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            sequence: AtomicUsize::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn store(&self, chat: &ChatId, name: &str, bytes: &[u8]) -> Result<()> {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let path = self.dir.join(format!("{:03}_{}_{}", seq, chat, name));
        tokio::fs::write(&path, bytes).await?;
        info!("Delivered {} to {}", name, path.display());
        Ok(())
    }
}

#[async_trait]
impl Delivery for OutboxDelivery {
    async fn send_text(&self, chat: &ChatId, text: &str) -> Result<()> {
        self.store(chat, "message.txt", text.as_bytes()).await
    }

    async fn send_photo(&self, chat: &ChatId, file_name: &str, bytes: Vec<u8>) -> Result<()> {
        self.store(chat, file_name, &bytes).await
    }

    async fn send_document(&self, chat: &ChatId, file_name: &str, bytes: Vec<u8>) -> Result<()> {
        self.store(chat, file_name, &bytes).await
    }
}

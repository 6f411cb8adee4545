use async_trait::async_trait;
use log::debug;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::delivery::{ChatId, Delivery};
use crate::errors::{Result, SnapshotError};

const API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

/// Telegram Bot API delivery
pub struct TelegramDelivery {
    client: Client,
    token: String,
}

impl TelegramDelivery {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(SnapshotError::RequestError)?;

        Ok(Self {
            client,
            token: token.into(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", API_URL, self.token, method)
    }

    async fn check(method: &str, response: reqwest::Response) -> Result<()> {
        let status = response.status();
        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| SnapshotError::DeliveryError(format!("{}: unreadable response ({}): {}", method, status, e)))?;
        if !status.is_success() || !body.ok {
            return Err(SnapshotError::DeliveryError(format!(
                "{}: {} {}",
                method,
                status,
                body.description.unwrap_or_default()
            )));
        }
        debug!("Telegram {} succeeded", method);
        Ok(())
    }

    async fn send_file(&self, method: &str, field: &str, chat: &ChatId, file_name: &str, bytes: Vec<u8>) -> Result<()> {
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new().text("chat_id", chat.0.clone()).part(field.to_string(), part);

        let response = self
            .client
            .post(self.method_url(method))
            .multipart(form)
            .send()
            .await
            .map_err(|e| SnapshotError::DeliveryError(format!("{}: {}", method, e)))?;

        Self::check(method, response).await
    }
}

#[async_trait]
impl Delivery for TelegramDelivery {
    async fn send_text(&self, chat: &ChatId, text: &str) -> Result<()> {
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&json!({ "chat_id": chat.0, "text": text, "parse_mode": "Markdown" }))
            .send()
            .await
            .map_err(|e| SnapshotError::DeliveryError(format!("sendMessage: {}", e)))?;

        Self::check("sendMessage", response).await
    }

    async fn send_photo(&self, chat: &ChatId, file_name: &str, bytes: Vec<u8>) -> Result<()> {
        self.send_file("sendPhoto", "photo", chat, file_name, bytes).await
    }

    async fn send_document(&self, chat: &ChatId, file_name: &str, bytes: Vec<u8>) -> Result<()> {
        self.send_file("sendDocument", "document", chat, file_name, bytes).await
    }
}

//! Slack-style incoming webhook delivery.
//!
//! One POST per message with a JSON body `{"text": ...}`. Transport errors
//! and non-2xx answers are logged and dropped.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::json;

use crate::error::{Result, SeatloopError};
use crate::notify::Notifier;

/// Why a webhook delivery did not go through
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("webhook answered HTTP {0}")]
    Status(u16),
}

/// Posts messages to a webhook URL
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: Url,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| SeatloopError::Config(format!("invalid webhook URL: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SeatloopError::Config(format!(
                "webhook URL must be http(s), got {}",
                url.scheme()
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SeatloopError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, url })
    }

    /// Single delivery attempt, reporting failures to the caller
    pub async fn deliver(&self, message: &str) -> std::result::Result<(), NotifyError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&json!({ "text": message }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, message: &str) {
        match self.deliver(message).await {
            Ok(()) => log::debug!("Webhook message delivered"),
            Err(e) => {
                log::warn!("Failed to send webhook message: {}", e);
                eprintln!("Error while sending webhook message: {}", e);
            }
        }
    }
}

use std::time::Duration;

use anyhow::{Context, Result};
use metrics::counter;
use reqwest::Client;

use super::{Ack, DeliveryError, Publisher};

/// Posts `{"text": ...}` to an incoming-webhook URL (Slack-compatible).
pub struct WebhookPublisher {
    webhook_url: Option<String>,
    client: Client,
}

impl WebhookPublisher {
    pub fn new(webhook_url: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("building webhook http client")?;
        Ok(Self {
            webhook_url: webhook_url.filter(|u| !u.trim().is_empty()),
            client,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }
}

#[async_trait::async_trait]
impl Publisher for WebhookPublisher {
    async fn publish(&self, message: &str) -> Result<Ack, DeliveryError> {
        let Some(url) = &self.webhook_url else {
            tracing::info!(target: "notify", "webhook disabled (no webhook URL); skipping post");
            counter!("webhook_posts_total", "outcome" => "skipped").increment(1);
            return Ok(Ack::Skipped);
        };

        let body = serde_json::json!({ "text": message });
        let resp = self.client.post(url).json(&body).send().await.map_err(|e| {
            counter!("webhook_posts_total", "outcome" => "error").increment(1);
            DeliveryError::Transport(e.to_string())
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            counter!("webhook_posts_total", "outcome" => "rejected").increment(1);
            tracing::warn!(target: "notify", status = status.as_u16(), "webhook rejected message");
            return Err(DeliveryError::Rejected {
                status_code: status.as_u16(),
                body,
            });
        }

        counter!("webhook_posts_total", "outcome" => "delivered").increment(1);
        tracing::info!(target: "notify", status = status.as_u16(), chars = message.chars().count(), "posted to webhook");
        Ok(Ack::Delivered {
            http_status: status.as_u16(),
        })
    }
}

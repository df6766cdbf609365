// src/notify/mod.rs
//! Load step: deliver the final message to a messaging webhook.

pub mod webhook;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

pub use webhook::WebhookPublisher;

/// Outcome of a publish call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Ack {
    Delivered { http_status: u16 },
    /// No webhook configured; nothing was sent.
    Skipped,
}

impl Ack {
    pub fn message(&self) -> &'static str {
        match self {
            Ack::Delivered { .. } => "Successfully posted to webhook.",
            Ack::Skipped => "Webhook not configured; message was not posted.",
        }
    }
}

impl fmt::Display for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("Webhook rejected the message (HTTP {status_code}): {body}")]
    Rejected { status_code: u16, body: String },
    #[error("Webhook request failed: {0}")]
    Transport(String),
}

#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    /// One delivery attempt. No retries.
    async fn publish(&self, message: &str) -> Result<Ack, DeliveryError>;
}

pub type DynPublisher = Arc<dyn Publisher>;

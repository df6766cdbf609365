// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// A configured feed URL. Persisted in the state store; read as a snapshot per run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedSource {
    pub id: String,
    pub name: String,
    pub url: String,
}

/// One normalized article handed to the reasoning service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Raw body retrieval for a feed URL. Parsing happens in the aggregator.
#[async_trait::async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

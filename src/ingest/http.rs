// src/ingest/http.rs
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;

use crate::ingest::types::FeedFetcher;

/// Fetches feed bodies over HTTP(S) with a bounded per-request timeout.
#[derive(Clone)]
pub struct HttpFeedFetcher {
    client: reqwest::Client,
}

impl HttpFeedFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("news-digest-etl/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5).min(timeout))
            .timeout(timeout)
            .build()
            .context("building feed http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let resp = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(target: "ingest", error = %e, url, "feed http error");
                counter!("feed_http_errors_total").increment(1);
                return Err(e).context("http get");
            }
        };
        let resp = resp.error_for_status().context("feed returned non-2xx status")?;
        resp.text().await.context("reading feed body")
    }
}

// src/bootstrap.rs
//! Wires config into the concrete collaborators shared by the router and the scheduler.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::api::AppState;
use crate::config::AppConfig;
use crate::ingest::{http::HttpFeedFetcher, FeedAggregator};
use crate::notify::WebhookPublisher;
use crate::orchestrator::Orchestrator;
use crate::reasoning::GeminiClient;
use crate::schedule::Scheduler;
use crate::store::{Db, JsonFileStore};

pub struct AppRuntime {
    pub cfg: AppConfig,
    pub db: Arc<Db>,
    pub orchestrator: Arc<Orchestrator>,
    pub scheduler: Arc<Scheduler>,
}

impl AppRuntime {
    pub fn from_config(cfg: AppConfig) -> Result<Self> {
        // Safe diagnostics: only model + key length + whether a webhook is set
        info!(
            "ETL cfg loaded: model={}, key_len={}, webhook={}, db={}",
            cfg.gemini.model,
            cfg.gemini.api_key.len(),
            cfg.webhook_url.is_some(),
            cfg.db_path.display()
        );
        if cfg.gemini.api_key.is_empty() {
            warn!("GEMINI_API_KEY is not set; pipeline runs will fail at the transform step");
        }

        let db = Arc::new(Db::new(Arc::new(JsonFileStore::new(cfg.db_path.clone()))));
        let aggregator = FeedAggregator::new(Arc::new(HttpFeedFetcher::new(cfg.timeouts.feed())?));
        let reasoning = Arc::new(GeminiClient::new(&cfg.gemini, cfg.timeouts.reasoning())?);
        let publisher = Arc::new(WebhookPublisher::new(
            cfg.webhook_url.clone(),
            cfg.timeouts.webhook(),
        )?);

        let orchestrator = Arc::new(
            Orchestrator::new(reasoning, aggregator, publisher, Arc::clone(&db))
                .with_prompts(&cfg.prompts)
                .with_reasoning_timeout(cfg.timeouts.reasoning()),
        );
        let scheduler = Arc::new(Scheduler::new(Arc::clone(&db), orchestrator.clone()));

        Ok(Self {
            cfg,
            db,
            orchestrator,
            scheduler,
        })
    }

    pub fn state(&self) -> AppState {
        AppState {
            orchestrator: Arc::clone(&self.orchestrator),
            scheduler: Arc::clone(&self.scheduler),
            db: Arc::clone(&self.db),
        }
    }
}

// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod metrics;
pub mod store;

// Extract
pub mod ingest;
// Transform (reasoning-service boundary + protocol driver)
pub mod orchestrator;
pub mod reasoning;
// Load
pub mod notify;
// Cron trigger
pub mod schedule;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::ingest::types::{FeedSource, NewsItem};
pub use crate::orchestrator::{Orchestrator, PipelineError, PipelineResult, RunFailure, SummaryDraft};
pub use crate::schedule::{ScheduleConfig, Scheduler};

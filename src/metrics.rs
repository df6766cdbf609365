use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder and describe pipeline series.
    pub fn init() -> Result<Self> {
        // Default buckets avoid API differences across crate versions.
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;

        describe_counter!("etl_runs_total", "Pipeline runs started, by mode.");
        describe_counter!("etl_run_failures_total", "Pipeline runs that failed, by phase.");
        describe_histogram!("etl_run_ms", "Pipeline run duration in milliseconds.");
        describe_counter!("webhook_posts_total", "Publish attempts, by outcome.");
        describe_counter!("scheduler_ticks_total", "Cron timer firings.");

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

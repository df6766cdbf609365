//! News digest ETL service: binary entrypoint.
//! Boots the Axum HTTP server, restores the persisted schedule, and serves the API.

use news_digest_etl::{bootstrap::AppRuntime, config::AppConfig, metrics::Metrics};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs; RUST_LOG wins over the default filter. `try_init` because the
/// Shuttle runtime may already have installed a subscriber.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("news_digest_etl=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load()?;
    let runtime = AppRuntime::from_config(cfg)?;

    if let Err(e) = runtime.scheduler.initialize().await {
        tracing::error!(error = %e, "scheduler initialization failed; continuing without a timer");
    }

    let mut router = news_digest_etl::router(runtime.state());
    match Metrics::init() {
        Ok(metrics) => router = router.merge(metrics.router()),
        Err(e) => tracing::warn!(error = %format!("{e:#}"), "metrics disabled"),
    }

    Ok(router.into())
}

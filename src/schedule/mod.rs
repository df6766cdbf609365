// src/schedule/mod.rs
//! Cron-driven trigger for the non-interactive pipeline.
//!
//! `Scheduler` is the single owner of the active timer. Every mutation of the
//! timer goes through its mutex, so reconfiguration is persist-then-swap
//! with no window where two timers run or a stale one survives.

pub mod cron_expr;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::store::Db;

pub use cron_expr::parse_cron;

/// Persisted singleton. `cron` may be empty while disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub cron: String,
    #[serde(rename = "isEnabled", default)]
    pub enabled: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("Invalid cron expression \"{expression}\": {reason}")]
    InvalidCronExpression { expression: String, reason: String },
    #[error("schedule store error: {0:#}")]
    Store(anyhow::Error),
}

/// What a timer tick runs. Errors are logged by the scheduler, never propagated.
#[async_trait::async_trait]
pub trait ScheduledJob: Send + Sync + 'static {
    async fn run_scheduled(&self) -> anyhow::Result<()>;
}

struct ActiveTimer {
    cron: String,
    handle: JoinHandle<()>,
}

impl Drop for ActiveTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub struct Scheduler {
    db: Arc<Db>,
    job: Arc<dyn ScheduledJob>,
    active: Mutex<Option<ActiveTimer>>,
}

impl Scheduler {
    pub fn new(db: Arc<Db>, job: Arc<dyn ScheduledJob>) -> Self {
        Self {
            db,
            job,
            active: Mutex::new(None),
        }
    }

    /// Current persisted config.
    pub async fn schedule(&self) -> Result<ScheduleConfig, ScheduleError> {
        let state = self.db.read().await.map_err(ScheduleError::Store)?;
        Ok(state.schedule)
    }

    /// Load the persisted config once at startup and install the timer.
    /// Disabled or invalid configs leave no timer.
    pub async fn initialize(&self) -> Result<(), ScheduleError> {
        info!(target: "scheduler", "initializing");
        let mut active = self.active.lock().await;
        let config = self.schedule().await?;

        if active.take().is_some() {
            info!(target: "scheduler", "stopped existing timer");
        }
        if !config.enabled {
            info!(target: "scheduler", "scheduler is disabled");
            return Ok(());
        }
        match parse_cron(&config.cron) {
            Ok(schedule) => {
                *active = Some(self.spawn_timer(config.cron.clone(), schedule));
            }
            Err(e) => {
                warn!(target: "scheduler", error = %e, "persisted schedule is invalid; no timer installed");
            }
        }
        Ok(())
    }

    /// Validate, persist, then swap the timer. An invalid expression is
    /// rejected before anything is written or cancelled.
    ///
    /// Only the timer loop is cancelled. A run the old timer already
    /// dispatched keeps going and may still publish.
    pub async fn reconfigure(&self, cron: &str, enabled: bool) -> Result<ScheduleConfig, ScheduleError> {
        let cron = cron.trim();
        let parsed = if enabled { Some(parse_cron(cron)?) } else { None };
        let config = ScheduleConfig {
            cron: cron.to_string(),
            enabled,
        };

        let mut active = self.active.lock().await;

        let persisted = config.clone();
        self.db
            .modify(move |s| {
                s.schedule = persisted;
                Ok(())
            })
            .await
            .map_err(ScheduleError::Store)?;

        if let Some(old) = active.take() {
            info!(target: "scheduler", cron = %old.cron, "stopped existing timer");
        }
        if let Some(schedule) = parsed {
            *active = Some(self.spawn_timer(config.cron.clone(), schedule));
        } else {
            info!(target: "scheduler", "scheduler disabled");
        }
        Ok(config)
    }

    /// 0 or 1.
    pub async fn active_timer_count(&self) -> usize {
        self.active
            .lock()
            .await
            .as_ref()
            .map_or(0, |t| usize::from(!t.handle.is_finished()))
    }

    pub async fn active_cron(&self) -> Option<String> {
        self.active.lock().await.as_ref().map(|t| t.cron.clone())
    }

    pub async fn shutdown(&self) {
        self.active.lock().await.take();
    }

    fn spawn_timer(&self, expr: String, schedule: cron::Schedule) -> ActiveTimer {
        info!(target: "scheduler", cron = %expr, "scheduling timer");
        let job = Arc::clone(&self.job);
        let cron_label = expr.clone();

        let handle = tokio::spawn(async move {
            let mut last_fired: Option<DateTime<Utc>> = None;
            loop {
                let now = Utc::now();
                let from = match last_fired {
                    Some(last) if last > now => last,
                    _ => now,
                };
                let Some(next) = schedule.after(&from).next() else {
                    warn!(target: "scheduler", cron = %cron_label, "no upcoming occurrence; timer stops");
                    return;
                };
                let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                tokio::time::sleep(wait).await;
                last_fired = Some(next);

                counter!("scheduler_ticks_total").increment(1);
                info!(target: "scheduler", cron = %cron_label, at = %Utc::now().to_rfc3339(), "running scheduled ETL process");

                // Own task so a panicking run cannot take the timer down.
                let run = tokio::spawn({
                    let job = Arc::clone(&job);
                    async move { job.run_scheduled().await }
                });
                match run.await {
                    Ok(Ok(())) => info!(target: "scheduler", "scheduled ETL process completed"),
                    Ok(Err(e)) => error!(target: "scheduler", error = %format!("{e:#}"), "scheduled ETL process failed"),
                    Err(e) => error!(target: "scheduler", error = %e, "scheduled ETL process aborted"),
                }
            }
        });

        ActiveTimer { cron: expr, handle }
    }
}

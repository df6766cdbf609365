// src/api.rs
//! HTTP surface consumed by the review UI.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::ingest::types::FeedSource;
use crate::orchestrator::{Orchestrator, PipelineError, PipelineResult, RunFailure, SummaryDraft};
use crate::schedule::{ScheduleConfig, ScheduleError, Scheduler};
use crate::store::Db;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub scheduler: Arc<Scheduler>,
    pub db: Arc<Db>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/etl/generate-summary", post(generate_summary))
        .route("/api/etl/post-summary", post(post_summary))
        .route("/api/etl/run-full-process", post(run_full_process))
        .route("/api/schedule", get(get_schedule).post(set_schedule))
        .route("/api/news-sources", get(list_sources).post(add_source))
        .route("/api/news-sources/{id}", delete(delete_source))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// `{ "error": ... }` with a status code, plus optional extra fields.
struct ApiError {
    status: StatusCode,
    body: Value,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<RunFailure> for ApiError {
    fn from(f: RunFailure) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: json!({
                "error": f.error.to_string(),
                "failedIn": f.failed_in,
                "extracted": f.extracted,
                "transformed": f.transformed,
            }),
        }
    }
}

async fn generate_summary(State(state): State<AppState>) -> Result<Json<SummaryDraft>, ApiError> {
    let draft = state.orchestrator.generate_summary().await?;
    Ok(Json(draft))
}

async fn post_summary(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let summary = body
        .get("summary")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Summary must be a non-empty string."))?;

    match state.orchestrator.post_summary(summary).await {
        Ok(ack) => Ok(Json(json!({
            "message": ack.to_string(),
            "summary": summary,
            "ack": ack,
        }))),
        Err(PipelineError::MissingPublishArgument) => {
            Err(ApiError::bad_request("Summary must be a non-empty string."))
        }
        Err(e) => {
            tracing::error!(target: "api", error = %e, "post summary failed");
            Err(ApiError::internal(e.to_string()))
        }
    }
}

async fn run_full_process(State(state): State<AppState>) -> Result<Json<PipelineResult>, ApiError> {
    let result = state.orchestrator.run_full_process().await?;
    Ok(Json(result))
}

async fn get_schedule(State(state): State<AppState>) -> Result<Json<ScheduleConfig>, ApiError> {
    state
        .scheduler
        .schedule()
        .await
        .map(Json)
        .map_err(|_| ApiError::internal("Failed to read schedule"))
}

async fn set_schedule(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<ScheduleConfig>, ApiError> {
    let enabled = body
        .get("isEnabled")
        .and_then(Value::as_bool)
        .ok_or_else(|| ApiError::bad_request("isEnabled must be a boolean."))?;
    let cron = match body.get("cron") {
        Some(Value::String(s)) => s.as_str(),
        None | Some(Value::Null) if !enabled => "",
        _ => return Err(ApiError::bad_request("cron must be a string when enabled.")),
    };

    match state.scheduler.reconfigure(cron, enabled).await {
        Ok(cfg) => Ok(Json(cfg)),
        Err(e @ ScheduleError::InvalidCronExpression { .. }) => {
            Err(ApiError::bad_request(format!("Failed to update schedule: {e}")))
        }
        Err(e) => Err(ApiError::internal(format!("Failed to update schedule: {e}"))),
    }
}

async fn list_sources(State(state): State<AppState>) -> Result<Json<Vec<FeedSource>>, ApiError> {
    state
        .db
        .sources()
        .await
        .map(Json)
        .map_err(|_| ApiError::internal("Failed to retrieve news sources."))
}

async fn add_source(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<FeedSource>), ApiError> {
    let field = |k: &str| {
        body.get(k)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };
    let (Some(name), Some(url)) = (field("name"), field("url")) else {
        return Err(ApiError::bad_request("Name and URL are required."));
    };

    let created = state
        .db
        .add_source(name, url)
        .await
        .map_err(|_| ApiError::internal("Failed to add new source."))?;
    tracing::info!(target: "api", id = %created.id, name = %created.name, "news source added");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn delete_source(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    match state.db.remove_source(&id).await {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Err(ApiError::new(StatusCode::NOT_FOUND, "News source not found.")),
        Err(_) => Err(ApiError::internal("Failed to delete news source.")),
    }
}

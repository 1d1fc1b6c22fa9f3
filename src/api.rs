//! Admin HTTP surface: group destinations, polling config, manual runs.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use metrics::gauge;
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::config::{ConfigRegistry, ConfigView, GroupConfig};
use crate::error::{ConfigError, PersistError, PipelineError, SchedulerError};
use crate::ingest::scheduler::{Scheduler, SchedulerStatus, TriggerOutcome};
use crate::ingest::types::{Category, ListingBatch};
use crate::ingest::{Pipeline, RunReport};

const DEFAULT_PREVIEW_LIMIT: usize = 5;
const MAX_PREVIEW_LIMIT: usize = 50;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ConfigRegistry>,
    pub pipeline: Arc<Pipeline>,
    pub scheduler: Arc<Scheduler>,
    pub admin_token: Option<Arc<str>>,
}

pub fn router(state: AppState) -> Router {
    let admin = Router::new()
        .route(
            "/groups/{group_id}/destinations/{category}",
            put(set_destination).delete(clear_destination),
        )
        .route("/config/interval", put(set_interval))
        .route("/config/start-window", put(set_start_window))
        .route("/config/start-timestamp", put(set_start_timestamp))
        .route("/scrape-now", post(scrape_now))
        .route("/seen", axum::routing::delete(reset_seen))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/groups/{group_id}/config", get(view_config))
        .route("/preview", get(preview))
        .route("/scheduler", get(scheduler_status))
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    Busy,
    Upstream(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "missing or invalid admin token".into()),
            ApiError::Busy => (StatusCode::CONFLICT, "a run is already in progress".into()),
            ApiError::Upstream(m) => (StatusCode::BAD_GATEWAY, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(json!({ "error": msg }))).into_response()
    }
}

impl From<ConfigError> for ApiError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Validation(m) => ApiError::BadRequest(m),
            ConfigError::Persistence(p) => p.into(),
        }
    }
}

impl From<PersistError> for ApiError {
    fn from(e: PersistError) -> Self {
        tracing::error!(target: "api", error = %e, "state storage failed");
        ApiError::Internal(e.to_string())
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::FetchFailed(f) => ApiError::Upstream(f.to_string()),
            PipelineError::PersistenceFailed(p) => p.into(),
        }
    }
}

impl From<SchedulerError> for ApiError {
    fn from(e: SchedulerError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected) = state.admin_token.as_deref() {
        let presented = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if presented != Some(expected) {
            return Err(ApiError::Unauthorized);
        }
    }
    Ok(next.run(req).await)
}

fn parse_category(raw: &str) -> Result<Category, ApiError> {
    raw.parse().map_err(ApiError::BadRequest)
}

async fn view_config(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> Result<Json<ConfigView>, ApiError> {
    Ok(Json(state.registry.view(&group_id).await?))
}

#[derive(Deserialize)]
struct DestinationReq {
    handle: String,
}

async fn set_destination(
    State(state): State<AppState>,
    Path((group_id, category)): Path<(String, String)>,
    Json(body): Json<DestinationReq>,
) -> Result<Json<GroupConfig>, ApiError> {
    let category = parse_category(&category)?;
    let group = state
        .registry
        .set_destination(&group_id, category, &body.handle)
        .await?;
    Ok(Json(group))
}

async fn clear_destination(
    State(state): State<AppState>,
    Path((group_id, category)): Path<(String, String)>,
) -> Result<Json<GroupConfig>, ApiError> {
    let category = parse_category(&category)?;
    Ok(Json(state.registry.clear_destination(&group_id, category).await?))
}

#[derive(Deserialize)]
struct IntervalReq {
    hours: f64,
}

/// Persist first, then reschedule: the next run happens `hours` from now.
async fn set_interval(
    State(state): State<AppState>,
    Json(body): Json<IntervalReq>,
) -> Result<Json<SchedulerStatus>, ApiError> {
    state.registry.set_interval(body.hours).await?;
    state.scheduler.restart(body.hours)?;
    gauge!("scrape_interval_hours").set(body.hours);
    Ok(Json(state.scheduler.status()))
}

#[derive(Deserialize)]
struct StartWindowReq {
    days_back: u32,
}

async fn set_start_window(
    State(state): State<AppState>,
    Json(body): Json<StartWindowReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let ts = state.registry.set_start_window(body.days_back).await?;
    Ok(Json(json!({ "scrape_start_timestamp": ts })))
}

#[derive(Deserialize)]
struct StartTimestampReq {
    timestamp: i64,
}

async fn set_start_timestamp(
    State(state): State<AppState>,
    Json(body): Json<StartTimestampReq>,
) -> Result<StatusCode, ApiError> {
    state.registry.set_start_timestamp(body.timestamp).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn scrape_now(State(state): State<AppState>) -> Result<Json<RunReport>, ApiError> {
    match state.scheduler.trigger_now().await {
        TriggerOutcome::Completed(result) => Ok(Json(result?)),
        TriggerOutcome::Busy => Err(ApiError::Busy),
    }
}

#[derive(Deserialize)]
struct PreviewQuery {
    limit: Option<usize>,
}

async fn preview(
    State(state): State<AppState>,
    Query(q): Query<PreviewQuery>,
) -> Result<Json<ListingBatch>, ApiError> {
    let limit = q.limit.unwrap_or(DEFAULT_PREVIEW_LIMIT).min(MAX_PREVIEW_LIMIT);
    Ok(Json(state.pipeline.preview(limit).await?))
}

async fn scheduler_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "scheduler": state.scheduler.status(),
        "run_in_progress": state.scheduler.is_running_job(),
        "ready": state.scheduler.ready_gate().is_open(),
    }))
}

#[derive(Deserialize)]
struct ResetQuery {
    category: Option<String>,
}

async fn reset_seen(
    State(state): State<AppState>,
    Query(q): Query<ResetQuery>,
) -> Result<StatusCode, ApiError> {
    let category = q.category.as_deref().map(parse_category).transpose()?;
    state.pipeline.dedup().reset(category).await?;
    tracing::info!(target: "api", category = ?category, "dedup state reset");
    Ok(StatusCode::NO_CONTENT)
}

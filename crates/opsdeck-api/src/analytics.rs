// Analytics HTTP routes

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{Days, NaiveDate, Utc};
use opsdeck_core::analytics::{self, RunMetrics, TaskOverview, TrendPoint};
use opsdeck_core::{RunRecord, RunStore, TaskStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::common::log_error;

/// Days covered by the default trend window, today included
const DEFAULT_TREND_DAYS: u64 = 7;

/// App state for analytics routes
#[derive(Clone)]
pub struct AppState {
    pub runs: Arc<dyn RunStore>,
    pub tasks: Arc<dyn TaskStore>,
}

impl AppState {
    pub fn new(runs: Arc<dyn RunStore>, tasks: Arc<dyn TaskStore>) -> Self {
        Self { runs, tasks }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InsightsResponse {
    pub metrics: RunMetrics,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FailuresResponse {
    pub failures: Vec<RunRecord>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TrendsResponse {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub series: Vec<TrendPoint>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct FailuresParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

/// Inclusive date range; defaults to the last seven days
#[derive(Debug, Deserialize, IntoParams)]
pub struct TrendsParams {
    #[param(value_type = Option<String>, example = "2024-01-01")]
    pub start: Option<NaiveDate>,
    #[param(value_type = Option<String>, example = "2024-01-07")]
    pub end: Option<NaiveDate>,
}

/// Create analytics routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/analytics/overview", get(overview))
        .route("/analytics/insights", get(insights))
        .route("/analytics/failures", get(failures))
        .route("/analytics/trends", get(trends))
        .with_state(state)
}

/// GET /analytics/overview - Task overview
#[utoipa::path(
    get,
    path = "/analytics/overview",
    responses(
        (status = 200, description = "Task overview", body = TaskOverview),
        (status = 500, description = "Internal server error")
    ),
    tag = "analytics"
)]
pub async fn overview(State(state): State<AppState>) -> Result<Json<TaskOverview>, StatusCode> {
    analytics::load_task_overview(state.tasks.as_ref())
        .await
        .map(Json)
        .map_err(log_error("load task overview"))
}

/// GET /analytics/insights - Run metrics
#[utoipa::path(
    get,
    path = "/analytics/insights",
    responses(
        (status = 200, description = "Metrics over recent runs", body = InsightsResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "analytics"
)]
pub async fn insights(
    State(state): State<AppState>,
) -> Result<Json<InsightsResponse>, StatusCode> {
    let metrics = analytics::load_metrics(state.runs.as_ref())
        .await
        .map_err(log_error("load metrics"))?;
    Ok(Json(InsightsResponse { metrics }))
}

/// GET /analytics/failures - Recent failed runs
#[utoipa::path(
    get,
    path = "/analytics/failures",
    params(FailuresParams),
    responses(
        (status = 200, description = "Failed runs, newest first", body = FailuresResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "analytics"
)]
pub async fn failures(
    State(state): State<AppState>,
    Query(params): Query<FailuresParams>,
) -> Result<Json<FailuresResponse>, StatusCode> {
    let failures = analytics::load_recent_failures(state.runs.as_ref(), params.limit)
        .await
        .map_err(log_error("load failures"))?;
    Ok(Json(FailuresResponse { failures }))
}

/// GET /analytics/trends - Daily run counts
#[utoipa::path(
    get,
    path = "/analytics/trends",
    params(TrendsParams),
    responses(
        (status = 200, description = "One point per day", body = TrendsResponse),
        (status = 400, description = "start is after end, or the range exceeds 366 days"),
        (status = 500, description = "Internal server error")
    ),
    tag = "analytics"
)]
pub async fn trends(
    State(state): State<AppState>,
    Query(params): Query<TrendsParams>,
) -> Result<Json<TrendsResponse>, StatusCode> {
    let end = params.end.unwrap_or_else(|| Utc::now().date_naive());
    let start = params.start.unwrap_or_else(|| {
        end.checked_sub_days(Days::new(DEFAULT_TREND_DAYS - 1))
            .unwrap_or(NaiveDate::MIN)
    });

    let series = analytics::load_trends(state.runs.as_ref(), start, end)
        .await
        .map_err(log_error("load trends"))?;

    Ok(Json(TrendsResponse { start, end, series }))
}

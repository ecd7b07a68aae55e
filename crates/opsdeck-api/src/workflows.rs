// Workflow HTTP routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use opsdeck_core::{params_from_json, RunQuery, RunRecord, RunStore, RunSummary, WorkflowEngine};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::common::log_error;

/// App state for workflow routes
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    pub runs: Arc<dyn RunStore>,
}

impl AppState {
    pub fn new(engine: Arc<WorkflowEngine>, runs: Arc<dyn RunStore>) -> Self {
        Self { engine, runs }
    }
}

/// Request to execute a workflow
#[derive(Debug, Deserialize, ToSchema)]
pub struct ExecuteWorkflowRequest {
    #[schema(example = "weekly_review")]
    pub workflow_name: String,
    /// Placeholder values; scalars are stringified before binding
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub params: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExecuteWorkflowResponse {
    pub workflow: String,
    pub summary: RunSummary,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WorkflowListResponse {
    pub workflows: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RunListResponse {
    pub runs: Vec<RunRecord>,
}

/// Query parameters for listing runs
#[derive(Debug, Deserialize, IntoParams)]
pub struct LogsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    /// Case-insensitive filter over workflow name or status
    pub q: Option<String>,
}

fn default_limit() -> usize {
    20
}

/// Create workflow routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/workflows/list", get(list_workflows))
        .route("/workflows/execute", post(execute_workflow))
        .route("/workflows/logs", get(list_logs))
        .route("/workflows/logs/:run_id", get(get_log))
        .with_state(state)
}

/// GET /workflows/list - Registered workflow names
#[utoipa::path(
    get,
    path = "/workflows/list",
    responses(
        (status = 200, description = "Workflow names in registration order", body = WorkflowListResponse)
    ),
    tag = "workflows"
)]
pub async fn list_workflows(State(state): State<AppState>) -> Json<WorkflowListResponse> {
    Json(WorkflowListResponse {
        workflows: state.engine.list_workflows(),
    })
}

/// POST /workflows/execute - Run a workflow to completion
#[utoipa::path(
    post,
    path = "/workflows/execute",
    request_body = ExecuteWorkflowRequest,
    responses(
        (status = 200, description = "Run finished", body = ExecuteWorkflowResponse),
        (status = 400, description = "Invalid plan"),
        (status = 404, description = "Unknown workflow"),
        (status = 500, description = "Internal server error")
    ),
    tag = "workflows"
)]
pub async fn execute_workflow(
    State(state): State<AppState>,
    Json(req): Json<ExecuteWorkflowRequest>,
) -> Result<Json<ExecuteWorkflowResponse>, StatusCode> {
    let params = req
        .params
        .as_ref()
        .map(params_from_json)
        .unwrap_or_default();

    let summary = state
        .engine
        .run(&req.workflow_name, params)
        .await
        .map_err(log_error("execute workflow"))?;

    Ok(Json(ExecuteWorkflowResponse {
        workflow: req.workflow_name,
        summary,
    }))
}

/// GET /workflows/logs - Recorded runs, newest first
#[utoipa::path(
    get,
    path = "/workflows/logs",
    params(LogsQuery),
    responses(
        (status = 200, description = "Page of runs", body = RunListResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "workflows"
)]
pub async fn list_logs(
    State(state): State<AppState>,
    Query(params): Query<LogsQuery>,
) -> Result<Json<RunListResponse>, StatusCode> {
    let mut query = RunQuery::new(params.limit).with_offset(params.offset);
    if let Some(q) = params.q {
        query = query.with_text(q);
    }

    let runs = state
        .runs
        .list_runs(&query)
        .await
        .map_err(log_error("list runs"))?;

    Ok(Json(RunListResponse { runs }))
}

/// GET /workflows/logs/:run_id - Single run
#[utoipa::path(
    get,
    path = "/workflows/logs/{run_id}",
    params(("run_id" = i64, Path, description = "Run ID")),
    responses(
        (status = 200, description = "Run found", body = RunRecord),
        (status = 404, description = "Run not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "workflows"
)]
pub async fn get_log(
    State(state): State<AppState>,
    Path(run_id): Path<i64>,
) -> Result<Json<RunRecord>, StatusCode> {
    state
        .runs
        .get_run(run_id)
        .await
        .map_err(log_error("get run"))?
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

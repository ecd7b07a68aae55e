// Task HTTP routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use opsdeck_core::{NewTask, Task, TaskStatus, TaskStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::common::log_error;

/// App state for task routes
#[derive(Clone)]
pub struct AppState {
    pub tasks: Arc<dyn TaskStore>,
}

impl AppState {
    pub fn new(tasks: Arc<dyn TaskStore>) -> Self {
        Self { tasks }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskListResponse {
    pub tasks: Vec<Task>,
}

/// Query parameters for listing tasks
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListTasksParams {
    /// One of open, in_progress, overdue, done
    pub status: Option<String>,
}

/// Request to change a task's status
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateTaskStatusRequest {
    #[schema(example = "in_progress")]
    pub status: String,
}

/// Create task routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/:task_id", get(get_task))
        .route("/tasks/:task_id/status", patch(update_task_status))
        .with_state(state)
}

/// POST /tasks - Create a task
#[utoipa::path(
    post,
    path = "/tasks",
    request_body = NewTask,
    responses(
        (status = 201, description = "Task created", body = Task),
        (status = 500, description = "Internal server error")
    ),
    tag = "tasks"
)]
pub async fn create_task(
    State(state): State<AppState>,
    Json(req): Json<NewTask>,
) -> Result<(StatusCode, Json<Task>), StatusCode> {
    let task = state
        .tasks
        .add_task(req)
        .await
        .map_err(log_error("create task"))?;

    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /tasks - List tasks
#[utoipa::path(
    get,
    path = "/tasks",
    params(ListTasksParams),
    responses(
        (status = 200, description = "Tasks in id order", body = TaskListResponse),
        (status = 400, description = "Unknown status filter"),
        (status = 500, description = "Internal server error")
    ),
    tag = "tasks"
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(params): Query<ListTasksParams>,
) -> Result<Json<TaskListResponse>, StatusCode> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<TaskStatus>)
        .transpose()
        .map_err(log_error("list tasks"))?;

    let tasks = state
        .tasks
        .list_tasks(status)
        .await
        .map_err(log_error("list tasks"))?;

    Ok(Json(TaskListResponse { tasks }))
}

/// GET /tasks/:task_id - Get a task
#[utoipa::path(
    get,
    path = "/tasks/{task_id}",
    params(("task_id" = i64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task found", body = Task),
        (status = 404, description = "Task not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "tasks"
)]
pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
) -> Result<Json<Task>, StatusCode> {
    state
        .tasks
        .get_task(task_id)
        .await
        .map_err(log_error("get task"))?
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// PATCH /tasks/:task_id/status - Change a task's status
#[utoipa::path(
    patch,
    path = "/tasks/{task_id}/status",
    params(("task_id" = i64, Path, description = "Task ID")),
    request_body = UpdateTaskStatusRequest,
    responses(
        (status = 200, description = "Updated task", body = Task),
        (status = 400, description = "Unknown status"),
        (status = 404, description = "Task not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "tasks"
)]
pub async fn update_task_status(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
    Json(req): Json<UpdateTaskStatusRequest>,
) -> Result<Json<Task>, StatusCode> {
    let status: TaskStatus = req.status.parse().map_err(log_error("update task"))?;

    let updated = state
        .tasks
        .update_status(task_id, status)
        .await
        .map_err(log_error("update task"))?;
    if !updated {
        return Err(StatusCode::NOT_FOUND);
    }

    get_task(State(state), Path(task_id)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use opsdeck_core::memory::InMemoryTaskStore;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        routes(AppState::new(Arc::new(InMemoryTaskStore::new())))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri);
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_task_lifecycle() {
        let app = app();

        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/tasks",
                Some(json!({"source": "notion", "title": "Prepare review", "owner": "sam"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["status"], "open");
        let id = created["id"].as_i64().unwrap();

        let response = app
            .clone()
            .oneshot(request(
                "PATCH",
                &format!("/tasks/{id}/status"),
                Some(json!({"status": "in_progress"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "in_progress");

        let response = app
            .clone()
            .oneshot(request("GET", "/tasks?status=in_progress", None))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["tasks"].as_array().unwrap().len(), 1);

        let response = app
            .oneshot(request("GET", "/tasks?status=open", None))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert!(body["tasks"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_status_is_400() {
        let app = app();

        let response = app
            .clone()
            .oneshot(request("GET", "/tasks?status=someday", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(request(
                "PATCH",
                "/tasks/1/status",
                Some(json!({"status": "someday"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_task_is_404() {
        let app = app();

        let response = app
            .clone()
            .oneshot(request("GET", "/tasks/7", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(request(
                "PATCH",
                "/tasks/7/status",
                Some(json!({"status": "done"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

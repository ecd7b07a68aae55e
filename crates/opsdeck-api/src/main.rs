// Opsdeck API server
// Decision: Postgres when DATABASE_URL is set, in-memory stores otherwise
// Decision: Tool calls go through the stub router until real connectors land

mod agents;
mod analytics;
mod common;
mod config;
mod slack;
mod tasks;
mod workflows;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use axum::{extract::State, routing::get, Json, Router};
use opsdeck_core::memory::{InMemoryRunStore, InMemoryTaskStore};
use opsdeck_core::{
    NewTask, PlanRegistry, RunRecord, RunStatus, RunStore, RunSummary, StubToolRouter, Task,
    TaskStatus, TaskStore, ToolRouter, WorkflowEngine,
};
use opsdeck_storage::{create_db_run_store, create_db_task_store, Database};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::ApiConfig;
use crate::slack::SlackClient;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    storage: &'static str,
}

/// State for health endpoint
#[derive(Clone)]
struct HealthState {
    storage: &'static str,
}

async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        storage: state.storage,
    })
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        workflows::list_workflows,
        workflows::execute_workflow,
        workflows::list_logs,
        workflows::get_log,
        tasks::create_task,
        tasks::list_tasks,
        tasks::get_task,
        tasks::update_task_status,
        analytics::overview,
        analytics::insights,
        analytics::failures,
        analytics::trends,
        agents::slack_send,
        agents::slack_messages,
        agents::slack_status,
        agents::connect_tool,
        agents::list_connections,
        agents::search,
        agents::invoke_tool,
    ),
    components(
        schemas(
            RunRecord, RunStatus, RunSummary,
            Task, TaskStatus, NewTask,
            workflows::ExecuteWorkflowRequest,
            workflows::ExecuteWorkflowResponse,
            workflows::WorkflowListResponse,
            workflows::RunListResponse,
            tasks::TaskListResponse,
            tasks::UpdateTaskStatusRequest,
            analytics::InsightsResponse,
            analytics::FailuresResponse,
            analytics::TrendsResponse,
            agents::SlackSendRequest,
            agents::SlackSendResponse,
            agents::SlackStatusResponse,
            agents::SlackMessagesResponse,
            agents::ConnectRequest,
            agents::ConnectionsResponse,
            agents::InvokeRequest,
        )
    ),
    tags(
        (name = "workflows", description = "Workflow execution and run history"),
        (name = "tasks", description = "Tracked task endpoints"),
        (name = "analytics", description = "Run metrics, failures and trends"),
        (name = "agents", description = "Slack agent endpoints"),
        (name = "connections", description = "Tool connections, search and direct invocation")
    ),
    info(
        title = "Opsdeck API",
        version = "0.1.0",
        description = "API for running operations workflows across connected tools",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
struct ApiDoc;

/// Store backends selected at startup
struct Stores {
    runs: Arc<dyn RunStore>,
    tasks: Arc<dyn TaskStore>,
    kind: &'static str,
}

async fn connect_stores(database_url: Option<&str>) -> Result<Stores> {
    let Some(url) = database_url else {
        tracing::warn!("DATABASE_URL not set; using in-memory stores (data is lost on restart)");
        return Ok(Stores {
            runs: Arc::new(InMemoryRunStore::new()),
            tasks: Arc::new(InMemoryTaskStore::new()),
            kind: "memory",
        });
    };

    let db = Database::from_url(url)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await?;
    tracing::info!("Connected to database");

    Ok(Stores {
        runs: Arc::new(create_db_run_store(db.clone())),
        tasks: Arc::new(create_db_task_store(db)),
        kind: "postgres",
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "opsdeck_api=debug,opsdeck_core=info,opsdeck_storage=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("opsdeck-api starting...");

    let config = ApiConfig::from_env();
    tracing::info!(
        max_attempts = config.engine.retry.max_attempts,
        backoff_base_ms = config.engine.retry.backoff_base.as_millis() as u64,
        "Engine retry policy configured"
    );

    let stores = connect_stores(config.database_url.as_deref()).await?;

    let router: Arc<dyn ToolRouter> = Arc::new(StubToolRouter::new());
    let engine = Arc::new(WorkflowEngine::new(
        PlanRegistry::builtin(),
        router.clone(),
        stores.runs.clone(),
        config.engine.clone(),
    ));
    tracing::info!(workflows = ?engine.list_workflows(), "Workflow registry loaded");

    let slack = Arc::new(SlackClient::new(
        config.slack_bot_token.clone(),
        config.slack_api_base_url.clone(),
    ));
    if slack.is_mock() {
        tracing::info!("Slack agent running in mock mode");
    }

    // Create module-specific states
    let workflows_state = workflows::AppState::new(engine, stores.runs.clone());
    let tasks_state = tasks::AppState::new(stores.tasks.clone());
    let analytics_state = analytics::AppState::new(stores.runs.clone(), stores.tasks.clone());
    let agents_state = agents::AppState::new(slack, router);
    let health_state = HealthState {
        storage: stores.kind,
    };

    if !config.api_prefix.is_empty() {
        tracing::info!(prefix = %config.api_prefix, "API prefix configured");
    }

    let api_routes = Router::new()
        .merge(workflows::routes(workflows_state))
        .merge(tasks::routes(tasks_state))
        .merge(analytics::routes(analytics_state))
        .merge(agents::routes(agents_state));

    // Health stays unprefixed
    let app = Router::new()
        .route("/health", get(health).with_state(health_state))
        .merge(build_router_with_prefix(api_routes, &config.api_prefix))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()));

    let cors_origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    tracing::info!(origins = ?cors_origins, "CORS origins configured");

    let app = app
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(cors_origins))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::OPTIONS,
                ])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::AUTHORIZATION,
                    header::ACCEPT,
                    header::ORIGIN,
                ])
                .allow_credentials(true),
        )
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Build router with optional API prefix (extracted for testing)
fn build_router_with_prefix<S: Clone + Send + Sync + 'static>(
    api_routes: Router<S>,
    api_prefix: &str,
) -> Router<S> {
    if api_prefix.is_empty() {
        api_routes
    } else {
        Router::new().nest(api_prefix, api_routes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_routes() -> Router {
        Router::new().route("/workflows/list", get(|| async { "ok" }))
    }

    #[tokio::test]
    async fn test_api_prefix_empty() {
        let app = build_router_with_prefix(test_routes(), "");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/workflows/list")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_api_prefix_set() {
        let app = build_router_with_prefix(test_routes(), "/api");

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/workflows/list")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), 200);

        // Unprefixed path is gone
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/workflows/list")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn test_health_reports_storage() {
        let app = Router::new().route(
            "/health",
            get(health).with_state(HealthState { storage: "memory" }),
        );

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["storage"], "memory");
    }

    #[tokio::test]
    async fn test_in_memory_stores_without_database() {
        let stores = connect_stores(None).await.unwrap();
        assert_eq!(stores.kind, "memory");
        assert!(stores.tasks.list_tasks(None).await.unwrap().is_empty());
    }

    #[test]
    fn test_openapi_lists_workflow_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/workflows/execute"));
        assert!(doc.paths.paths.contains_key("/analytics/trends"));
    }
}

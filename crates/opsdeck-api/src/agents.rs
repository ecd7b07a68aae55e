// Agent and tool connection HTTP routes
//
// Slack agent endpoints plus thin pass-throughs to the tool router's
// auxiliary operations (connections, search, direct invoke).

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use opsdeck_core::ToolRouter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::common::log_error;
use crate::slack::{ConnectionOutcome, SendOutcome, SlackClient};

/// App state for agent routes
#[derive(Clone)]
pub struct AppState {
    pub slack: Arc<SlackClient>,
    pub router: Arc<dyn ToolRouter>,
}

impl AppState {
    pub fn new(slack: Arc<SlackClient>, router: Arc<dyn ToolRouter>) -> Self {
        Self { slack, router }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SlackSendRequest {
    #[schema(example = "#ops")]
    pub channel: String,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SlackSendResponse {
    pub result: SendOutcome,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SlackStatusResponse {
    pub result: ConnectionOutcome,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SlackMessagesResponse {
    #[schema(value_type = Vec<Object>)]
    pub messages: Vec<Value>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SlackMessagesParams {
    pub channel: String,
    #[serde(default = "default_message_limit")]
    pub limit: u32,
}

fn default_message_limit() -> u32 {
    10
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConnectRequest {
    #[schema(example = "slack")]
    pub tool: String,
    pub token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConnectionsResponse {
    pub connections: Vec<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchParams {
    pub q: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InvokeRequest {
    pub tool: String,
    pub method: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub payload: Value,
}

/// Create agent routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/agents/slack/send", post(slack_send))
        .route("/agents/slack/messages", get(slack_messages))
        .route("/agents/slack/status", get(slack_status))
        .route("/connections", get(list_connections).post(connect_tool))
        .route("/search", get(search))
        .route("/tools/invoke", post(invoke_tool))
        .with_state(state)
}

/// POST /agents/slack/send - Post a Slack message
#[utoipa::path(
    post,
    path = "/agents/slack/send",
    request_body = SlackSendRequest,
    responses(
        (status = 200, description = "Send outcome (ok, error or mock)", body = SlackSendResponse)
    ),
    tag = "agents"
)]
pub async fn slack_send(
    State(state): State<AppState>,
    Json(req): Json<SlackSendRequest>,
) -> Json<SlackSendResponse> {
    let result = state.slack.send(&req.channel, &req.text).await;
    Json(SlackSendResponse { result })
}

/// GET /agents/slack/messages - Recent channel messages
#[utoipa::path(
    get,
    path = "/agents/slack/messages",
    params(SlackMessagesParams),
    responses(
        (status = 200, description = "Messages, empty on failure", body = SlackMessagesResponse)
    ),
    tag = "agents"
)]
pub async fn slack_messages(
    State(state): State<AppState>,
    Query(params): Query<SlackMessagesParams>,
) -> Json<SlackMessagesResponse> {
    let messages = state.slack.poll(&params.channel, params.limit).await;
    Json(SlackMessagesResponse { messages })
}

/// GET /agents/slack/status - Check the Slack token
#[utoipa::path(
    get,
    path = "/agents/slack/status",
    responses(
        (status = 200, description = "Connection outcome", body = SlackStatusResponse)
    ),
    tag = "agents"
)]
pub async fn slack_status(State(state): State<AppState>) -> Json<SlackStatusResponse> {
    Json(SlackStatusResponse {
        result: state.slack.auth_test().await,
    })
}

/// POST /connections - Connect a tool
#[utoipa::path(
    post,
    path = "/connections",
    request_body = ConnectRequest,
    responses(
        (status = 200, description = "Connection acknowledgement"),
        (status = 500, description = "Connection failed")
    ),
    tag = "connections"
)]
pub async fn connect_tool(
    State(state): State<AppState>,
    Json(req): Json<ConnectRequest>,
) -> Result<Json<Value>, StatusCode> {
    state
        .router
        .connect(&req.tool, req.token.as_deref())
        .await
        .map(Json)
        .map_err(log_error("connect tool"))
}

/// GET /connections - Connected tool names
#[utoipa::path(
    get,
    path = "/connections",
    responses(
        (status = 200, description = "Connected tools", body = ConnectionsResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "connections"
)]
pub async fn list_connections(
    State(state): State<AppState>,
) -> Result<Json<ConnectionsResponse>, StatusCode> {
    let connections = state
        .router
        .manage_connections()
        .await
        .map_err(log_error("list connections"))?;
    Ok(Json(ConnectionsResponse { connections }))
}

/// GET /search - Search across connected tools
#[utoipa::path(
    get,
    path = "/search",
    params(SearchParams),
    responses(
        (status = 200, description = "Router search result"),
        (status = 500, description = "Internal server error")
    ),
    tag = "connections"
)]
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, StatusCode> {
    state
        .router
        .search(&params.q)
        .await
        .map(Json)
        .map_err(log_error("search"))
}

/// POST /tools/invoke - Call a tool method directly
#[utoipa::path(
    post,
    path = "/tools/invoke",
    request_body = InvokeRequest,
    responses(
        (status = 200, description = "Router invoke result"),
        (status = 500, description = "Internal server error")
    ),
    tag = "connections"
)]
pub async fn invoke_tool(
    State(state): State<AppState>,
    Json(req): Json<InvokeRequest>,
) -> Result<Json<Value>, StatusCode> {
    state
        .router
        .invoke(&req.tool, &req.method, req.payload)
        .await
        .map(Json)
        .map_err(log_error("invoke tool"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use opsdeck_core::StubToolRouter;
    use serde_json::json;
    use tower::ServiceExt;

    fn app() -> Router {
        let slack = Arc::new(SlackClient::new(None, "http://unused"));
        routes(AppState::new(slack, Arc::new(StubToolRouter::new())))
    }

    async fn call(app: Router, method: &str, uri: &str, body: Option<Value>) -> Value {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_slack_send_mock() {
        let body = call(
            app(),
            "POST",
            "/agents/slack/send",
            Some(json!({"channel": "#ops", "text": "hello"})),
        )
        .await;

        assert_eq!(
            body,
            json!({"result": {"status": "mock", "channel": "#ops", "text": "hello"}})
        );
    }

    #[tokio::test]
    async fn test_slack_status_and_messages_mock() {
        let app = app();

        let body = call(app.clone(), "GET", "/agents/slack/status", None).await;
        assert_eq!(body, json!({"result": {"status": "mock"}}));

        let body = call(app, "GET", "/agents/slack/messages?channel=C1", None).await;
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_connections() {
        let app = app();

        let body = call(
            app.clone(),
            "POST",
            "/connections",
            Some(json!({"tool": "notion", "token": "secret"})),
        )
        .await;
        assert_eq!(body["status"], "connected");

        let body = call(app, "GET", "/connections", None).await;
        assert_eq!(body, json!({"connections": ["notion"]}));
    }

    #[tokio::test]
    async fn test_search_and_invoke() {
        let app = app();

        let body = call(app.clone(), "GET", "/search?q=weekly", None).await;
        assert_eq!(body, json!({"query": "weekly", "results": []}));

        let body = call(
            app,
            "POST",
            "/tools/invoke",
            Some(json!({"tool": "slack", "method": "post_message", "payload": {"text": "hi"}})),
        )
        .await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["payload"]["text"], "hi");
    }
}

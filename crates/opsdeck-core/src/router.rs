// Tool router
//
// The single boundary between the engine and external SaaS capabilities.
// The engine only ever sees `Arc<dyn ToolRouter>`; production clients and
// test doubles are interchangeable behind it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{EngineError, Result};
use crate::execution::{Execution, ExecutionResult};
use crate::plan::Plan;

/// Plan as registered with the router
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRecord {
    /// Opaque identifier, used for log readability only
    pub plan_id: String,
    pub plan: Plan,
}

/// Capability interface over external tools
#[async_trait]
pub trait ToolRouter: Send + Sync {
    /// Register a bound plan and obtain its id
    async fn register_plan(&self, plan: &Plan) -> Result<PlanRecord>;

    /// Execute a batch of executions.
    ///
    /// All-or-nothing: on success the results match the input order one to
    /// one; any failure fails the whole call with `ExecutionFailed`.
    async fn execute_batch(&self, executions: &[Execution]) -> Result<Vec<ExecutionResult>>;

    /// Contextual search across connected tools
    async fn search(&self, query: &str) -> Result<Value>;

    /// Names of connected tools
    async fn manage_connections(&self) -> Result<Vec<String>>;

    /// Connect a tool, optionally with an access token
    async fn connect(&self, tool: &str, token: Option<&str>) -> Result<Value>;

    /// Direct invocation of a tool method outside any plan
    async fn invoke(&self, tool: &str, method: &str, payload: Value) -> Result<Value>;
}

// ============================================================================
// StubToolRouter - local development router
// ============================================================================

/// Router that answers every call locally with canned tool responses
#[derive(Debug, Default, Clone)]
pub struct StubToolRouter {
    connections: Arc<RwLock<BTreeMap<String, Option<String>>>>,
}

impl StubToolRouter {
    pub fn new() -> Self {
        Self::default()
    }

    fn respond(execution: &Execution) -> ExecutionResult {
        let result = ExecutionResult::ok(execution);
        match execution.tool.as_str() {
            "gmail" => result.with_field(
                "messages",
                json!([{"id": "m1", "subject": "Weekly update"}]),
            ),
            "slack" => result.with_field("ts", json!("12345")),
            "notion" => result.with_field("page_id", json!("p_1")),
            _ => result,
        }
    }
}

#[async_trait]
impl ToolRouter for StubToolRouter {
    async fn register_plan(&self, plan: &Plan) -> Result<PlanRecord> {
        let plan_id = format!("plan_{}", plan.steps.len());
        tracing::info!(plan_id = %plan_id, workflow = %plan.name, "Registered plan");
        Ok(PlanRecord {
            plan_id,
            plan: plan.clone(),
        })
    }

    async fn execute_batch(&self, executions: &[Execution]) -> Result<Vec<ExecutionResult>> {
        Ok(executions
            .iter()
            .map(|execution| {
                tracing::debug!(
                    tool = %execution.tool,
                    action = %execution.action,
                    "Stub executing"
                );
                Self::respond(execution)
            })
            .collect())
    }

    async fn search(&self, query: &str) -> Result<Value> {
        tracing::debug!(query = %query, "Stub search");
        Ok(json!({"query": query, "results": []}))
    }

    async fn manage_connections(&self) -> Result<Vec<String>> {
        Ok(self.connections.read().await.keys().cloned().collect())
    }

    async fn connect(&self, tool: &str, token: Option<&str>) -> Result<Value> {
        if tool.trim().is_empty() {
            return Err(EngineError::connection("tool name is empty"));
        }
        self.connections
            .write()
            .await
            .insert(tool.to_string(), token.map(str::to_string));
        tracing::info!(tool = %tool, "Connected stub tool");
        Ok(json!({"status": "connected", "tool": tool}))
    }

    async fn invoke(&self, tool: &str, method: &str, payload: Value) -> Result<Value> {
        tracing::debug!(tool = %tool, method = %method, "Stub invoke");
        Ok(json!({"tool": tool, "method": method, "payload": payload, "status": "ok"}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Step;

    #[tokio::test]
    async fn test_register_plan_id() {
        let router = StubToolRouter::new();
        let plan = Plan::new(
            "p",
            vec![
                Step::new("a", "", json!({})),
                Step::new("b", "", json!({})),
            ],
        );
        let record = router.register_plan(&plan).await.unwrap();
        assert_eq!(record.plan_id, "plan_2");
        assert_eq!(record.plan, plan);
    }

    #[tokio::test]
    async fn test_execute_batch_tool_fields_in_order() {
        let router = StubToolRouter::new();
        let executions = vec![
            Execution::new("gmail", "fetch_messages", json!({"label": "STARRED"})),
            Execution::new("slack", "post_message", json!({"channel": "#ops"})),
            Execution::new("notion", "create_summary_page", json!({})),
            Execution::new("generic", "archive", json!({})),
        ];

        let results = router.execute_batch(&executions).await.unwrap();

        assert_eq!(results.len(), 4);
        assert!(results.iter().all(ExecutionResult::is_ok));
        assert_eq!(results[0].extra["messages"][0]["id"], "m1");
        assert_eq!(results[1].extra["ts"], "12345");
        assert_eq!(results[1].payload, Some(json!({"channel": "#ops"})));
        assert_eq!(results[2].extra["page_id"], "p_1");
        assert!(results[3].extra.is_empty());
    }

    #[tokio::test]
    async fn test_connections() {
        let router = StubToolRouter::new();
        assert!(router.manage_connections().await.unwrap().is_empty());

        let ack = router.connect("slack", Some("xoxb")).await.unwrap();
        assert_eq!(ack, json!({"status": "connected", "tool": "slack"}));
        router.connect("gmail", None).await.unwrap();
        assert!(matches!(
            router.connect(" ", None).await,
            Err(EngineError::ToolConnection(_))
        ));

        assert_eq!(
            router.manage_connections().await.unwrap(),
            vec!["gmail", "slack"]
        );
    }

    #[tokio::test]
    async fn test_search_and_invoke() {
        let router = StubToolRouter::new();
        assert_eq!(
            router.search("q").await.unwrap(),
            json!({"query": "q", "results": []})
        );
        assert_eq!(
            router.invoke("slack", "auth.test", json!({})).await.unwrap(),
            json!({"tool": "slack", "method": "auth.test", "payload": {}, "status": "ok"})
        );
    }
}

// Execution types
//
// A Step resolved to a concrete (tool, action, payload) dispatch unit, and
// the result recorded for it. The step -> (tool, action) table is a closed
// enum with an explicit fallback so unknown steps route to the generic tool.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::binder::{bind, Params};
use crate::plan::Step;

/// Tool used for step names outside the routing table
pub const GENERIC_TOOL: &str = "generic";

/// Known step kinds and the fallback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    FetchTasks,
    Summarize,
    Notify,
    FetchEmails,
    PersistSummary,
    /// Any other step name; dispatched to the generic tool with the step
    /// name as action
    Other(String),
}

impl StepKind {
    pub fn parse(step: &str) -> Self {
        match step {
            "fetch_tasks" => StepKind::FetchTasks,
            "summarize" => StepKind::Summarize,
            "notify" => StepKind::Notify,
            "fetch_emails" => StepKind::FetchEmails,
            "persist_summary" => StepKind::PersistSummary,
            other => StepKind::Other(other.to_string()),
        }
    }

    /// Tool identifier for this step kind
    pub fn tool(&self) -> &str {
        match self {
            StepKind::FetchTasks | StepKind::PersistSummary => "notion",
            StepKind::Summarize => "openai",
            StepKind::Notify => "slack",
            StepKind::FetchEmails => "gmail",
            StepKind::Other(_) => GENERIC_TOOL,
        }
    }

    /// Action identifier for this step kind
    pub fn action(&self) -> &str {
        match self {
            StepKind::FetchTasks => "fetch_tasks",
            StepKind::Summarize => "summarize",
            StepKind::Notify => "post_message",
            StepKind::FetchEmails => "fetch_messages",
            StepKind::PersistSummary => "create_summary_page",
            StepKind::Other(name) => name,
        }
    }
}

/// One dispatched unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub tool: String,
    pub action: String,
    pub payload: Value,
}

impl Execution {
    pub fn new(tool: impl Into<String>, action: impl Into<String>, payload: Value) -> Self {
        Self {
            tool: tool.into(),
            action: action.into(),
            payload,
        }
    }

    /// Derive the execution for a bound step. The payload is bound once
    /// more against `params`; on an already bound step this is a no-op.
    pub fn from_step(step: &Step, params: &Params) -> Self {
        let kind = StepKind::parse(&step.step);
        Self {
            tool: kind.tool().to_string(),
            action: kind.action().to_string(),
            payload: bind(&step.payload, params),
        }
    }
}

/// Outcome of one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Ok,
    Error,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::Ok => write!(f, "ok"),
            ExecutionStatus::Error => write!(f, "error"),
        }
    }
}

/// Result recorded for one execution.
///
/// Tool-specific fields (`ts`, `page_id`, `messages`, ...) are kept in
/// `extra` and serialized inline so the persisted log keeps the router's
/// shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub tool: String,
    pub action: String,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExecutionResult {
    /// Successful result echoing the dispatched payload
    pub fn ok(execution: &Execution) -> Self {
        Self {
            tool: execution.tool.clone(),
            action: execution.action.clone(),
            status: ExecutionStatus::Ok,
            payload: Some(execution.payload.clone()),
            error: None,
            extra: Map::new(),
        }
    }

    /// Terminal failure for an execution whose attempts were exhausted
    pub fn failed(execution: &Execution, error: impl Into<String>) -> Self {
        Self {
            tool: execution.tool.clone(),
            action: execution.action.clone(),
            status: ExecutionStatus::Error,
            payload: None,
            error: Some(error.into()),
            extra: Map::new(),
        }
    }

    /// Attach a tool-specific field
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == ExecutionStatus::Ok
    }
}

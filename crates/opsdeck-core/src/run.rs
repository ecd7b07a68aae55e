// Run record domain types
//
// A run record is opened (pending) before dispatch and closed exactly once
// with its final status and execution log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::binder::Params;
use crate::execution::ExecutionResult;

/// Lifecycle status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Success,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Success => "success",
            RunStatus::Error => "error",
        }
    }

    /// Aggregate status over a result set; vacuously success when empty
    pub fn from_results(results: &[ExecutionResult]) -> Self {
        if results.iter().all(ExecutionResult::is_ok) {
            RunStatus::Success
        } else {
            RunStatus::Error
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for RunStatus {
    /// Unrecognised stored values read as `Error`
    fn from(s: &str) -> Self {
        match s {
            "pending" => RunStatus::Pending,
            "success" => RunStatus::Success,
            _ => RunStatus::Error,
        }
    }
}

/// Persisted execution log: `{"executions": [...], "params": {...}}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunLog {
    #[serde(default)]
    pub executions: Vec<ExecutionResult>,
    #[serde(default)]
    pub params: Params,
}

impl RunLog {
    pub fn new(executions: Vec<ExecutionResult>, params: Params) -> Self {
        Self { executions, params }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Default::default()))
    }
}

/// Stored record of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct RunRecord {
    pub id: i64,
    pub workflow_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    /// Structured log when readable, otherwise the raw stored text as a
    /// JSON string
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub log: Value,
}

impl RunRecord {
    /// Parse a stored log text; unreadable text is kept verbatim
    pub fn parse_log(raw: &str) -> Value {
        serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
    }

    fn raw_executions(&self) -> &[Value] {
        self.log
            .get("executions")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Execution results from the log. Unreadable entries are skipped; an
    /// opaque log yields none.
    pub fn executions(&self) -> Vec<ExecutionResult> {
        self.raw_executions()
            .iter()
            .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
            .collect()
    }

    /// Tool of every logged execution whose status is not `"ok"`.
    ///
    /// Works on the raw entries, so a malformed entry still counts as a
    /// failure of its tool (`"unknown"` when the tool is missing).
    pub fn failed_tools(&self) -> Vec<&str> {
        self.raw_executions()
            .iter()
            .filter(|entry| entry.get("status").and_then(Value::as_str) != Some("ok"))
            .map(|entry| entry.get("tool").and_then(Value::as_str).unwrap_or("unknown"))
            .collect()
    }

    /// Wall time in seconds for finished runs
    pub fn duration_secs(&self) -> Option<f64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_milliseconds() as f64 / 1000.0)
    }

    /// Case-insensitive match on workflow name or status
    pub fn matches_text(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.workflow_name.to_lowercase().contains(&needle)
            || self.status.as_str().contains(&needle)
    }
}

/// Pagination and filter for run listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunQuery {
    pub limit: usize,
    pub offset: usize,
    /// Substring filter over workflow name or status
    pub text: Option<String>,
}

impl Default for RunQuery {
    fn default() -> Self {
        Self {
            limit: 20,
            offset: 0,
            text: None,
        }
    }
}

impl RunQuery {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Blank filters are ignored
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.text = if text.trim().is_empty() {
            None
        } else {
            Some(text)
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::Execution;
    use serde_json::json;

    fn record(status: RunStatus, log: Value) -> RunRecord {
        RunRecord {
            id: 1,
            workflow_name: "weekly_review".into(),
            started_at: Utc::now(),
            finished_at: None,
            status,
            log,
        }
    }

    #[test]
    fn test_status_from_results() {
        let exec = Execution::new("slack", "post_message", json!({}));
        assert_eq!(RunStatus::from_results(&[]), RunStatus::Success);
        assert_eq!(
            RunStatus::from_results(&[ExecutionResult::ok(&exec)]),
            RunStatus::Success
        );
        assert_eq!(
            RunStatus::from_results(&[
                ExecutionResult::ok(&exec),
                ExecutionResult::failed(&exec, "x")
            ]),
            RunStatus::Error
        );
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(RunStatus::from("pending"), RunStatus::Pending);
        assert_eq!(RunStatus::from("success"), RunStatus::Success);
        assert_eq!(RunStatus::from("garbage"), RunStatus::Error);
        assert_eq!(serde_json::to_value(RunStatus::Success).unwrap(), "success");
    }

    #[test]
    fn test_parse_log_opaque_fallback() {
        assert_eq!(
            RunRecord::parse_log(r#"{"executions":[],"params":{}}"#),
            json!({"executions": [], "params": {}})
        );
        assert_eq!(RunRecord::parse_log("not json"), json!("not json"));
    }

    #[test]
    fn test_log_shape_round_trips() {
        let exec = Execution::new("slack", "post_message", json!({"channel": "#ops"}));
        let log = RunLog::new(
            vec![ExecutionResult::ok(&exec).with_field("ts", json!("12345"))],
            Params::from([("channel".to_string(), "#ops".to_string())]),
        );
        let text = serde_json::to_string(&log).unwrap();
        let parsed = RunRecord::parse_log(&text);
        assert_eq!(
            parsed,
            json!({
                "executions": [{
                    "tool": "slack",
                    "action": "post_message",
                    "status": "ok",
                    "payload": {"channel": "#ops"},
                    "ts": "12345"
                }],
                "params": {"channel": "#ops"}
            })
        );
        assert_eq!(record(RunStatus::Success, parsed).executions(), log.executions);
    }

    #[test]
    fn test_executions_of_opaque_log_is_empty() {
        assert!(record(RunStatus::Error, json!("garbage")).executions().is_empty());
    }

    #[test]
    fn test_malformed_entry_keeps_the_rest() {
        let run = record(
            RunStatus::Error,
            json!({"executions": [
                {"tool": "notion", "action": "fetch_tasks", "status": "ok"},
                {"tool": "slack", "status": "failed"},
                {"status": "error"},
                "garbage",
                {"tool": "gmail", "action": "fetch_messages", "status": "error", "error": "down"}
            ]}),
        );

        let tools: Vec<_> = run.executions().into_iter().map(|e| e.tool).collect();
        assert_eq!(tools, vec!["notion", "gmail"]);
        assert_eq!(run.failed_tools(), vec!["slack", "unknown", "unknown", "gmail"]);
    }

    #[test]
    fn test_failed_tools_of_opaque_log_is_empty() {
        assert!(record(RunStatus::Error, json!("garbage")).failed_tools().is_empty());
        assert!(record(RunStatus::Error, json!({"executions": {}})).failed_tools().is_empty());
    }

    #[test]
    fn test_matches_text() {
        let run = record(RunStatus::Error, json!({}));
        assert!(run.matches_text("WEEKLY"));
        assert!(run.matches_text("err"));
        assert!(!run.matches_text("success"));
    }

    #[test]
    fn test_blank_text_filter_ignored() {
        assert_eq!(RunQuery::new(5).with_text("  ").text, None);
    }
}

// In-memory implementations for local runs and testing
//
// These implementations keep all data in memory:
// - The api server falls back to them when no database is configured
// - Unit and integration tests
// - Scripted routers and failing stores for exercising retry and
//   best-effort persistence paths

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::error::{EngineError, Result};
use crate::execution::{Execution, ExecutionResult};
use crate::plan::Plan;
use crate::router::{PlanRecord, StubToolRouter, ToolRouter};
use crate::run::{RunQuery, RunRecord, RunStatus};
use crate::task::{NewTask, Task, TaskStatus};
use crate::traits::{RunStore, TaskStore};

// ============================================================================
// InMemoryRunStore - Stores run records in memory
// ============================================================================

#[derive(Debug, Default)]
struct RunTable {
    last_id: i64,
    rows: BTreeMap<i64, RunRecord>,
}

/// In-memory run store
///
/// Ids are assigned from a counter starting at 1, like a BIGSERIAL column.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRunStore {
    table: Arc<RwLock<RunTable>>,
}

impl InMemoryRunStore {
    /// Create a new in-memory run store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored runs
    pub async fn len(&self) -> usize {
        self.table.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Insert a fully formed record, keeping its id (useful for testing)
    pub async fn seed(&self, record: RunRecord) {
        let mut table = self.table.write().await;
        table.last_id = table.last_id.max(record.id);
        table.rows.insert(record.id, record);
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn create_run(
        &self,
        workflow_name: &str,
        started_at: DateTime<Utc>,
        status: RunStatus,
    ) -> Result<i64> {
        let mut table = self.table.write().await;
        table.last_id += 1;
        let id = table.last_id;
        table.rows.insert(
            id,
            RunRecord {
                id,
                workflow_name: workflow_name.to_string(),
                started_at,
                finished_at: None,
                status,
                log: Value::Object(Default::default()),
            },
        );
        Ok(id)
    }

    async fn update_run(
        &self,
        run_id: i64,
        finished_at: DateTime<Utc>,
        status: RunStatus,
        log: &Value,
    ) -> Result<()> {
        let mut table = self.table.write().await;
        let record = table
            .rows
            .get_mut(&run_id)
            .ok_or_else(|| EngineError::store(format!("run {run_id} not found")))?;
        record.finished_at = Some(finished_at);
        record.status = status;
        record.log = log.clone();
        Ok(())
    }

    async fn list_runs(&self, query: &RunQuery) -> Result<Vec<RunRecord>> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .rev()
            .filter(|run| {
                query
                    .text
                    .as_deref()
                    .map_or(true, |needle| run.matches_text(needle))
            })
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn get_run(&self, run_id: i64) -> Result<Option<RunRecord>> {
        Ok(self.table.read().await.rows.get(&run_id).cloned())
    }
}

// ============================================================================
// InMemoryTaskStore - Stores tasks in memory
// ============================================================================

#[derive(Debug, Default)]
struct TaskTable {
    last_id: i64,
    rows: BTreeMap<i64, Task>,
}

/// In-memory task store
#[derive(Debug, Default, Clone)]
pub struct InMemoryTaskStore {
    table: Arc<RwLock<TaskTable>>,
}

impl InMemoryTaskStore {
    /// Create a new in-memory task store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully formed task, keeping its id and timestamps
    pub async fn seed(&self, task: Task) {
        let mut table = self.table.write().await;
        table.last_id = table.last_id.max(task.id);
        table.rows.insert(task.id, task);
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn add_task(&self, task: NewTask) -> Result<Task> {
        let mut table = self.table.write().await;
        table.last_id += 1;
        let now = Utc::now();
        let task = Task {
            id: table.last_id,
            source: task.source,
            title: task.title,
            description: task.description,
            owner: task.owner,
            status: TaskStatus::Open,
            metadata: task.metadata,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(task.id, task.clone());
        Ok(task)
    }

    async fn list_tasks(&self, status: Option<TaskStatus>) -> Result<Vec<Task>> {
        Ok(self
            .table
            .read()
            .await
            .rows
            .values()
            .filter(|task| status.map_or(true, |s| task.status == s))
            .cloned()
            .collect())
    }

    async fn get_task(&self, task_id: i64) -> Result<Option<Task>> {
        Ok(self.table.read().await.rows.get(&task_id).cloned())
    }

    async fn update_status(&self, task_id: i64, status: TaskStatus) -> Result<bool> {
        let mut table = self.table.write().await;
        match table.rows.get_mut(&task_id) {
            Some(task) => {
                task.status = status;
                task.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ============================================================================
// ScriptedToolRouter - Router with injectable failures
// ============================================================================

/// Router that fails on demand and records every batch it receives
///
/// Successful calls are answered by [`StubToolRouter`].
#[derive(Debug, Default)]
pub struct ScriptedToolRouter {
    inner: StubToolRouter,
    fail_remaining: AtomicU32,
    failing_tools: HashSet<String>,
    registered: AtomicUsize,
    calls: Mutex<Vec<Vec<Execution>>>,
}

impl ScriptedToolRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` execute_batch calls, whatever they contain
    pub fn fail_first(self, count: u32) -> Self {
        self.fail_remaining.store(count, Ordering::SeqCst);
        self
    }

    /// Fail every batch containing an execution for `tool`
    pub fn fail_tool(mut self, tool: impl Into<String>) -> Self {
        self.failing_tools.insert(tool.into());
        self
    }

    /// Every batch received, in call order
    pub async fn calls(&self) -> Vec<Vec<Execution>> {
        self.calls.lock().await.clone()
    }

    /// Number of execute_batch calls
    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    /// Number of register_plan calls
    pub fn registered_plans(&self) -> usize {
        self.registered.load(Ordering::SeqCst)
    }

    fn take_scripted_failure(&self) -> bool {
        self.fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ToolRouter for ScriptedToolRouter {
    async fn register_plan(&self, plan: &Plan) -> Result<PlanRecord> {
        self.registered.fetch_add(1, Ordering::SeqCst);
        self.inner.register_plan(plan).await
    }

    async fn execute_batch(&self, executions: &[Execution]) -> Result<Vec<ExecutionResult>> {
        self.calls.lock().await.push(executions.to_vec());

        if let Some(execution) = executions
            .iter()
            .find(|e| self.failing_tools.contains(&e.tool))
        {
            return Err(EngineError::execution(format!(
                "{} unavailable",
                execution.tool
            )));
        }
        if self.take_scripted_failure() {
            return Err(EngineError::execution("transient router failure"));
        }
        self.inner.execute_batch(executions).await
    }

    async fn search(&self, query: &str) -> Result<Value> {
        self.inner.search(query).await
    }

    async fn manage_connections(&self) -> Result<Vec<String>> {
        self.inner.manage_connections().await
    }

    async fn connect(&self, tool: &str, token: Option<&str>) -> Result<Value> {
        self.inner.connect(tool, token).await
    }

    async fn invoke(&self, tool: &str, method: &str, payload: Value) -> Result<Value> {
        self.inner.invoke(tool, method, payload).await
    }
}

// ============================================================================
// FailingRunStore - Run store whose writes fail
// ============================================================================

/// Run store that rejects writes
///
/// `FailingRunStore::new()` fails every call; `on_update()` accepts
/// creation and fails only the closing update.
#[derive(Debug, Default)]
pub struct FailingRunStore {
    inner: InMemoryRunStore,
    allow_create: bool,
}

impl FailingRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `create_run`, fail `update_run`
    pub fn on_update() -> Self {
        Self {
            inner: InMemoryRunStore::new(),
            allow_create: true,
        }
    }
}

#[async_trait]
impl RunStore for FailingRunStore {
    async fn create_run(
        &self,
        workflow_name: &str,
        started_at: DateTime<Utc>,
        status: RunStatus,
    ) -> Result<i64> {
        if self.allow_create {
            return self.inner.create_run(workflow_name, started_at, status).await;
        }
        Err(EngineError::store("database unavailable"))
    }

    async fn update_run(
        &self,
        _run_id: i64,
        _finished_at: DateTime<Utc>,
        _status: RunStatus,
        _log: &Value,
    ) -> Result<()> {
        Err(EngineError::store("database unavailable"))
    }

    async fn list_runs(&self, query: &RunQuery) -> Result<Vec<RunRecord>> {
        self.inner.list_runs(query).await
    }

    async fn get_run(&self, run_id: i64) -> Result<Option<RunRecord>> {
        self.inner.get_run(run_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_run_ids_start_at_one_and_list_newest_first() {
        let store = InMemoryRunStore::new();
        for name in ["a", "b", "c"] {
            store
                .create_run(name, Utc::now(), RunStatus::Pending)
                .await
                .unwrap();
        }

        let runs = store.list_runs(&RunQuery::new(10)).await.unwrap();
        let ids: Vec<_> = runs.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);

        let page = store
            .list_runs(&RunQuery::new(1).with_offset(1))
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, 2);
    }

    #[tokio::test]
    async fn test_update_run() {
        let store = InMemoryRunStore::new();
        let id = store
            .create_run("weekly_review", Utc::now(), RunStatus::Pending)
            .await
            .unwrap();
        let log = json!({"executions": [], "params": {}});

        store
            .update_run(id, Utc::now(), RunStatus::Success, &log)
            .await
            .unwrap();

        let run = store.get_run(id).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Success);
        assert!(run.finished_at.is_some());
        assert_eq!(run.log, log);
    }

    #[tokio::test]
    async fn test_update_missing_run_fails() {
        let store = InMemoryRunStore::new();
        let err = store
            .update_run(99, Utc::now(), RunStatus::Success, &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Store(_)));
    }

    #[tokio::test]
    async fn test_text_filter() {
        let store = InMemoryRunStore::new();
        store
            .create_run("weekly_review", Utc::now(), RunStatus::Pending)
            .await
            .unwrap();
        let id = store
            .create_run("escalation", Utc::now(), RunStatus::Pending)
            .await
            .unwrap();
        store
            .update_run(id, Utc::now(), RunStatus::Error, &json!({}))
            .await
            .unwrap();

        let by_name = store
            .list_runs(&RunQuery::new(10).with_text("Weekly"))
            .await
            .unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].workflow_name, "weekly_review");

        let by_status = store
            .list_runs(&RunQuery::new(10).with_text("error"))
            .await
            .unwrap();
        assert_eq!(by_status.len(), 1);
        assert_eq!(by_status[0].id, id);
    }

    #[tokio::test]
    async fn test_task_lifecycle() {
        let store = InMemoryTaskStore::new();
        let task = store
            .add_task(NewTask::new("notion", "Prepare review").with_owner("sam"))
            .await
            .unwrap();
        assert_eq!(task.id, 1);
        assert_eq!(task.status, TaskStatus::Open);

        assert!(store
            .update_status(task.id, TaskStatus::Done)
            .await
            .unwrap());
        assert!(!store.update_status(42, TaskStatus::Done).await.unwrap());

        let done = store.list_tasks(Some(TaskStatus::Done)).await.unwrap();
        assert_eq!(done.len(), 1);
        assert!(store
            .list_tasks(Some(TaskStatus::Open))
            .await
            .unwrap()
            .is_empty());
        assert_eq!(store.get_task(1).await.unwrap().unwrap().owner.as_deref(), Some("sam"));
        assert!(store.get_task(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scripted_router_fails_first_calls() {
        let router = ScriptedToolRouter::new().fail_first(1);
        let batch = [Execution::new("slack", "post_message", json!({}))];

        assert!(router.execute_batch(&batch).await.is_err());
        let results = router.execute_batch(&batch).await.unwrap();
        assert!(results[0].is_ok());
        assert_eq!(router.call_count().await, 2);
    }

    #[tokio::test]
    async fn test_failing_run_store_on_update() {
        let store = FailingRunStore::on_update();
        let id = store
            .create_run("x", Utc::now(), RunStatus::Pending)
            .await
            .unwrap();
        assert!(store
            .update_run(id, Utc::now(), RunStatus::Success, &json!({}))
            .await
            .is_err());
        assert!(FailingRunStore::new()
            .create_run("x", Utc::now(), RunStatus::Pending)
            .await
            .is_err());
    }
}

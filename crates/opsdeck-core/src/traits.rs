// Store traits for pluggable backends
//
// The engine and the analytics read-side depend on these traits only:
// - In-memory implementations for tests and local runs
// - Database implementations for production

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::Result;
use crate::run::{RunQuery, RunRecord, RunStatus};
use crate::task::{NewTask, Task, TaskStatus};

// ============================================================================
// RunStore - run lifecycle records
// ============================================================================

/// Trait for recording workflow runs
///
/// Each run row is created once and updated once; updates are scoped by
/// run id so concurrent runs never touch each other's rows.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Open a run record and return its id
    async fn create_run(
        &self,
        workflow_name: &str,
        started_at: DateTime<Utc>,
        status: RunStatus,
    ) -> Result<i64>;

    /// Close a run record with its final status and log
    async fn update_run(
        &self,
        run_id: i64,
        finished_at: DateTime<Utc>,
        status: RunStatus,
        log: &Value,
    ) -> Result<()>;

    /// List runs newest first (descending id)
    async fn list_runs(&self, query: &RunQuery) -> Result<Vec<RunRecord>>;

    /// Get a single run
    async fn get_run(&self, run_id: i64) -> Result<Option<RunRecord>>;
}

// ============================================================================
// TaskStore - tracked tasks
// ============================================================================

/// Trait for storing tasks
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Add a task with status `open`
    async fn add_task(&self, task: NewTask) -> Result<Task>;

    /// List tasks in id order, optionally filtered by status
    async fn list_tasks(&self, status: Option<TaskStatus>) -> Result<Vec<Task>>;

    /// Get a task by id
    async fn get_task(&self, task_id: i64) -> Result<Option<Task>>;

    /// Set a task's status. Returns false when the task does not exist.
    async fn update_status(&self, task_id: i64, status: TaskStatus) -> Result<bool>;
}

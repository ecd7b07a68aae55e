// Database-backed TaskStore implementation

use async_trait::async_trait;
use opsdeck_core::{traits::TaskStore, EngineError, NewTask, Result, Task, TaskStatus};
use serde_json::Value;

use crate::models::{CreateTask, TaskRow};
use crate::repositories::Database;

// ============================================================================
// DbTaskStore - Persists tasks to the database
// ============================================================================

/// Database-backed task store
#[derive(Clone)]
pub struct DbTaskStore {
    db: Database,
}

impl DbTaskStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn to_task(row: TaskRow) -> Result<Task> {
    let status: TaskStatus = row
        .status
        .parse()
        .map_err(|e: EngineError| EngineError::store(format!("task {}: {e}", row.id)))?;
    let metadata = match row.metadata {
        Value::Object(map) => map,
        _ => Default::default(),
    };

    Ok(Task {
        id: row.id,
        source: row.source,
        title: row.title,
        description: row.description,
        owner: row.owner,
        status,
        metadata,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

#[async_trait]
impl TaskStore for DbTaskStore {
    async fn add_task(&self, task: NewTask) -> Result<Task> {
        let row = self
            .db
            .create_task(CreateTask {
                source: task.source,
                title: task.title,
                description: task.description,
                owner: task.owner,
                metadata: Value::Object(task.metadata),
            })
            .await
            .map_err(|e| EngineError::store(e.to_string()))?;

        to_task(row)
    }

    async fn list_tasks(&self, status: Option<TaskStatus>) -> Result<Vec<Task>> {
        let rows = self
            .db
            .list_tasks(status.as_ref().map(TaskStatus::as_str))
            .await
            .map_err(|e| EngineError::store(e.to_string()))?;

        rows.into_iter().map(to_task).collect()
    }

    async fn get_task(&self, task_id: i64) -> Result<Option<Task>> {
        let row = self
            .db
            .get_task(task_id)
            .await
            .map_err(|e| EngineError::store(e.to_string()))?;

        row.map(to_task).transpose()
    }

    async fn update_status(&self, task_id: i64, status: TaskStatus) -> Result<bool> {
        self.db
            .update_task_status(task_id, status.as_str())
            .await
            .map_err(|e| EngineError::store(e.to_string()))
    }
}

// ============================================================================
// Factory functions
// ============================================================================

/// Create a database-backed task store
pub fn create_db_task_store(db: Database) -> DbTaskStore {
    DbTaskStore::new(db)
}

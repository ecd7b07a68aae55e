// Database-backed RunStore implementation
//
// Run logs are written as JSON text and parsed on read; a log that no
// longer parses is returned as an opaque string instead of failing the
// listing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opsdeck_core::{
    traits::RunStore, EngineError, Result, RunQuery, RunRecord, RunStatus,
};
use serde_json::Value;

use crate::models::{CreateWorkflowRun, FinishWorkflowRun, WorkflowRunRow};
use crate::repositories::Database;

// ============================================================================
// DbRunStore - Persists run records to the database
// ============================================================================

/// Database-backed run store
///
/// Every update is scoped by run id, so concurrent runs rely only on row
/// level atomicity.
#[derive(Clone)]
pub struct DbRunStore {
    db: Database,
}

impl DbRunStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn to_record(row: WorkflowRunRow) -> RunRecord {
    RunRecord {
        id: row.id,
        workflow_name: row.workflow_name,
        started_at: row.started_at,
        finished_at: row.finished_at,
        status: RunStatus::from(row.status.as_str()),
        log: RunRecord::parse_log(&row.log),
    }
}

#[async_trait]
impl RunStore for DbRunStore {
    async fn create_run(
        &self,
        workflow_name: &str,
        started_at: DateTime<Utc>,
        status: RunStatus,
    ) -> Result<i64> {
        self.db
            .create_workflow_run(CreateWorkflowRun {
                workflow_name: workflow_name.to_string(),
                started_at,
                status: status.as_str().to_string(),
            })
            .await
            .map_err(|e| EngineError::store(e.to_string()))
    }

    async fn update_run(
        &self,
        run_id: i64,
        finished_at: DateTime<Utc>,
        status: RunStatus,
        log: &Value,
    ) -> Result<()> {
        let log = serde_json::to_string(log).map_err(|e| EngineError::store(e.to_string()))?;
        let updated = self
            .db
            .finish_workflow_run(
                run_id,
                FinishWorkflowRun {
                    finished_at,
                    status: status.as_str().to_string(),
                    log,
                },
            )
            .await
            .map_err(|e| EngineError::store(e.to_string()))?;

        if !updated {
            return Err(EngineError::store(format!("run {run_id} not found")));
        }
        Ok(())
    }

    async fn list_runs(&self, query: &RunQuery) -> Result<Vec<RunRecord>> {
        let rows = self
            .db
            .list_workflow_runs(
                i64::try_from(query.limit).unwrap_or(i64::MAX),
                i64::try_from(query.offset).unwrap_or(i64::MAX),
                query.text.as_deref(),
            )
            .await
            .map_err(|e| EngineError::store(e.to_string()))?;

        Ok(rows.into_iter().map(to_record).collect())
    }

    async fn get_run(&self, run_id: i64) -> Result<Option<RunRecord>> {
        let row = self
            .db
            .get_workflow_run(run_id)
            .await
            .map_err(|e| EngineError::store(e.to_string()))?;

        Ok(row.map(to_record))
    }
}

// ============================================================================
// Factory functions
// ============================================================================

/// Create a database-backed run store
pub fn create_db_run_store(db: Database) -> DbRunStore {
    DbRunStore::new(db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(status: &str, log: &str) -> WorkflowRunRow {
        WorkflowRunRow {
            id: 7,
            workflow_name: "weekly_review".into(),
            started_at: Utc::now(),
            finished_at: None,
            status: status.into(),
            log: log.into(),
        }
    }

    #[test]
    fn test_row_with_readable_log() {
        let record = to_record(row("success", r#"{"executions":[],"params":{"a":"b"}}"#));
        assert_eq!(record.id, 7);
        assert_eq!(record.status, RunStatus::Success);
        assert_eq!(record.log, json!({"executions": [], "params": {"a": "b"}}));
    }

    #[test]
    fn test_row_with_unreadable_log() {
        let record = to_record(row("error", "{broken"));
        assert_eq!(record.status, RunStatus::Error);
        assert_eq!(record.log, json!("{broken"));
    }
}

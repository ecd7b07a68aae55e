// Repository layer for database operations

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::*;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create database connection from URL
    pub async fn from_url(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply embedded migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    // ============================================
    // Workflow runs
    // ============================================

    pub async fn create_workflow_run(&self, input: CreateWorkflowRun) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO workflow_runs (workflow_name, started_at, finished_at, status, log)
            VALUES ($1, $2, NULL, $3, '{}')
            RETURNING id
            "#,
        )
        .bind(&input.workflow_name)
        .bind(input.started_at)
        .bind(&input.status)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Close a run. Returns false when no row has this id.
    pub async fn finish_workflow_run(&self, id: i64, input: FinishWorkflowRun) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_runs
            SET finished_at = $2, status = $3, log = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(input.finished_at)
        .bind(&input.status)
        .bind(&input.log)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List runs newest first, optionally filtered by a case-insensitive
    /// substring of workflow name or status
    pub async fn list_workflow_runs(
        &self,
        limit: i64,
        offset: i64,
        text: Option<&str>,
    ) -> Result<Vec<WorkflowRunRow>> {
        let rows = sqlx::query_as::<_, WorkflowRunRow>(
            r#"
            SELECT id, workflow_name, started_at, finished_at, status, log
            FROM workflow_runs
            WHERE $1::TEXT IS NULL
               OR workflow_name ILIKE '%' || $1 || '%' ESCAPE '\'
               OR status ILIKE '%' || $1 || '%' ESCAPE '\'
            ORDER BY id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(text.map(escape_like))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn get_workflow_run(&self, id: i64) -> Result<Option<WorkflowRunRow>> {
        let row = sqlx::query_as::<_, WorkflowRunRow>(
            r#"
            SELECT id, workflow_name, started_at, finished_at, status, log
            FROM workflow_runs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    // ============================================
    // Tasks
    // ============================================

    pub async fn create_task(&self, input: CreateTask) -> Result<TaskRow> {
        let row = sqlx::query_as::<_, TaskRow>(
            r#"
            INSERT INTO tasks (source, title, description, owner, status, metadata)
            VALUES ($1, $2, $3, $4, 'open', $5)
            RETURNING id, source, title, description, owner, status, metadata, created_at, updated_at
            "#,
        )
        .bind(&input.source)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.owner)
        .bind(&input.metadata)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn list_tasks(&self, status: Option<&str>) -> Result<Vec<TaskRow>> {
        let rows = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT id, source, title, description, owner, status, metadata, created_at, updated_at
            FROM tasks
            WHERE $1::TEXT IS NULL OR status = $1
            ORDER BY id ASC
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn get_task(&self, id: i64) -> Result<Option<TaskRow>> {
        let row = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT id, source, title, description, owner, status, metadata, created_at, updated_at
            FROM tasks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Set a task's status. Returns false when no row has this id.
    pub async fn update_task_status(&self, id: i64, status: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Escape LIKE metacharacters so the text matches literally
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("weekly"), "weekly");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("weekly_review"), "weekly\\_review");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }
}

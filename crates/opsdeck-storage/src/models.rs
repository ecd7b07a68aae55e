// Database models (internal, may differ from public DTOs)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================
// Workflow runs
// ============================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WorkflowRunRow {
    pub id: i64,
    pub workflow_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: String,
    /// Raw log text, normally `{"executions": [...], "params": {...}}`
    pub log: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorkflowRun {
    pub workflow_name: String,
    pub started_at: DateTime<Utc>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishWorkflowRun {
    pub finished_at: DateTime<Utc>,
    pub status: String,
    pub log: String,
}

// ============================================
// Tasks
// ============================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TaskRow {
    pub id: i64,
    pub source: String,
    pub title: String,
    pub description: Option<String>,
    pub owner: Option<String>,
    pub status: String,
    pub metadata: sqlx::types::JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTask {
    pub source: String,
    pub title: String,
    pub description: Option<String>,
    pub owner: Option<String>,
    pub metadata: sqlx::types::JsonValue,
}

// Postgres storage layer with sqlx
//
// This crate provides database implementations for core traits:
// - DbRunStore: implements RunStore for workflow run records
// - DbTaskStore: implements TaskStore for tracked tasks

pub mod models;
pub mod repositories;
pub mod run_store;
pub mod task_store;

pub use models::*;
pub use repositories::*;
pub use run_store::{create_db_run_store, DbRunStore};
pub use task_store::{create_db_task_store, DbTaskStore};

// Workflow Execution Core
//
// This crate provides a DB-agnostic implementation of the workflow engine
// (plan template -> bound plan -> tool dispatch with retry -> run record).
//
// Key design decisions:
// - Uses traits (ToolRouter, RunStore, TaskStore) for pluggable backends
// - Step names map to (tool, action) through a closed StepKind enum
// - Store writes made by the engine are best-effort; the returned summary is authoritative
// - Retry backoff suspends only the current run (tokio timer)
// - Configuration via EngineConfig, built by the host process
// - Domain entity types (RunRecord, Task) are defined here for API and storage

pub mod binder;
pub mod config;
pub mod error;
pub mod execution;
pub mod plan;
pub mod registry;
pub mod retry;
pub mod router;
pub mod run;
pub mod task;
pub mod traits;

pub mod engine;

// Read-side reporting over runs and tasks
pub mod analytics;

// In-memory implementations for local runs and testing
pub mod memory;

// Re-exports for convenience
pub use binder::{bind, params_from_json, Params};
pub use config::EngineConfig;
pub use engine::{RunSummary, WorkflowEngine};
pub use error::{EngineError, Result};
pub use execution::{Execution, ExecutionResult, ExecutionStatus, StepKind};
pub use plan::{Plan, Step};
pub use registry::PlanRegistry;
pub use retry::RetryPolicy;
pub use router::{PlanRecord, StubToolRouter, ToolRouter};
pub use run::{RunLog, RunQuery, RunRecord, RunStatus};
pub use task::{NewTask, Task, TaskStatus};
pub use traits::{RunStore, TaskStore};

// Error types for the workflow engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while planning, dispatching or persisting a run
#[derive(Debug, Error)]
pub enum EngineError {
    /// Workflow name is not registered
    #[error("workflow not found: {0}")]
    UnknownWorkflow(String),

    /// Plan template is structurally invalid
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// A tool router batch call failed (transient, retried by the engine)
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// Run or task store error
    #[error("store error: {0}")]
    Store(String),

    /// Caller input rejected (bad status value, bad date range)
    #[error("invalid input: {0}")]
    Validation(String),

    /// Tool connection could not be established
    #[error("tool connection error: {0}")]
    ToolConnection(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl EngineError {
    /// Create an unknown workflow error
    pub fn unknown_workflow(name: impl Into<String>) -> Self {
        EngineError::UnknownWorkflow(name.into())
    }

    /// Create an invalid plan error
    pub fn invalid_plan(msg: impl Into<String>) -> Self {
        EngineError::InvalidPlan(msg.into())
    }

    /// Create an execution failure
    pub fn execution(msg: impl Into<String>) -> Self {
        EngineError::ExecutionFailed(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        EngineError::Store(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    /// Create a tool connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        EngineError::ToolConnection(msg.into())
    }

    /// True for errors raised before any side effect (caller errors)
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            EngineError::UnknownWorkflow(_)
                | EngineError::InvalidPlan(_)
                | EngineError::Validation(_)
        )
    }
}

// Shared handler helpers
//
// Maps engine errors onto HTTP status codes so every route reports caller
// mistakes the same way.

use axum::http::StatusCode;
use opsdeck_core::EngineError;

/// HTTP status for an engine error
pub fn status_for(error: &EngineError) -> StatusCode {
    match error {
        EngineError::UnknownWorkflow(_) => StatusCode::NOT_FOUND,
        EngineError::InvalidPlan(_) | EngineError::Validation(_) => StatusCode::BAD_REQUEST,
        EngineError::ToolConnection(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Log an engine error and convert it to a status code
pub fn log_error(context: &'static str) -> impl Fn(EngineError) -> StatusCode {
    move |e| {
        if e.is_caller_error() {
            tracing::debug!("Rejected {}: {}", context, e);
        } else {
            tracing::error!("Failed to {}: {}", context, e);
        }
        status_for(&e)
    }
}

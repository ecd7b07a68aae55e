// Engine configuration
//
// EngineConfig is built once by the host process and handed to the engine
// constructor. Nothing in the core reads the environment.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Configuration for the workflow engine
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    /// Per-step retry policy
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the attempt budget per step
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.retry = self.retry.with_max_attempts(max_attempts);
        self
    }

    /// Set the backoff unit
    pub fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
        self.retry = self.retry.with_backoff_base(backoff_base);
        self
    }
}

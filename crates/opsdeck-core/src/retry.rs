//! Retry policy for step dispatch

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounded retry with linear backoff.
///
/// The delay before attempt `n` (1-based) is `backoff_base * (n - 1)`, so
/// with the defaults the engine waits 0.5s before attempt 2 and 1.0s
/// before attempt 3.
///
/// # Example
///
/// ```
/// use opsdeck_core::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.delay_before_attempt(2), Duration::from_millis(500));
/// assert_eq!(policy.delay_before_attempt(3), Duration::from_millis(1000));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first)
    pub max_attempts: u32,

    /// Base backoff unit
    #[serde(with = "duration_millis")]
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Create a policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff_base: Duration::ZERO,
        }
    }

    /// Set the maximum number of attempts (at least 1)
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the backoff unit
    pub fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = backoff_base;
        self
    }

    /// Delay to wait before the given attempt (1-based). Zero for the first.
    pub fn delay_before_attempt(&self, attempt: u32) -> Duration {
        self.backoff_base * attempt.saturating_sub(1)
    }

    /// Check if another attempt is allowed after `attempt` failed
    pub fn has_attempts_remaining(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Sum of all backoff delays when every attempt fails
    pub fn total_backoff(&self) -> Duration {
        (2..=self.max_attempts)
            .map(|attempt| self.delay_before_attempt(attempt))
            .sum()
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_before_attempt(1), Duration::ZERO);
        assert_eq!(policy.delay_before_attempt(2), Duration::from_millis(500));
        assert_eq!(policy.delay_before_attempt(3), Duration::from_millis(1000));
        assert_eq!(policy.total_backoff(), Duration::from_millis(1500));
    }

    #[test]
    fn test_attempts_remaining() {
        let policy = RetryPolicy::default();
        assert!(policy.has_attempts_remaining(1));
        assert!(policy.has_attempts_remaining(2));
        assert!(!policy.has_attempts_remaining(3));
    }

    #[test]
    fn test_no_retry() {
        let policy = RetryPolicy::no_retry();
        assert!(!policy.has_attempts_remaining(1));
        assert_eq!(policy.total_backoff(), Duration::ZERO);
    }

    #[test]
    fn test_max_attempts_floor() {
        let policy = RetryPolicy::default().with_max_attempts(0);
        assert_eq!(policy.max_attempts, 1);
    }

    #[test]
    fn test_serde_millis() {
        let policy = RetryPolicy::default().with_backoff_base(Duration::from_millis(250));
        let json = serde_json::to_value(&policy).unwrap();
        assert_eq!(json["backoff_base"], 250);
        let back: RetryPolicy = serde_json::from_value(json).unwrap();
        assert_eq!(back, policy);
    }
}

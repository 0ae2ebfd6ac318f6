//! Per-breaker configuration.

use std::time::Duration;

use crate::config::WardenConfig;
use crate::constants;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit (comparison is `>=`).
    pub failure_threshold: u32,
    /// How long an open circuit waits before a call may probe recovery.
    pub timeout: Duration,
    /// Consecutive half-open successes required to close.
    pub half_open_attempts: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: constants::DEFAULT_FAILURE_THRESHOLD,
            timeout: Duration::from_secs(constants::DEFAULT_TIMEOUT_SECONDS),
            half_open_attempts: constants::DEFAULT_HALF_OPEN_ATTEMPTS,
        }
    }
}

impl From<&WardenConfig> for CircuitBreakerConfig {
    fn from(config: &WardenConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            timeout: Duration::from_secs(config.timeout_seconds),
            half_open_attempts: config.half_open_attempts,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn timeout_seconds(&self) -> u64 {
        self.timeout.as_secs()
    }
}

//! Environment-driven configuration for the warden core.
//!
//! Per-breaker and per-pool settings default from these global values; a
//! caller can still override them instance by instance.

use crate::constants;
use crate::error::{Result, WardenError};

#[derive(Debug, Clone)]
pub struct WardenConfig {
    /// Consecutive failures before a breaker opens.
    pub failure_threshold: u32,
    /// Seconds before an open breaker becomes eligible for half-open.
    pub timeout_seconds: u64,
    /// Half-open successes required to close.
    pub half_open_attempts: u32,
    /// Memory ceiling for the default worker health check, in MB.
    pub worker_memory_limit_mb: u64,
    /// Database URL for the durable breaker store and lock table, if used.
    pub database_url: Option<String>,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            failure_threshold: constants::DEFAULT_FAILURE_THRESHOLD,
            timeout_seconds: constants::DEFAULT_TIMEOUT_SECONDS,
            half_open_attempts: constants::DEFAULT_HALF_OPEN_ATTEMPTS,
            worker_memory_limit_mb: constants::DEFAULT_WORKER_MEMORY_LIMIT_MB,
            database_url: None,
        }
    }
}

impl WardenConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = Some(url);
        }

        if let Ok(threshold) = std::env::var("WARDEN_FAILURE_THRESHOLD") {
            config.failure_threshold = threshold.parse().map_err(|e| {
                WardenError::Configuration(format!("Invalid failure_threshold: {e}"))
            })?;
        }

        if let Ok(timeout) = std::env::var("WARDEN_BREAKER_TIMEOUT_SECONDS") {
            config.timeout_seconds = timeout.parse().map_err(|e| {
                WardenError::Configuration(format!("Invalid timeout_seconds: {e}"))
            })?;
        }

        if let Ok(attempts) = std::env::var("WARDEN_HALF_OPEN_ATTEMPTS") {
            config.half_open_attempts = attempts.parse().map_err(|e| {
                WardenError::Configuration(format!("Invalid half_open_attempts: {e}"))
            })?;
        }

        if let Ok(limit) = std::env::var("WARDEN_WORKER_MEMORY_LIMIT_MB") {
            config.worker_memory_limit_mb = limit.parse().map_err(|e| {
                WardenError::Configuration(format!("Invalid worker_memory_limit_mb: {e}"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.failure_threshold == 0 {
            return Err(WardenError::Configuration(
                "failure_threshold must be at least 1".to_string(),
            ));
        }
        if self.half_open_attempts == 0 {
            return Err(WardenError::Configuration(
                "half_open_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

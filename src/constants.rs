//! # System Constants
//!
//! Defaults and fixed operational boundaries for circuit breakers and
//! worker pool supervision. Anything a deployment may tune lives in
//! [`crate::config::WardenConfig`]; anything fixed by design lives here.

use std::time::Duration;

/// Circuit breaker lifecycle events published through the event sink.
pub mod events {
    pub const CIRCUIT_OPENED: &str = "circuit_breaker.opened";
    pub const CIRCUIT_HALF_OPENED: &str = "circuit_breaker.half_opened";
    pub const CIRCUIT_CLOSED: &str = "circuit_breaker.closed";
}

/// Consecutive failures required before a breaker opens.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Seconds an open breaker waits before a call may probe recovery.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

/// Consecutive half-open successes required to close a breaker.
pub const DEFAULT_HALF_OPEN_ATTEMPTS: u32 = 3;

/// Prefix for the named lock guarding each breaker's durable record.
pub const BREAKER_LOCK_PREFIX: &str = "circuit-breaker:";

/// How long a mutating breaker call blocks for the lock before failing loudly.
pub const LOCK_WAIT: Duration = Duration::from_secs(5);

/// Lease lifetime; expiry reclaims locks abandoned by a dead process.
pub const LOCK_TTL: Duration = Duration::from_secs(10);

/// Default per-worker memory ceiling used by the built-in health check.
pub const DEFAULT_WORKER_MEMORY_LIMIT_MB: u64 = 512;

/// Interval between supervision ticks. Fixed by design, not configurable.
pub const SUPERVISION_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Build the lock key for a service's breaker record.
pub fn breaker_lock_key(service_name: &str) -> String {
    format!("{BREAKER_LOCK_PREFIX}{service_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_key_carries_prefix_and_service() {
        assert_eq!(breaker_lock_key("payment-api"), "circuit-breaker:payment-api");
    }
}

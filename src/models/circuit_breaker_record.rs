//! Durable circuit breaker record, one row per protected service.
//!
//! The record is created lazily on first access, never deleted by the
//! breaker, and mutated only inside a held lock (see `locking`).
//! Invariant: `state == Open` exactly when `opened_at` is set; entering any
//! other state clears it. The transition helpers here are the only mutation
//! paths, so the invariant cannot drift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operational state of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, calls pass through.
    Closed,
    /// Failing fast, calls are rejected without executing.
    Open,
    /// Testing recovery with a limited number of trial calls.
    HalfOpen,
}

impl CircuitState {
    /// Stable wire/storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "closed" => Some(CircuitState::Closed),
            "open" => Some(CircuitState::Open),
            "half_open" => Some(CircuitState::HalfOpen),
            _ => None,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable per-service breaker state, shared by every process calling the
/// same dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerRecord {
    pub service_name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
}

impl CircuitBreakerRecord {
    /// Fresh record for a service seen for the first time.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_at: None,
            last_success_at: None,
            opened_at: None,
        }
    }

    /// Transition into Open, stamping `opened_at`.
    pub fn transition_to_open(&mut self, now: DateTime<Utc>) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
    }

    /// Transition into HalfOpen, resetting both counters for the probe run.
    pub fn transition_to_half_open(&mut self) {
        self.state = CircuitState::HalfOpen;
        self.failure_count = 0;
        self.success_count = 0;
        self.opened_at = None;
    }

    /// Transition into Closed, clearing counters and `opened_at`.
    pub fn transition_to_closed(&mut self) {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.success_count = 0;
        self.opened_at = None;
    }

    /// Whether an Open breaker has aged past its timeout and may probe.
    pub fn timeout_elapsed(&self, now: DateTime<Utc>, timeout_seconds: u64) -> bool {
        match self.opened_at {
            Some(opened_at) => {
                now.signed_duration_since(opened_at)
                    >= chrono::Duration::seconds(timeout_seconds as i64)
            }
            // Open with no timestamp should not happen; treat as eligible
            // so the breaker can recover rather than stay wedged.
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_starts_closed() {
        let record = CircuitBreakerRecord::new("payment-api");
        assert_eq!(record.state, CircuitState::Closed);
        assert_eq!(record.failure_count, 0);
        assert!(record.opened_at.is_none());
    }

    #[test]
    fn open_sets_timestamp_and_other_states_clear_it() {
        let now = Utc::now();
        let mut record = CircuitBreakerRecord::new("payment-api");

        record.transition_to_open(now);
        assert_eq!(record.state, CircuitState::Open);
        assert_eq!(record.opened_at, Some(now));

        record.transition_to_half_open();
        assert!(record.opened_at.is_none());

        record.transition_to_open(now);
        record.transition_to_closed();
        assert!(record.opened_at.is_none());
        assert_eq!(record.failure_count, 0);
        assert_eq!(record.success_count, 0);
    }

    #[test]
    fn timeout_boundary() {
        let opened = Utc::now();
        let mut record = CircuitBreakerRecord::new("payment-api");
        record.transition_to_open(opened);

        let just_before = opened + chrono::Duration::seconds(59);
        let at_boundary = opened + chrono::Duration::seconds(60);
        assert!(!record.timeout_elapsed(just_before, 60));
        assert!(record.timeout_elapsed(at_boundary, 60));
    }

    #[test]
    fn state_round_trips_through_storage_repr() {
        for state in [CircuitState::Closed, CircuitState::Open, CircuitState::HalfOpen] {
            assert_eq!(CircuitState::parse(state.as_str()), Some(state));
        }
        assert_eq!(CircuitState::parse("bogus"), None);
    }
}

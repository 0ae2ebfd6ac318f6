//! Injectable wall-clock.
//!
//! Open → HalfOpen eligibility is a pure function of "now", so the breaker
//! takes its clock as a dependency and tests can cross the timeout boundary
//! without sleeping. Production code uses [`SystemClock`]; tests use
//! [`crate::test_helpers::ManualClock`].

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock backed by `chrono::Utc::now`.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

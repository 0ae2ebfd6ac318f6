//! Property tests for the breaker's threshold arithmetic.

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use warden_core::clock::SystemClock;
use warden_core::events::EventPublisher;
use warden_core::locking::InProcessLockService;
use warden_core::resilience::{CircuitBreaker, CircuitBreakerConfig};
use warden_core::storage::InMemoryCircuitBreakerStore;

fn breaker(threshold: u32) -> CircuitBreaker {
    CircuitBreaker::new(
        "flaky-api",
        CircuitBreakerConfig {
            failure_threshold: threshold,
            timeout: Duration::from_secs(60),
            half_open_attempts: 3,
        },
        Arc::new(InMemoryCircuitBreakerStore::new()),
        Arc::new(InProcessLockService::new()),
        EventPublisher::new(16),
        Arc::new(SystemClock),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Exactly `threshold` consecutive failures open the circuit, and
    /// `threshold - 1` never do.
    #[test]
    fn threshold_boundary_is_exact(threshold in 1u32..16) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let breaker = breaker(threshold);

            for _ in 0..threshold - 1 {
                breaker.record_failure("connection refused").await.unwrap();
            }
            prop_assert!(breaker.is_closed().await.unwrap());

            breaker.record_failure("connection refused").await.unwrap();
            prop_assert!(breaker.is_open().await.unwrap());
            Ok(())
        })?;
    }

    /// A success anywhere in the run resets failure progress completely.
    #[test]
    fn intervening_success_resets_progress(threshold in 2u32..16) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let breaker = breaker(threshold);

            for _ in 0..threshold - 1 {
                breaker.record_failure("connection refused").await.unwrap();
            }
            breaker.record_success().await.unwrap();
            for _ in 0..threshold - 1 {
                breaker.record_failure("connection refused").await.unwrap();
            }
            prop_assert!(breaker.is_closed().await.unwrap());
            Ok(())
        })?;
    }
}

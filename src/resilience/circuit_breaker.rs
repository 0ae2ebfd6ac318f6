//! # Circuit Breaker Implementation
//!
//! Per-service breaker with three states: Closed (normal operation), Open
//! (failing fast), and HalfOpen (testing recovery). State lives in a durable
//! store shared by every process calling the same dependency; mutation
//! happens only under the service's named lock.
//!
//! `call()` is deliberately not atomic end-to-end: the gate check and the
//! wrapped operation run outside the lock, so two callers can both pass a
//! HalfOpen gate before either records its outcome. The breaker is an
//! advisory throttle, not a mutex on the protected resource.

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::constants::{breaker_lock_key, LOCK_TTL, LOCK_WAIT};
use crate::error::{Result, WardenError};
use crate::events::{CircuitBreakerEvent, CircuitEventKind, EventPublisher};
use crate::locking::{with_lock, LockService};
use crate::models::{CircuitBreakerRecord, CircuitState};
use crate::storage::CircuitBreakerStore;

use super::config::CircuitBreakerConfig;

/// Errors surfaced by breaker-protected calls.
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open; the wrapped operation was never executed.
    #[error("Circuit breaker is open for {service}")]
    CircuitOpen { service: String },

    /// The wrapped operation failed; the original error is preserved.
    #[error("Operation failed: {0}")]
    OperationFailed(E),

    /// Storage or lock failure while gating/recording. Never swallowed:
    /// skipping a record could corrupt threshold accounting.
    #[error(transparent)]
    Internal(#[from] WardenError),
}

/// Circuit breaker for one named service.
///
/// Cheap to clone via the registry; all shared state lives behind the
/// store and lock service.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    service_name: String,
    config: CircuitBreakerConfig,
    store: Arc<dyn CircuitBreakerStore>,
    locks: Arc<dyn LockService>,
    events: EventPublisher,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    pub fn new(
        service_name: impl Into<String>,
        config: CircuitBreakerConfig,
        store: Arc<dyn CircuitBreakerStore>,
        locks: Arc<dyn LockService>,
        events: EventPublisher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let service_name = service_name.into();
        info!(
            service = %service_name,
            failure_threshold = config.failure_threshold,
            timeout_seconds = config.timeout_seconds(),
            half_open_attempts = config.half_open_attempts,
            "circuit breaker initialized"
        );
        Self {
            service_name,
            config,
            store,
            locks,
            events,
            clock,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Publisher this breaker emits lifecycle events through.
    pub fn events(&self) -> &EventPublisher {
        &self.events
    }

    /// Execute an operation behind the breaker.
    ///
    /// An expired Open circuit is opportunistically moved to HalfOpen first.
    /// A circuit still Open fails fast with [`CircuitBreakerError::CircuitOpen`]
    /// and the operation never runs. Otherwise the operation executes, its
    /// outcome is recorded, and its own result comes back with the original
    /// error untouched inside `OperationFailed`.
    pub async fn call<F, T, E, Fut>(&self, operation: F) -> std::result::Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: std::fmt::Display,
    {
        self.transition_to_half_open_if_expired().await?;

        let record = self.current_record().await?;
        if record.state == CircuitState::Open {
            debug!(service = %self.service_name, "circuit open, rejecting call");
            return Err(CircuitBreakerError::CircuitOpen {
                service: self.service_name.clone(),
            });
        }

        match operation().await {
            Ok(value) => {
                self.record_success().await?;
                Ok(value)
            }
            Err(err) => {
                self.record_failure(&err).await?;
                Err(CircuitBreakerError::OperationFailed(err))
            }
        }
    }

    /// Current state after syncing with the durable store.
    pub async fn state(&self) -> Result<CircuitState> {
        Ok(self.current_record().await?.state)
    }

    pub async fn is_open(&self) -> Result<bool> {
        Ok(self.state().await? == CircuitState::Open)
    }

    pub async fn is_half_open(&self) -> Result<bool> {
        Ok(self.state().await? == CircuitState::HalfOpen)
    }

    pub async fn is_closed(&self) -> Result<bool> {
        Ok(self.state().await? == CircuitState::Closed)
    }

    /// Force the circuit open, bypassing thresholds. Manual intervention
    /// for a dependency known to be down.
    pub async fn open(&self) -> Result<()> {
        self.mutate(|record, now| {
            record.transition_to_open(now);
            warn!(service = %record.service_name, "circuit breaker forced open");
            Some((CircuitEventKind::Opened, Some(record.failure_count)))
        })
        .await
    }

    /// Force the circuit closed, resetting counters and `opened_at`.
    pub async fn close(&self) -> Result<()> {
        self.mutate(|record, _now| {
            record.transition_to_closed();
            info!(service = %record.service_name, "circuit breaker forced closed");
            Some((CircuitEventKind::Closed, None))
        })
        .await
    }

    /// Record a successful outcome without routing execution through `call`.
    pub async fn record_success(&self) -> Result<()> {
        let half_open_attempts = self.config.half_open_attempts;
        self.mutate(move |record, now| {
            record.last_success_at = Some(now);
            match record.state {
                CircuitState::Closed => {
                    record.success_count += 1;
                    record.failure_count = 0;
                    None
                }
                CircuitState::HalfOpen => {
                    record.success_count += 1;
                    record.failure_count = 0;
                    if record.success_count >= half_open_attempts {
                        record.transition_to_closed();
                        info!(service = %record.service_name, "circuit breaker closed (recovered)");
                        Some((CircuitEventKind::Closed, None))
                    } else {
                        debug!(
                            service = %record.service_name,
                            successes = record.success_count,
                            required = half_open_attempts,
                            "half-open probe succeeded"
                        );
                        None
                    }
                }
                CircuitState::Open => {
                    warn!(service = %record.service_name, "success recorded while circuit open");
                    None
                }
            }
        })
        .await
    }

    /// Record a failed outcome without routing execution through `call`,
    /// carrying the error for the transition log.
    pub async fn record_failure(&self, error: impl std::fmt::Display) -> Result<()> {
        let failure_threshold = self.config.failure_threshold;
        let error = error.to_string();
        self.mutate(move |record, now| {
            record.last_failure_at = Some(now);
            record.failure_count += 1;
            record.success_count = 0;
            match record.state {
                CircuitState::Closed => {
                    if record.failure_count >= failure_threshold {
                        record.transition_to_open(now);
                        warn!(
                            service = %record.service_name,
                            failures = record.failure_count,
                            error = %error,
                            "circuit breaker opened (failing fast)"
                        );
                        Some((CircuitEventKind::Opened, Some(record.failure_count)))
                    } else {
                        debug!(
                            service = %record.service_name,
                            failures = record.failure_count,
                            error = %error,
                            "failure recorded"
                        );
                        None
                    }
                }
                // A single half-open failure reopens immediately; prior
                // probe successes earn no partial credit.
                CircuitState::HalfOpen => {
                    record.transition_to_open(now);
                    warn!(
                        service = %record.service_name,
                        error = %error,
                        "half-open probe failed, circuit reopened"
                    );
                    Some((CircuitEventKind::Opened, Some(record.failure_count)))
                }
                CircuitState::Open => None,
            }
        })
        .await
    }

    /// Move an expired Open circuit to HalfOpen. Called on the way into
    /// `call`; a no-op in any other state or before the timeout.
    async fn transition_to_half_open_if_expired(&self) -> Result<()> {
        let record = self.current_record().await?;
        if record.state != CircuitState::Open
            || !record.timeout_elapsed(self.clock.now(), self.config.timeout_seconds())
        {
            return Ok(());
        }

        let timeout_seconds = self.config.timeout_seconds();
        self.mutate(move |record, now| {
            // Re-checked under the lock: another process may have probed first.
            if record.state == CircuitState::Open && record.timeout_elapsed(now, timeout_seconds) {
                record.transition_to_half_open();
                info!(service = %record.service_name, "circuit breaker half-open (testing recovery)");
                Some((CircuitEventKind::HalfOpened, None))
            } else {
                None
            }
        })
        .await
    }

    async fn current_record(&self) -> Result<CircuitBreakerRecord> {
        match self.store.refresh(&self.service_name).await? {
            Some(record) => Ok(record),
            None => self.store.fetch_or_create(&self.service_name).await,
        }
    }

    /// Read-modify-write a record under the service's named lock, emitting
    /// at most one event after the write lands.
    async fn mutate<F>(&self, apply: F) -> Result<()>
    where
        F: FnOnce(
                &mut CircuitBreakerRecord,
                chrono::DateTime<chrono::Utc>,
            ) -> Option<(CircuitEventKind, Option<u32>)>
            + Send,
    {
        let key = breaker_lock_key(&self.service_name);
        let now = self.clock.now();
        let event = with_lock(self.locks.as_ref(), &key, LOCK_TTL, LOCK_WAIT, || async {
            let mut record = self.store.fetch_or_create(&self.service_name).await?;
            let event = apply(&mut record, now);
            self.store.update(&record).await?;
            Ok(event)
        })
        .await?;

        if let Some((kind, failure_count)) = event {
            self.events.publish(CircuitBreakerEvent {
                kind,
                service: self.service_name.clone(),
                timestamp: now,
                failure_count,
            });
        }
        Ok(())
    }
}

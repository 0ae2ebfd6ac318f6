//! # Distributed Lock Service
//!
//! Named, time-bounded mutual exclusion for breaker record mutations. Every
//! mutating sequence acquires the lock `circuit-breaker:<service>` before
//! its read-modify-write and releases it unconditionally afterwards; a lock
//! that cannot be acquired within the wait budget fails the mutating call
//! loudly rather than silently skipping the update.
//!
//! Leases carry a token so release is owner-checked, and they expire after a
//! TTL so a lock abandoned by a crashed process does not wedge the service.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use crate::error::Result;

/// Proof of lock ownership; surrender it back to the service to release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockLease {
    pub key: String,
    pub token: Uuid,
}

#[async_trait]
pub trait LockService: Send + Sync + std::fmt::Debug {
    /// Acquire the named lock, blocking up to `wait`. The lease expires on
    /// its own after `ttl` if never released.
    ///
    /// Fails with [`crate::error::WardenError::LockUnavailable`] when the
    /// wait budget is exhausted.
    async fn acquire(&self, key: &str, ttl: Duration, wait: Duration) -> Result<LockLease>;

    /// Release a held lease. Releasing an expired or stolen lease is a
    /// no-op, not an error.
    async fn release(&self, lease: LockLease) -> Result<()>;
}

/// Run `operation` under the named lock, releasing on every exit path.
///
/// The closure's outcome is returned unchanged; a release failure after a
/// successful operation is surfaced, but never masks the operation's own
/// error.
pub async fn with_lock<T, F, Fut>(
    locks: &dyn LockService,
    key: &str,
    ttl: Duration,
    wait: Duration,
    operation: F,
) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let lease = locks.acquire(key, ttl, wait).await?;
    let outcome = operation().await;
    let released = locks.release(lease).await;
    match outcome {
        Ok(value) => {
            released?;
            Ok(value)
        }
        Err(err) => Err(err),
    }
}

pub use memory::InProcessLockService;
pub use postgres::PostgresLockService;

//! In-process lock service.
//!
//! A map of key to (owner token, expiry deadline) with a polling acquire
//! loop. Serves tests and single-process deployments with the same lease
//! semantics as the database-backed service.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{LockLease, LockService};
use crate::error::{Result, WardenError};

const ACQUIRE_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Default)]
pub struct InProcessLockService {
    held: Arc<Mutex<HashMap<String, (Uuid, Instant)>>>,
}

impl InProcessLockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single atomic grab attempt; takes the lock if free or expired.
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Option<LockLease> {
        let mut held = self.held.lock().await;
        let now = Instant::now();
        match held.get(key) {
            Some((_, deadline)) if *deadline > now => None,
            _ => {
                let token = Uuid::new_v4();
                held.insert(key.to_string(), (token, now + ttl));
                Some(LockLease {
                    key: key.to_string(),
                    token,
                })
            }
        }
    }
}

#[async_trait]
impl LockService for InProcessLockService {
    async fn acquire(&self, key: &str, ttl: Duration, wait: Duration) -> Result<LockLease> {
        let started = Instant::now();
        loop {
            if let Some(lease) = self.try_acquire(key, ttl).await {
                return Ok(lease);
            }
            if started.elapsed() >= wait {
                return Err(WardenError::LockUnavailable {
                    key: key.to_string(),
                    waited: wait,
                });
            }
            tokio::time::sleep(ACQUIRE_POLL_INTERVAL).await;
        }
    }

    async fn release(&self, lease: LockLease) -> Result<()> {
        let mut held = self.held.lock().await;
        if let Some((token, _)) = held.get(&lease.key) {
            if *token == lease.token {
                held.remove(&lease.key);
            }
        }
        Ok(())
    }
}

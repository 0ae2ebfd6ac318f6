//! Worker pool registry: one live pool per pool name.
//!
//! Pools are configured at creation time via a builder closure, since
//! callbacks and counts differ per pool; subsequent lookups return the
//! existing instance untouched.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::clock::Clock;
use crate::error::Result;
use crate::supervision::{ProcessControl, WorkerPool};

pub struct WorkerPoolRegistry {
    pools: RwLock<HashMap<String, Arc<WorkerPool>>>,
    processes: Arc<dyn ProcessControl>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for WorkerPoolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPoolRegistry").finish_non_exhaustive()
    }
}

impl WorkerPoolRegistry {
    pub fn new(processes: Arc<dyn ProcessControl>, clock: Arc<dyn Clock>) -> Self {
        Self {
            pools: RwLock::new(HashMap::new()),
            processes,
            clock,
        }
    }

    /// Get the pool with this name, or build it via `configure` on first
    /// access. The closure receives a fresh pool and returns it configured
    /// (count, queue, hooks).
    pub async fn get_or_create<F>(&self, name: &str, configure: F) -> Result<Arc<WorkerPool>>
    where
        F: FnOnce(WorkerPool) -> Result<WorkerPool>,
    {
        if let Some(pool) = self.pools.read().await.get(name) {
            return Ok(pool.clone());
        }

        let mut pools = self.pools.write().await;
        if let Some(pool) = pools.get(name) {
            return Ok(pool.clone());
        }

        debug!(pool = name, "creating worker pool");
        let pool = configure(WorkerPool::new(
            name,
            self.processes.clone(),
            self.clock.clone(),
        ))?;
        let pool = Arc::new(pool);
        pools.insert(name.to_string(), pool.clone());
        Ok(pool)
    }

    pub async fn get(&self, name: &str) -> Option<Arc<WorkerPool>> {
        self.pools.read().await.get(name).cloned()
    }

    pub async fn registered_pools(&self) -> Vec<String> {
        self.pools.read().await.keys().cloned().collect()
    }
}

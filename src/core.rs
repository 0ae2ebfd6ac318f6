//! # Warden Core Context
//!
//! Long-lived object owning the shared services (store, locks, events,
//! clock, process control) and both registries. Callers hold one
//! `WardenCore` for the life of the process and obtain named breakers and
//! pools from it; there is no process-wide mutable singleton.

use std::sync::Arc;
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::config::WardenConfig;
use crate::error::Result;
use crate::events::EventPublisher;
use crate::locking::{InProcessLockService, LockService, PostgresLockService};
use crate::registry::{CircuitBreakerRegistry, WorkerPoolRegistry};
use crate::resilience::{CircuitBreaker, CircuitBreakerConfig};
use crate::storage::{CircuitBreakerStore, InMemoryCircuitBreakerStore, PostgresCircuitBreakerStore};
use crate::supervision::{ProcessControl, SystemProcessControl, WorkerPool};

pub struct WardenCore {
    config: WardenConfig,
    events: EventPublisher,
    breakers: CircuitBreakerRegistry,
    pools: WorkerPoolRegistry,
}

impl std::fmt::Debug for WardenCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WardenCore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl WardenCore {
    /// Assemble a core from explicit parts. The other constructors are
    /// conveniences over this.
    pub fn from_parts(
        config: WardenConfig,
        store: Arc<dyn CircuitBreakerStore>,
        locks: Arc<dyn LockService>,
        processes: Arc<dyn ProcessControl>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let events = EventPublisher::default();
        let breaker_defaults = CircuitBreakerConfig::from(&config);

        info!(
            failure_threshold = breaker_defaults.failure_threshold,
            timeout_seconds = breaker_defaults.timeout_seconds(),
            half_open_attempts = breaker_defaults.half_open_attempts,
            "warden core initialized"
        );

        Ok(Self {
            breakers: CircuitBreakerRegistry::new(
                breaker_defaults,
                store,
                locks,
                events.clone(),
                clock.clone(),
            ),
            pools: WorkerPoolRegistry::new(processes, clock),
            events,
            config,
        })
    }

    /// Single-process core: in-memory breaker store and locks, real worker
    /// processes spawned from `worker_program`/`worker_args`.
    pub fn in_memory(
        config: WardenConfig,
        worker_program: impl Into<String>,
        worker_args: Vec<String>,
    ) -> Result<Self> {
        Self::from_parts(
            config,
            Arc::new(InMemoryCircuitBreakerStore::new()),
            Arc::new(InProcessLockService::new()),
            Arc::new(SystemProcessControl::new(worker_program, worker_args)),
            Arc::new(SystemClock),
        )
    }

    /// Multi-process core: breaker state and locks shared through Postgres
    /// so every worker process observes the same circuit state. Runs the
    /// idempotent migrations for both tables.
    pub async fn with_postgres(
        config: WardenConfig,
        pool: sqlx::PgPool,
        worker_program: impl Into<String>,
        worker_args: Vec<String>,
    ) -> Result<Self> {
        let store = PostgresCircuitBreakerStore::new(pool.clone());
        store.migrate().await?;
        let locks = PostgresLockService::new(pool);
        locks.migrate().await?;

        Self::from_parts(
            config,
            Arc::new(store),
            Arc::new(locks),
            Arc::new(SystemProcessControl::new(worker_program, worker_args)),
            Arc::new(SystemClock),
        )
    }

    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    /// The event publisher breakers emit through; subscribe for alerting.
    pub fn events(&self) -> &EventPublisher {
        &self.events
    }

    /// Named breaker with the global default configuration.
    pub async fn circuit_breaker(&self, service_name: &str) -> Arc<CircuitBreaker> {
        self.breakers.get_or_create(service_name).await
    }

    /// Named breaker with per-instance configuration (first creation wins).
    pub async fn circuit_breaker_with(
        &self,
        service_name: &str,
        config: CircuitBreakerConfig,
    ) -> Arc<CircuitBreaker> {
        self.breakers.get_or_create_with(service_name, config).await
    }

    /// Named worker pool, configured on first access.
    pub async fn worker_pool<F>(&self, name: &str, configure: F) -> Result<Arc<WorkerPool>>
    where
        F: FnOnce(WorkerPool) -> Result<WorkerPool>,
    {
        self.pools.get_or_create(name, configure).await
    }

    pub fn breaker_registry(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    pub fn pool_registry(&self) -> &WorkerPoolRegistry {
        &self.pools
    }
}

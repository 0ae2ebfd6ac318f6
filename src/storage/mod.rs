//! # Durable Breaker Storage
//!
//! The breaker core needs exactly three operations from its store: atomic
//! create-if-absent, refresh-from-storage, and update. Anything addressable
//! by `service_name` works; the trait keeps the state machine independent of
//! the storage engine. [`memory::InMemoryCircuitBreakerStore`] backs tests
//! and single-process deployments, [`postgres::PostgresCircuitBreakerStore`]
//! backs multi-process fleets.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::CircuitBreakerRecord;

#[async_trait]
pub trait CircuitBreakerStore: Send + Sync + std::fmt::Debug {
    /// Fetch the record for a service, creating a fresh Closed record if
    /// none exists. Creation is atomic: two racing callers both observe one
    /// record.
    async fn fetch_or_create(&self, service_name: &str) -> Result<CircuitBreakerRecord>;

    /// Re-read the latest durable state, if any. Never creates.
    async fn refresh(&self, service_name: &str) -> Result<Option<CircuitBreakerRecord>>;

    /// Persist a mutated record. Callers hold the service's lock.
    async fn update(&self, record: &CircuitBreakerRecord) -> Result<()>;
}

pub use memory::InMemoryCircuitBreakerStore;
pub use postgres::PostgresCircuitBreakerStore;

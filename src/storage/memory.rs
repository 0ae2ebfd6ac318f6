//! In-memory breaker store.
//!
//! Suitable for tests and single-process deployments; the map plays the role
//! of the shared table and the same create-if-absent semantics apply.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::CircuitBreakerStore;
use crate::error::Result;
use crate::models::CircuitBreakerRecord;

#[derive(Debug, Clone, Default)]
pub struct InMemoryCircuitBreakerStore {
    records: Arc<RwLock<HashMap<String, CircuitBreakerRecord>>>,
}

impl InMemoryCircuitBreakerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CircuitBreakerStore for InMemoryCircuitBreakerStore {
    async fn fetch_or_create(&self, service_name: &str) -> Result<CircuitBreakerRecord> {
        // Write lock even on the read path keeps create-if-absent atomic.
        let mut records = self.records.write().await;
        let record = records
            .entry(service_name.to_string())
            .or_insert_with(|| CircuitBreakerRecord::new(service_name));
        Ok(record.clone())
    }

    async fn refresh(&self, service_name: &str) -> Result<Option<CircuitBreakerRecord>> {
        let records = self.records.read().await;
        Ok(records.get(service_name).cloned())
    }

    async fn update(&self, record: &CircuitBreakerRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(record.service_name.clone(), record.clone());
        Ok(())
    }
}

//! Circuit breaker registry: one live breaker per service name.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::clock::Clock;
use crate::events::EventPublisher;
use crate::locking::LockService;
use crate::resilience::{CircuitBreaker, CircuitBreakerConfig};
use crate::storage::CircuitBreakerStore;

pub struct CircuitBreakerRegistry {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    default_config: CircuitBreakerConfig,
    store: Arc<dyn CircuitBreakerStore>,
    locks: Arc<dyn LockService>,
    events: EventPublisher,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CircuitBreakerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerRegistry")
            .field("default_config", &self.default_config)
            .finish_non_exhaustive()
    }
}

impl CircuitBreakerRegistry {
    pub fn new(
        default_config: CircuitBreakerConfig,
        store: Arc<dyn CircuitBreakerStore>,
        locks: Arc<dyn LockService>,
        events: EventPublisher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            default_config,
            store,
            locks,
            events,
            clock,
        }
    }

    /// Get the breaker for a service, creating it with the registry's
    /// default configuration on first access.
    pub async fn get_or_create(&self, service_name: &str) -> Arc<CircuitBreaker> {
        self.get_or_create_with(service_name, self.default_config.clone())
            .await
    }

    /// Get-or-create with explicit configuration. An existing instance
    /// wins; the configuration applies only on first creation.
    pub async fn get_or_create_with(
        &self,
        service_name: &str,
        config: CircuitBreakerConfig,
    ) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().await.get(service_name) {
            return breaker.clone();
        }

        let mut breakers = self.breakers.write().await;
        // Double-checked: another task may have created it between locks.
        if let Some(breaker) = breakers.get(service_name) {
            return breaker.clone();
        }

        debug!(service = service_name, "creating circuit breaker");
        let breaker = Arc::new(CircuitBreaker::new(
            service_name,
            config,
            self.store.clone(),
            self.locks.clone(),
            self.events.clone(),
            self.clock.clone(),
        ));
        breakers.insert(service_name.to_string(), breaker.clone());
        breaker
    }

    /// Names of all breakers instantiated in this process.
    pub async fn registered_services(&self) -> Vec<String> {
        self.breakers.read().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::locking::InProcessLockService;
    use crate::storage::InMemoryCircuitBreakerStore;

    fn registry() -> CircuitBreakerRegistry {
        CircuitBreakerRegistry::new(
            CircuitBreakerConfig::default(),
            Arc::new(InMemoryCircuitBreakerStore::new()),
            Arc::new(InProcessLockService::new()),
            EventPublisher::new(16),
            Arc::new(SystemClock),
        )
    }

    #[tokio::test]
    async fn get_or_create_reuses_instances() {
        let registry = registry();
        let a = registry.get_or_create("payment-api").await;
        let b = registry.get_or_create("payment-api").await;
        assert!(Arc::ptr_eq(&a, &b));

        let other = registry.get_or_create("search-api").await;
        assert!(!Arc::ptr_eq(&a, &other));
        assert_eq!(registry.registered_services().await.len(), 2);
    }

    #[tokio::test]
    async fn first_config_wins() {
        let registry = registry();
        let custom = CircuitBreakerConfig {
            failure_threshold: 9,
            ..Default::default()
        };
        let a = registry.get_or_create_with("payment-api", custom).await;
        let b = registry.get_or_create("payment-api").await;
        assert_eq!(b.config().failure_threshold, 9);
        assert!(Arc::ptr_eq(&a, &b));
    }
}

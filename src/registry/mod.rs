//! # Registries
//!
//! Thin in-memory caches mapping a name to a live breaker or pool, so a
//! facade can get-or-create by name without re-instantiating state. Both
//! are owned by [`crate::core::WardenCore`], not by process-wide statics.

pub mod circuit_breakers;
pub mod worker_pools;

pub use circuit_breakers::CircuitBreakerRegistry;
pub use worker_pools::WorkerPoolRegistry;

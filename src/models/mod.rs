//! Durable data shapes shared across processes.

pub mod circuit_breaker_record;

pub use circuit_breaker_record::{CircuitBreakerRecord, CircuitState};

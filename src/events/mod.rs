//! # Event System
//!
//! The circuit breaker emits three lifecycle events (opened, half-opened,
//! closed) through a broadcast-based publisher. Downstream alerting and
//! notification logic subscribes; publishing with no subscribers is fine.

pub mod publisher;

pub use publisher::{CircuitBreakerEvent, CircuitEventKind, EventPublisher};

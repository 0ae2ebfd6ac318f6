//! # Resilience Module
//!
//! Circuit breakers that protect calls to named external dependencies from
//! cascade failure. Unlike a purely in-process breaker, state here is
//! durable and shared: every queue-worker process pointed at the same store
//! observes the same Closed/Open/HalfOpen state for a service, and all
//! mutations go through a named time-bounded lock so no two processes race
//! a threshold check.
//!
//! ## Architecture
//!
//! - [`CircuitBreaker`]: the per-service state machine over store + locks
//! - [`CircuitBreakerConfig`]: thresholds and timeout, defaulted globally
//! - [`presentation`]: optional label/color/description formatting, kept
//!   out of the state machine itself

pub mod circuit_breaker;
pub mod config;
pub mod presentation;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerError};
pub use config::CircuitBreakerConfig;
pub use crate::models::CircuitState;

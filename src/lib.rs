#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Warden Core
//!
//! Resilience core for supervising long-running background jobs and the
//! services they call. Two independent components:
//!
//! - **Circuit breakers** that stop calling a failing dependency until it
//!   recovers. Breaker state is durable and shared: every process pointed
//!   at the same store observes the same Closed/Open/HalfOpen state, and
//!   all mutations go through a named time-bounded lock.
//! - **Worker pool supervisors** that keep a fixed number of queue workers
//!   alive in one process, replacing crashed workers and restarting
//!   unhealthy ones once per second.
//!
//! ## Module Organization
//!
//! - [`resilience`] - circuit breaker state machine and configuration
//! - [`storage`] - durable breaker record store (in-memory, Postgres)
//! - [`locking`] - named time-bounded lock service (in-process, Postgres)
//! - [`supervision`] - worker entity, pool supervisor, process control
//! - [`registry`] - name -> instance caches for breakers and pools
//! - [`core`] - long-lived context owning the registries
//! - [`events`] - breaker lifecycle event publishing
//! - [`config`] / [`constants`] - configuration surface and fixed defaults
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use warden_core::config::WardenConfig;
//! use warden_core::core::WardenCore;
//!
//! # async fn example() -> warden_core::Result<()> {
//! let core = WardenCore::in_memory(
//!     WardenConfig::default(),
//!     "warden-worker",
//!     vec!["--queue".to_string()],
//! )?;
//!
//! let breaker = core.circuit_breaker("payment-api").await;
//! let charge = breaker
//!     .call(|| async { charge_card().await })
//!     .await;
//! # let _ = charge;
//! # Ok(())
//! # }
//! # async fn charge_card() -> Result<(), std::io::Error> { Ok(()) }
//! ```

pub mod clock;
pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod events;
pub mod locking;
pub mod logging;
pub mod models;
pub mod registry;
pub mod resilience;
pub mod storage;
pub mod supervision;
pub mod test_helpers;

pub use config::WardenConfig;
pub use crate::core::WardenCore;
pub use error::{Result, WardenError};
pub use events::{CircuitBreakerEvent, CircuitEventKind};
pub use models::{CircuitBreakerRecord, CircuitState};
pub use resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};
pub use supervision::{PoolStatus, Worker, WorkerPool, WorkerStatus};

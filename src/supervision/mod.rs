//! # Worker Pool Supervision
//!
//! Keeps a fixed number of queue workers alive in one supervising process.
//! The pool spawns its target count, then once per second examines every
//! worker: crashed or unresponsive workers are replaced, unhealthy ones are
//! restarted in place (or handed to a caller-supplied callback). A single
//! worker's failure never terminates the supervision loop; only `stop()`
//! does.
//!
//! Worker state lives only in the supervising process's memory; there is no
//! shared-state coupling with the circuit breaker side of the crate.

pub mod pool;
pub mod process;
pub mod worker;

pub use pool::{PoolStatus, WorkerPool, WorkerSnapshot};
pub use process::{ProcessControl, SystemProcessControl};
pub use worker::{Worker, WorkerStatus};

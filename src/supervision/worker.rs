//! Worker entity and lifecycle operations.
//!
//! A worker is owned by exactly one pool. Its `id` is stable for its whole
//! lifetime, across restarts; only the pid changes when it is relaunched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::Result;

use super::process::ProcessControl;

/// Caller-supplied health check: true means healthy.
pub type HealthCheckFn = dyn Fn(&Worker) -> bool + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Running,
    Stopped,
    Crashed,
}

#[derive(Debug)]
pub struct Worker {
    id: String,
    pid: u32,
    status: WorkerStatus,
    queue_name: String,
    started_at: DateTime<Utc>,
    last_health_check: Option<DateTime<Utc>>,
    processes: Arc<dyn ProcessControl>,
    clock: Arc<dyn Clock>,
}

impl Worker {
    /// Create a worker bound to a queue. `pid` stays 0 until started.
    pub fn new(
        queue_name: impl Into<String>,
        processes: Arc<dyn ProcessControl>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now();
        Self {
            id: Uuid::new_v4().to_string(),
            pid: 0,
            status: WorkerStatus::Stopped,
            queue_name: queue_name.into(),
            started_at: now,
            last_health_check: None,
            processes,
            clock,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn status(&self) -> WorkerStatus {
        self.status
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn last_health_check(&self) -> Option<DateTime<Utc>> {
        self.last_health_check
    }

    /// Launch the worker process and mark it running.
    pub async fn start(&mut self) -> Result<()> {
        self.pid = self.processes.spawn(&self.queue_name).await?;
        self.status = WorkerStatus::Running;
        self.started_at = self.clock.now();
        debug!(worker_id = %self.id, pid = self.pid, queue = %self.queue_name, "worker started");
        Ok(())
    }

    /// False once stopped or crashed; otherwise asks the OS.
    pub async fn is_responsive(&self) -> bool {
        if self.status != WorkerStatus::Running {
            return false;
        }
        self.processes.is_alive(self.pid).await
    }

    /// Terminate and immediately relaunch with a new pid, same id.
    pub async fn restart(&mut self) -> Result<()> {
        let old_pid = self.pid;
        self.processes.terminate(self.pid).await?;
        self.pid = self.processes.spawn(&self.queue_name).await?;
        self.status = WorkerStatus::Running;
        self.started_at = self.clock.now();
        debug!(
            worker_id = %self.id,
            old_pid,
            new_pid = self.pid,
            "worker restarted in place"
        );
        Ok(())
    }

    /// Send a termination signal; on success the worker is stopped.
    pub async fn kill(&mut self) -> Result<()> {
        self.processes.terminate(self.pid).await?;
        self.status = WorkerStatus::Stopped;
        debug!(worker_id = %self.id, pid = self.pid, "worker killed");
        Ok(())
    }

    pub fn mark_crashed(&mut self) {
        self.status = WorkerStatus::Crashed;
    }

    pub async fn memory_usage_mb(&self) -> Option<u64> {
        self.processes.memory_usage_mb(self.pid).await
    }

    /// Run a health check, stamping `last_health_check` first.
    ///
    /// An unresponsive worker is marked crashed and fails the check before
    /// any callback runs. Otherwise the custom check decides if present,
    /// else the default: responsive and within the memory ceiling.
    pub async fn health_check(
        &mut self,
        custom: Option<&HealthCheckFn>,
        memory_limit_mb: u64,
    ) -> bool {
        self.last_health_check = Some(self.clock.now());

        if !self.is_responsive().await {
            warn!(worker_id = %self.id, pid = self.pid, "worker unresponsive during health check");
            self.mark_crashed();
            return false;
        }

        match custom {
            Some(check) => check(self),
            None => match self.memory_usage_mb().await {
                Some(memory_mb) if memory_mb > memory_limit_mb => {
                    warn!(
                        worker_id = %self.id,
                        pid = self.pid,
                        memory_mb,
                        limit_mb = memory_limit_mb,
                        "worker over memory ceiling"
                    );
                    false
                }
                _ => true,
            },
        }
    }
}

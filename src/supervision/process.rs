//! Process control primitive behind the worker entity.
//!
//! The supervisor needs four things from the OS: spawn a worker process
//! bound to a queue, check liveness of a pid, terminate a pid, and read a
//! pid's memory usage. [`SystemProcessControl`] does this with real
//! processes; tests drive the pool with
//! [`crate::test_helpers::FakeProcessControl`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{Result, WardenError};

#[async_trait]
pub trait ProcessControl: Send + Sync + std::fmt::Debug {
    /// Spawn a worker process pulling from `queue_name`; returns its pid.
    async fn spawn(&self, queue_name: &str) -> Result<u32>;

    /// Whether the process is still alive.
    async fn is_alive(&self, pid: u32) -> bool;

    /// Send the process a termination signal and reap it.
    async fn terminate(&self, pid: u32) -> Result<()>;

    /// Resident memory of the process in MB, if measurable.
    async fn memory_usage_mb(&self, pid: u32) -> Option<u64>;
}

/// Process control over real OS processes.
///
/// Workers are spawned from a caller-supplied command template; the queue
/// name is appended as the final argument. Children are retained so they
/// can be killed and reaped without leaving zombies.
#[derive(Debug)]
pub struct SystemProcessControl {
    program: String,
    args: Vec<String>,
    children: Arc<Mutex<HashMap<u32, Child>>>,
    system: Arc<Mutex<System>>,
}

impl SystemProcessControl {
    /// `program` and `args` form the worker command line; the queue name is
    /// appended when spawning, e.g. `warden-worker --queue <name>`.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            children: Arc::new(Mutex::new(HashMap::new())),
            system: Arc::new(Mutex::new(System::new())),
        }
    }
}

#[async_trait]
impl ProcessControl for SystemProcessControl {
    async fn spawn(&self, queue_name: &str) -> Result<u32> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(queue_name)
            .spawn()
            .map_err(|e| {
                WardenError::Supervision(format!(
                    "failed to spawn worker '{}' for queue '{queue_name}': {e}",
                    self.program
                ))
            })?;

        let pid = child.id().ok_or_else(|| {
            WardenError::Supervision("spawned worker exited before pid could be read".to_string())
        })?;

        debug!(pid, queue = queue_name, "spawned worker process");
        self.children.lock().await.insert(pid, child);
        Ok(pid)
    }

    async fn is_alive(&self, pid: u32) -> bool {
        let mut children = self.children.lock().await;
        match children.get_mut(&pid) {
            Some(child) => match child.try_wait() {
                Ok(None) => true,
                Ok(Some(_)) => {
                    children.remove(&pid);
                    false
                }
                Err(e) => {
                    warn!(pid, error = %e, "failed to poll worker process");
                    false
                }
            },
            None => false,
        }
    }

    async fn terminate(&self, pid: u32) -> Result<()> {
        let mut children = self.children.lock().await;
        if let Some(mut child) = children.remove(&pid) {
            child.start_kill().map_err(|e| {
                WardenError::Supervision(format!("failed to terminate worker {pid}: {e}"))
            })?;
            // Reap so the pid does not linger as a zombie.
            let _ = child.wait().await;
            debug!(pid, "terminated worker process");
        }
        Ok(())
    }

    async fn memory_usage_mb(&self, pid: u32) -> Option<u64> {
        let mut system = self.system.lock().await;
        let sys_pid = Pid::from_u32(pid);
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[sys_pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        system.process(sys_pid).map(|p| p.memory() / (1024 * 1024))
    }
}

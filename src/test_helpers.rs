//! Test doubles shared by unit and integration tests.
//!
//! Shipping these as a normal module (not `#[cfg(test)]`) lets the `tests/`
//! directory and downstream crates drive the breaker and the pool without a
//! database or real worker processes.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

use crate::clock::Clock;
use crate::error::{Result, WardenError};
use crate::supervision::ProcessControl;

/// Clock that only moves when told to, for crossing timeout boundaries
/// without sleeping.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: Mutex::new(Utc::now()),
        }
    }
}

impl ManualClock {
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += ChronoDuration::from_std(duration).expect("duration out of range");
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[derive(Debug, Default)]
struct FakeProcessState {
    alive: HashMap<u32, bool>,
    memory_mb: HashMap<u32, u64>,
    spawn_failures: u32,
}

/// Process control with no real processes: pids are handed out
/// sequentially, liveness and memory are whatever the test sets.
#[derive(Debug, Default)]
pub struct FakeProcessControl {
    next_pid: AtomicU32,
    state: Arc<AsyncMutex<FakeProcessState>>,
}

impl FakeProcessControl {
    pub fn new() -> Self {
        Self {
            next_pid: AtomicU32::new(1000),
            state: Arc::default(),
        }
    }

    /// Simulate the process dying out from under the supervisor.
    pub async fn kill_pid(&self, pid: u32) {
        let mut state = self.state.lock().await;
        state.alive.insert(pid, false);
    }

    pub async fn set_memory_mb(&self, pid: u32, memory_mb: u64) {
        let mut state = self.state.lock().await;
        state.memory_mb.insert(pid, memory_mb);
    }

    pub async fn live_count(&self) -> usize {
        let state = self.state.lock().await;
        state.alive.values().filter(|alive| **alive).count()
    }

    /// Make the next `count` spawn attempts fail, then recover.
    pub async fn fail_next_spawns(&self, count: u32) {
        let mut state = self.state.lock().await;
        state.spawn_failures = count;
    }
}

#[async_trait]
impl ProcessControl for FakeProcessControl {
    async fn spawn(&self, queue_name: &str) -> Result<u32> {
        let mut state = self.state.lock().await;
        if state.spawn_failures > 0 {
            state.spawn_failures -= 1;
            return Err(WardenError::Supervision(format!(
                "failed to spawn worker for queue '{queue_name}'"
            )));
        }
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        state.alive.insert(pid, true);
        state.memory_mb.insert(pid, 64);
        Ok(pid)
    }

    async fn is_alive(&self, pid: u32) -> bool {
        let state = self.state.lock().await;
        state.alive.get(&pid).copied().unwrap_or(false)
    }

    async fn terminate(&self, pid: u32) -> Result<()> {
        let mut state = self.state.lock().await;
        state.alive.insert(pid, false);
        Ok(())
    }

    async fn memory_usage_mb(&self, pid: u32) -> Option<u64> {
        let state = self.state.lock().await;
        state.memory_mb.get(&pid).copied()
    }
}

//! Worker pool supervisor.
//!
//! One supervising task owns the pool: all worker mutation happens inside
//! the supervision loop's tick, while `get_status()` takes the read path so
//! other tasks can observe the pool concurrently. Crash detection is lazy,
//! on the next tick, so detection latency is bounded by the poll interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};
use tracing::{error, info, warn};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::constants::{DEFAULT_WORKER_MEMORY_LIMIT_MB, SUPERVISION_POLL_INTERVAL};
use crate::error::{Result, WardenError};

use super::process::ProcessControl;
use super::worker::{HealthCheckFn, Worker, WorkerStatus};

/// Callback fired with the affected worker (crash/unhealthy hooks).
pub type WorkerCallback = dyn Fn(&Worker) + Send + Sync;

/// Read-only view of one worker, safe to hand across tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSnapshot {
    pub id: String,
    pub pid: u32,
    pub status: WorkerStatus,
    pub started_at: DateTime<Utc>,
    pub last_health_check: Option<DateTime<Utc>>,
    pub memory_mb: Option<u64>,
}

/// Read-only view of the whole pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStatus {
    pub name: String,
    pub queue_name: String,
    pub target_count: usize,
    pub workers: Vec<WorkerSnapshot>,
}

pub struct WorkerPool {
    name: String,
    queue_name: String,
    worker_count: usize,
    memory_limit_mb: u64,
    workers: Arc<RwLock<Vec<Worker>>>,
    health_check: Option<Arc<HealthCheckFn>>,
    on_unhealthy: Option<Arc<WorkerCallback>>,
    on_crash: Option<Arc<WorkerCallback>>,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    processes: Arc<dyn ProcessControl>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("queue_name", &self.queue_name)
            .field("worker_count", &self.worker_count)
            .field("running", &self.running.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl WorkerPool {
    pub fn new(
        name: impl Into<String>,
        processes: Arc<dyn ProcessControl>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.into(),
            queue_name: "default".to_string(),
            worker_count: 1,
            memory_limit_mb: DEFAULT_WORKER_MEMORY_LIMIT_MB,
            workers: Arc::new(RwLock::new(Vec::new())),
            health_check: None,
            on_unhealthy: None,
            on_crash: None,
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
            processes,
            clock,
        }
    }

    /// Set target concurrency. Validated before anything spawns.
    pub fn workers(mut self, count: usize) -> Result<Self> {
        if count < 1 {
            return Err(WardenError::Validation(
                "worker count must be at least 1".to_string(),
            ));
        }
        self.worker_count = count;
        Ok(self)
    }

    /// Set the queue workers pull from.
    pub fn queue(mut self, queue_name: impl Into<String>) -> Self {
        self.queue_name = queue_name.into();
        self
    }

    /// Replace the default health check (responsive + memory ceiling).
    pub fn with_health_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&Worker) -> bool + Send + Sync + 'static,
    {
        self.health_check = Some(Arc::new(check));
        self
    }

    /// Hook fired when a worker fails its health check. When registered,
    /// the pool does not auto-restart the worker; the hook owns the
    /// response.
    pub fn on_unhealthy<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Worker) + Send + Sync + 'static,
    {
        self.on_unhealthy = Some(Arc::new(callback));
        self
    }

    /// Hook fired when a worker is found crashed, before its replacement
    /// spawns.
    pub fn on_crash<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Worker) + Send + Sync + 'static,
    {
        self.on_crash = Some(Arc::new(callback));
        self
    }

    /// Override the memory ceiling used by the default health check.
    pub fn memory_limit_mb(mut self, limit_mb: u64) -> Self {
        self.memory_limit_mb = limit_mb;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target_count(&self) -> usize {
        self.worker_count
    }

    pub fn is_supervising(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Spawn the target number of workers, then supervise until `stop()`.
    ///
    /// Blocking in the async sense: the future completes only after a stop.
    /// Worker crashes are handled internally and never surface here.
    pub async fn supervise(&self) -> Result<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(WardenError::InvalidState(format!(
                "pool '{}' is already supervising",
                self.name
            )));
        }

        info!(
            pool = %self.name,
            queue = %self.queue_name,
            workers = self.worker_count,
            "starting supervision"
        );

        let spawned = {
            let mut workers = self.workers.write().await;
            let mut outcome = Ok(());
            while workers.len() < self.worker_count {
                match self.spawn_worker().await {
                    Ok(worker) => workers.push(worker),
                    Err(e) => {
                        // Supervision must not start half-spawned.
                        outcome = Err(e);
                        break;
                    }
                }
            }
            outcome
        };
        if let Err(e) = spawned {
            self.teardown().await;
            return Err(e);
        }

        while self.running.load(Ordering::Acquire) {
            tokio::select! {
                _ = tokio::time::sleep(SUPERVISION_POLL_INTERVAL) => {
                    self.tick().await;
                }
                _ = self.shutdown.notified() => break,
            }
        }

        // A stop() that raced the startup spawn already tore down an empty
        // pool; tearing down again here means the loop never exits with
        // live workers behind it.
        self.teardown().await;
        info!(pool = %self.name, "supervision stopped");
        Ok(())
    }

    /// Flip the running flag and terminate every live worker.
    ///
    /// Cooperative: a tick in progress finishes before the loop observes
    /// the flag.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.shutdown.notify_waiters();
        self.teardown().await;
    }

    /// Kill and clear every worker and drop the running flag. Idempotent;
    /// `stop()` and every `supervise()` exit path go through here.
    async fn teardown(&self) {
        self.running.store(false, Ordering::Release);
        let mut workers = self.workers.write().await;
        for worker in workers.iter_mut() {
            if let Err(e) = worker.kill().await {
                warn!(pool = %self.name, worker_id = %worker.id(), error = %e, "failed to kill worker during teardown");
            }
        }
        workers.clear();
    }

    /// Snapshot of the pool, safe to call while the loop runs.
    pub async fn get_status(&self) -> PoolStatus {
        let workers = self.workers.read().await;
        let mut snapshots = Vec::with_capacity(workers.len());
        for worker in workers.iter() {
            snapshots.push(WorkerSnapshot {
                id: worker.id().to_string(),
                pid: worker.pid(),
                status: worker.status(),
                started_at: worker.started_at(),
                last_health_check: worker.last_health_check(),
                memory_mb: worker.memory_usage_mb().await,
            });
        }
        PoolStatus {
            name: self.name.clone(),
            queue_name: self.queue_name.clone(),
            target_count: self.worker_count,
            workers: snapshots,
        }
    }

    /// One supervision pass over every worker.
    ///
    /// Crashed or unresponsive workers are retired; unhealthy ones go to
    /// the `on_unhealthy` hook or are restarted in place. A worker that is
    /// both crashed and unhealthy is handled once, as a crash. The pass
    /// ends by spawning back up to the target count, so a shortfall left by
    /// an earlier failed spawn heals on the next tick.
    pub(crate) async fn tick(&self) {
        let mut workers = self.workers.write().await;
        let mut index = 0;

        while index < workers.len() {
            let crashed = workers[index].status() == WorkerStatus::Crashed
                || !workers[index].is_responsive().await;

            if crashed {
                self.retire_crashed(&mut workers, index);
                // The element now at `index` is the next unexamined worker.
                continue;
            }

            let healthy = workers[index]
                .health_check(self.health_check.as_deref(), self.memory_limit_mb)
                .await;

            if !healthy {
                // The check itself may have discovered the crash.
                if workers[index].status() == WorkerStatus::Crashed {
                    self.retire_crashed(&mut workers, index);
                    continue;
                }

                if let Some(callback) = &self.on_unhealthy {
                    warn!(
                        pool = %self.name,
                        worker_id = %workers[index].id(),
                        "worker unhealthy, deferring to callback"
                    );
                    callback(&workers[index]);
                } else if let Err(e) = workers[index].restart().await {
                    error!(
                        pool = %self.name,
                        worker_id = %workers[index].id(),
                        error = %e,
                        "failed to restart unhealthy worker"
                    );
                }
            }

            index += 1;
        }

        // Refill to the target count. Spawning can fail transiently; the
        // pool runs short until a later tick succeeds.
        while workers.len() < self.worker_count {
            match self.spawn_worker().await {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    error!(
                        pool = %self.name,
                        error = %e,
                        "failed to spawn worker, pool below target until next tick"
                    );
                    break;
                }
            }
        }
    }

    /// Mark the worker at `index` crashed, fire the crash hook, and remove
    /// it. The refill at the end of the tick restores the count.
    fn retire_crashed(&self, workers: &mut Vec<Worker>, index: usize) {
        workers[index].mark_crashed();
        warn!(
            pool = %self.name,
            worker_id = %workers[index].id(),
            pid = workers[index].pid(),
            "worker crashed, retiring"
        );

        if let Some(callback) = &self.on_crash {
            callback(&workers[index]);
        }

        workers.remove(index);
    }

    async fn spawn_worker(&self) -> Result<Worker> {
        let mut worker = Worker::new(
            self.queue_name.clone(),
            self.processes.clone(),
            self.clock.clone(),
        );
        worker.start().await?;
        Ok(worker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::test_helpers::FakeProcessControl;
    use std::sync::atomic::AtomicUsize;

    fn pool_with_fakes() -> (WorkerPool, Arc<FakeProcessControl>) {
        let processes = Arc::new(FakeProcessControl::new());
        let pool = WorkerPool::new("importers", processes.clone(), Arc::new(SystemClock));
        (pool, processes)
    }

    async fn spawn_initial(pool: &WorkerPool) {
        let mut workers = pool.workers.write().await;
        for _ in 0..pool.worker_count {
            workers.push(pool.spawn_worker().await.unwrap());
        }
    }

    #[tokio::test]
    async fn zero_workers_is_a_validation_error() {
        let (pool, _) = pool_with_fakes();
        assert!(matches!(pool.workers(0), Err(WardenError::Validation(_))));
    }

    #[tokio::test]
    async fn crashed_worker_is_replaced_and_hook_fires_once() {
        let (pool, processes) = pool_with_fakes();
        let crashes = Arc::new(AtomicUsize::new(0));
        let counter = crashes.clone();
        let pool = pool
            .workers(2)
            .unwrap()
            .queue("imports")
            .on_crash(move |_worker| {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        spawn_initial(&pool).await;
        let before = pool.get_status().await;
        assert_eq!(before.workers.len(), 2);

        let dead_pid = before.workers[0].pid;
        let dead_id = before.workers[0].id.clone();
        processes.kill_pid(dead_pid).await;

        pool.tick().await;

        let after = pool.get_status().await;
        assert_eq!(after.workers.len(), 2);
        assert_eq!(crashes.load(Ordering::SeqCst), 1);
        assert!(after.workers.iter().all(|w| w.id != dead_id));
        assert!(after.workers.iter().all(|w| w.status == WorkerStatus::Running));
    }

    #[tokio::test]
    async fn unhealthy_worker_restarts_in_place_without_callback() {
        let (pool, _processes) = pool_with_fakes();
        let fail_once = Arc::new(AtomicUsize::new(0));
        let counter = fail_once.clone();
        let pool = pool
            .workers(1)
            .unwrap()
            .with_health_check(move |_worker| counter.fetch_add(1, Ordering::SeqCst) > 0);

        spawn_initial(&pool).await;
        let before = pool.get_status().await;
        let (old_id, old_pid) = (before.workers[0].id.clone(), before.workers[0].pid);

        // First check fails, so the worker restarts in place.
        pool.tick().await;

        let after = pool.get_status().await;
        assert_eq!(after.workers.len(), 1);
        assert_eq!(after.workers[0].id, old_id);
        assert_ne!(after.workers[0].pid, old_pid);
        assert!(after.workers[0].last_health_check.is_some());
    }

    #[tokio::test]
    async fn unhealthy_callback_suppresses_auto_restart() {
        let (pool, _processes) = pool_with_fakes();
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = notified.clone();
        let pool = pool
            .workers(1)
            .unwrap()
            .with_health_check(|_worker| false)
            .on_unhealthy(move |_worker| {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        spawn_initial(&pool).await;
        let before = pool.get_status().await;
        let old_pid = before.workers[0].pid;

        pool.tick().await;

        let after = pool.get_status().await;
        assert_eq!(notified.load(Ordering::SeqCst), 1);
        // Same pid: the callback owns the response, no restart happened.
        assert_eq!(after.workers[0].pid, old_pid);
    }

    #[tokio::test]
    async fn crash_takes_precedence_over_health_check() {
        let (pool, processes) = pool_with_fakes();
        let unhealthy_calls = Arc::new(AtomicUsize::new(0));
        let crash_calls = Arc::new(AtomicUsize::new(0));
        let unhealthy_counter = unhealthy_calls.clone();
        let crash_counter = crash_calls.clone();
        let pool = pool
            .workers(1)
            .unwrap()
            .with_health_check(|_worker| false)
            .on_unhealthy(move |_worker| {
                unhealthy_counter.fetch_add(1, Ordering::SeqCst);
            })
            .on_crash(move |_worker| {
                crash_counter.fetch_add(1, Ordering::SeqCst);
            });

        spawn_initial(&pool).await;
        let pid = pool.get_status().await.workers[0].pid;
        processes.kill_pid(pid).await;

        pool.tick().await;

        assert_eq!(crash_calls.load(Ordering::SeqCst), 1);
        assert_eq!(unhealthy_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn default_health_check_enforces_memory_ceiling() {
        let (pool, processes) = pool_with_fakes();
        let pool = pool.workers(1).unwrap().memory_limit_mb(512);

        spawn_initial(&pool).await;
        let before = pool.get_status().await;
        let old_pid = before.workers[0].pid;
        processes.set_memory_mb(old_pid, 1024).await;

        pool.tick().await;

        // Over the ceiling with no callbacks registered: restarted in place.
        let after = pool.get_status().await;
        assert_ne!(after.workers[0].pid, old_pid);
        assert_eq!(after.workers[0].status, WorkerStatus::Running);
    }

    #[tokio::test]
    async fn pool_refills_after_a_failed_replacement_spawn() {
        let (pool, processes) = pool_with_fakes();
        let pool = pool.workers(2).unwrap();

        spawn_initial(&pool).await;
        let dead_pid = pool.get_status().await.workers[0].pid;
        processes.kill_pid(dead_pid).await;
        processes.fail_next_spawns(1).await;

        // The crashed worker is retired but its replacement fails to spawn.
        pool.tick().await;
        assert_eq!(pool.get_status().await.workers.len(), 1);

        // Spawning recovers; the next tick converges back to the target.
        pool.tick().await;
        let after = pool.get_status().await;
        assert_eq!(after.workers.len(), 2);
        assert!(after.workers.iter().all(|w| w.status == WorkerStatus::Running));
    }

    #[tokio::test]
    async fn teardown_reaps_workers_spawned_after_a_racing_stop() {
        let (pool, processes) = pool_with_fakes();
        let pool = pool.workers(2).unwrap();

        // Interleaving where stop() lands between supervise's running-flag
        // swap and its initial spawn: the stop tears down an empty pool.
        pool.running.store(true, Ordering::SeqCst);
        pool.stop().await;
        assert_eq!(pool.get_status().await.workers.len(), 0);

        // The startup spawn then runs, after which the loop observes the
        // cleared flag and exits through teardown.
        spawn_initial(&pool).await;
        pool.teardown().await;

        assert_eq!(pool.get_status().await.workers.len(), 0);
        assert_eq!(processes.live_count().await, 0);
        assert!(!pool.is_supervising());
    }

    #[tokio::test]
    async fn stop_terminates_and_clears_pool() {
        let (pool, processes) = pool_with_fakes();
        let pool = pool.workers(3).unwrap();

        spawn_initial(&pool).await;
        assert_eq!(pool.get_status().await.workers.len(), 3);

        pool.stop().await;
        assert_eq!(pool.get_status().await.workers.len(), 0);
        assert_eq!(processes.live_count().await, 0);
    }
}

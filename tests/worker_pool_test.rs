//! Supervision loop behavior with the real poll cadence, driven through
//! fake processes so no worker binaries are needed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use warden_core::clock::SystemClock;
use warden_core::supervision::{WorkerPool, WorkerStatus};
use warden_core::test_helpers::FakeProcessControl;
use warden_core::WardenError;

fn importers_pool(processes: Arc<FakeProcessControl>) -> WorkerPool {
    WorkerPool::new("importers", processes, Arc::new(SystemClock))
}

#[tokio::test]
async fn pool_converges_after_a_crash() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let processes = Arc::new(FakeProcessControl::new());
    let crashes = Arc::new(AtomicUsize::new(0));
    let counter = crashes.clone();

    let pool = Arc::new(
        importers_pool(processes.clone())
            .workers(2)
            .unwrap()
            .queue("imports")
            .on_crash(move |_worker| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
    );

    let supervisor = pool.clone();
    let handle = tokio::spawn(async move { supervisor.supervise().await });

    // Initial spawn happens before the first tick.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let status = pool.get_status().await;
    assert_eq!(status.name, "importers");
    assert_eq!(status.queue_name, "imports");
    assert_eq!(status.target_count, 2);
    assert_eq!(status.workers.len(), 2);

    // One worker dies out from under the supervisor.
    let dead_pid = status.workers[0].pid;
    let dead_id = status.workers[0].id.clone();
    processes.kill_pid(dead_pid).await;

    // Detection is lazy: the next 1s tick replaces it.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let status = pool.get_status().await;
    assert_eq!(status.workers.len(), 2);
    assert_eq!(crashes.load(Ordering::SeqCst), 1);
    assert!(status.workers.iter().all(|w| w.id != dead_id));
    assert!(status
        .workers
        .iter()
        .all(|w| w.status == WorkerStatus::Running));

    pool.stop().await;
    let outcome = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("supervise should exit promptly after stop")
        .unwrap();
    assert!(outcome.is_ok());
    assert_eq!(pool.get_status().await.workers.len(), 0);
    assert_eq!(processes.live_count().await, 0);
}

#[tokio::test]
async fn double_supervise_is_rejected() {
    let processes = Arc::new(FakeProcessControl::new());
    let pool = Arc::new(importers_pool(processes).workers(1).unwrap());

    let supervisor = pool.clone();
    let handle = tokio::spawn(async move { supervisor.supervise().await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let second = pool.supervise().await;
    assert!(matches!(second, Err(WardenError::InvalidState(_))));

    pool.stop().await;
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    // After a clean stop the pool may supervise again.
    let supervisor = pool.clone();
    let handle = tokio::spawn(async move { supervisor.supervise().await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(pool.is_supervising());

    pool.stop().await;
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn status_is_readable_while_supervising() {
    let processes = Arc::new(FakeProcessControl::new());
    let pool = Arc::new(importers_pool(processes).workers(3).unwrap());

    let supervisor = pool.clone();
    let handle = tokio::spawn(async move { supervisor.supervise().await });
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Hammer the read path from several tasks while the loop runs.
    let mut readers = Vec::new();
    for _ in 0..4 {
        let pool = pool.clone();
        readers.push(tokio::spawn(async move {
            for _ in 0..20 {
                let status = pool.get_status().await;
                assert_eq!(status.target_count, 3);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }));
    }
    for reader in readers {
        reader.await.unwrap();
    }

    pool.stop().await;
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

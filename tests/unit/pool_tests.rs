//! Unit tests for worker lanes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use session_bridge::pool::WorkerPool;
use session_bridge::AppError;

#[test]
fn zero_lanes_rejected() {
    assert!(matches!(WorkerPool::new(0), Err(AppError::Pool(_))));
}

#[test]
fn jobs_run_off_the_submitting_thread() {
    let pool = WorkerPool::new(2).expect("pool");
    let (tx, rx) = mpsc::channel();

    drop(pool.submit(move || {
        let current = thread::current();
        tx.send((current.id(), current.name().map(str::to_owned)))
            .unwrap();
    }));

    let (lane_id, lane_name) = rx.recv_timeout(Duration::from_secs(5)).expect("job ran");
    assert_ne!(lane_id, thread::current().id());
    assert_eq!(lane_name.as_deref(), Some("session-lane"));
    pool.shutdown(Duration::from_secs(1));
}

#[test]
fn concurrency_is_capped_at_lane_count() {
    let pool = WorkerPool::new(2).expect("pool");
    assert_eq!(pool.lanes(), 2);

    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = mpsc::channel();

    for _ in 0..6 {
        let active = Arc::clone(&active);
        let peak = Arc::clone(&peak);
        let tx = tx.clone();
        drop(pool.submit(move || {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            active.fetch_sub(1, Ordering::SeqCst);
            tx.send(()).unwrap();
        }));
    }

    for _ in 0..6 {
        rx.recv_timeout(Duration::from_secs(5)).expect("job finished");
    }
    assert!(peak.load(Ordering::SeqCst) <= 2);
    pool.shutdown(Duration::from_secs(1));
}

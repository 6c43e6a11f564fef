//! Worker pool lifecycle under realistic load.
//!
//! Exercises the pool the way connection handlers do: bursts of submissions
//! from several producers, backpressure handling, growth and idle shrink,
//! and deterministic shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use vantage_core::config::PoolConfig;
use vantage_core::pool::{PoolError, WorkerPool};

fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// The documented burst scenario: `(min=2, max=4, idle=50ms, depth=2)` with
/// five rapid sleep-then-increment submissions. Early submissions are
/// claimed or trigger growth; once two tasks are pending beyond active
/// capacity, submissions fail with `QueueFull`. Every accepted task runs
/// exactly once.
#[test]
fn burst_of_submissions_triggers_growth_then_backpressure() {
    let pool = WorkerPool::new(PoolConfig::for_testing()).unwrap();
    let counter = Arc::new(AtomicUsize::new(0));
    let mut accepted = 0;
    let mut rejected = 0;

    for _ in 0..5 {
        let counter = counter.clone();
        let result = pool.submit(move || {
            thread::sleep(Duration::from_millis(20));
            counter.fetch_add(1, Ordering::SeqCst);
        });
        match result {
            Ok(()) => accepted += 1,
            Err(PoolError::QueueFull { depth }) => {
                assert_eq!(depth, 2);
                rejected += 1;
            }
            Err(other) => panic!("unexpected submit error: {other}"),
        }
        assert!(pool.current_workers() <= 4);
    }

    // The first two submissions always fit (two eager workers).
    assert!(accepted >= 2);
    assert_eq!(accepted + rejected, 5);

    assert!(wait_until(Duration::from_secs(5), || {
        counter.load(Ordering::SeqCst) == accepted
    }));
    pool.shutdown();
    assert_eq!(counter.load(Ordering::SeqCst), accepted);
}

/// Concurrent producers retrying on backpressure: every task submitted by
/// any producer executes exactly once, and shutdown returns only after all
/// started work completed.
#[test]
fn concurrent_producers_all_tasks_execute_exactly_once() {
    let pool = Arc::new(
        WorkerPool::new(PoolConfig {
            min_workers: 2,
            max_workers: 4,
            max_idle: Duration::from_secs(60),
            max_queue_depth: 8,
        })
        .unwrap(),
    );
    let executed = Arc::new(AtomicUsize::new(0));
    let per_producer = 25;

    let producers: Vec<_> = (0..4)
        .map(|_| {
            let pool = pool.clone();
            let executed = executed.clone();
            thread::spawn(move || {
                for _ in 0..per_producer {
                    let executed = executed.clone();
                    // Retry is the submitter's policy on backpressure.
                    loop {
                        let executed = executed.clone();
                        match pool.submit(move || {
                            executed.fetch_add(1, Ordering::SeqCst);
                        }) {
                            Ok(()) => break,
                            Err(PoolError::QueueFull { .. }) => {
                                thread::sleep(Duration::from_millis(1));
                            }
                            Err(other) => panic!("unexpected submit error: {other}"),
                        }
                    }
                }
            })
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }

    assert!(wait_until(Duration::from_secs(5), || {
        executed.load(Ordering::SeqCst) == 4 * per_producer
    }));
    pool.shutdown();
    assert_eq!(executed.load(Ordering::SeqCst), 4 * per_producer);
}

/// Size invariants across growth and idle passage: the pool grows under
/// pressure but never past `max_workers`, and after the idle threshold it
/// shrinks back to exactly `min_workers`, never below.
#[test]
fn pool_size_stays_within_configured_bounds() {
    let config = PoolConfig::for_testing();
    let pool = WorkerPool::new(config.clone()).unwrap();

    // Pressure phase: saturate the queue, retrying rejected submissions.
    let busy = Arc::new(AtomicUsize::new(0));
    let mut submitted = 0;
    while submitted < 12 {
        let busy = busy.clone();
        if pool
            .submit(move || {
                busy.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(15));
            })
            .is_ok()
        {
            submitted += 1;
        } else {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(pool.current_workers() <= config.max_workers);
    }
    assert!(wait_until(Duration::from_secs(5), || {
        pool.queued_tasks() == 0
    }));

    // Idle phase: trickle no-op submissions so reclamation passes run.
    thread::sleep(config.max_idle + Duration::from_millis(20));
    assert!(wait_until(Duration::from_secs(3), || {
        let _ = pool.submit(|| {});
        thread::sleep(Duration::from_millis(20));
        pool.current_workers() == config.min_workers
    }));
    assert!(pool.current_workers() >= config.min_workers);

    pool.shutdown();
    assert_eq!(pool.current_workers(), 0);
}

/// A panicking task is contained at the execution boundary: the pool stays
/// operational at full capacity afterwards.
#[test]
fn panicking_tasks_leave_pool_operational() {
    let pool = WorkerPool::new(PoolConfig {
        min_workers: 2,
        max_workers: 2,
        max_idle: Duration::from_secs(60),
        max_queue_depth: 16,
    })
    .unwrap();
    let executed = Arc::new(AtomicUsize::new(0));

    for i in 0..10 {
        let executed = executed.clone();
        pool.submit(move || {
            if i % 2 == 0 {
                panic!("injected task failure");
            }
            executed.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    assert!(wait_until(Duration::from_secs(5), || {
        executed.load(Ordering::SeqCst) == 5
    }));
    assert_eq!(pool.current_workers(), 2);
    pool.shutdown();
}

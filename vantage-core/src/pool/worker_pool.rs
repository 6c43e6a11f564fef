//! Elastic worker pool with backpressure and idle reclamation.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use super::PoolError;
use super::task::Task;
use crate::config::PoolConfig;

/// State shared between the pool handle and every worker thread.
///
/// The queue mutex and its condvar are the only synchronization on the task
/// hand-off path. Worker bookkeeping lives behind a separate lock on
/// [`WorkerPool`] so resizing never serializes task dispatch.
struct PoolShared {
    /// FIFO task queue; insertion order is claim order
    queue: Mutex<VecDeque<Box<dyn Task>>>,
    /// Signaled on every enqueue and on shutdown
    task_available: Condvar,
    /// Cleared exactly once, by `shutdown`
    active: AtomicBool,
    /// Epoch for per-worker activity timestamps
    started_at: Instant,
}

impl PoolShared {
    fn elapsed_millis(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }
}

/// Per-worker state observed by both the worker loop and reclamation passes.
struct WorkerState {
    /// Soft-stop request flag; cleared at most once by idle reclamation
    active: AtomicBool,
    /// Set by the worker as the last step of its loop, never cleared
    terminated: AtomicBool,
    /// Milliseconds since pool start, updated after each task completes
    last_active_millis: AtomicU64,
}

/// Bookkeeping entry for one live-or-starting worker.
struct WorkerEntry {
    state: Arc<WorkerState>,
    handle: Option<JoinHandle<()>>,
}

/// Live-worker list and size counter, guarded by one lock independent of the
/// task queue.
struct Bookkeeping {
    workers: Vec<WorkerEntry>,
    current_size: usize,
}

/// Bounded, elastic pool of OS worker threads draining a shared FIFO queue.
///
/// `min_workers` threads are started eagerly at construction. Submissions
/// that outpace draining grow the pool one worker at a time up to
/// `max_workers` (a soft cap enforced by the growth routine itself), and
/// workers idle longer than `max_idle` are retired back down to
/// `min_workers`. A full queue rejects submissions synchronously with
/// [`PoolError::QueueFull`].
///
/// Lock order is queue before bookkeeping, never the reverse; worker threads
/// touch only atomics outside the queue lock.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    bookkeeping: Mutex<Bookkeeping>,
    config: PoolConfig,
}

impl WorkerPool {
    /// Creates a pool from the given configuration and starts `min_workers`
    /// threads eagerly.
    ///
    /// # Errors
    ///
    /// - `PoolError::InvalidConfig` - If `min_workers` is zero, exceeds
    ///   `max_workers`, or `max_queue_depth` is zero
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        if config.min_workers == 0 {
            return Err(PoolError::InvalidConfig {
                reason: "min_workers must be at least 1".to_string(),
            });
        }
        if config.min_workers > config.max_workers {
            return Err(PoolError::InvalidConfig {
                reason: format!(
                    "min_workers {} exceeds max_workers {}",
                    config.min_workers, config.max_workers
                ),
            });
        }
        if config.max_queue_depth == 0 {
            return Err(PoolError::InvalidConfig {
                reason: "max_queue_depth must be at least 1".to_string(),
            });
        }

        let pool = Self {
            shared: Arc::new(PoolShared {
                queue: Mutex::new(VecDeque::new()),
                task_available: Condvar::new(),
                active: AtomicBool::new(true),
                started_at: Instant::now(),
            }),
            bookkeeping: Mutex::new(Bookkeeping {
                workers: Vec::with_capacity(config.max_workers),
                current_size: 0,
            }),
            config,
        };

        {
            let mut book = pool.bookkeeping.lock();
            for _ in 0..pool.config.min_workers {
                pool.spawn_worker(&mut book);
            }
        }

        tracing::debug!(
            min_workers = pool.config.min_workers,
            max_workers = pool.config.max_workers,
            "worker pool started"
        );
        Ok(pool)
    }

    /// Submits a task for execution on any idle worker.
    ///
    /// If submissions are arriving faster than workers drain them, the pool
    /// attempts to grow by one worker (a no-op once `max_workers` is
    /// reached). If the pool is above `min_workers`, an idle-reclamation
    /// pass runs instead. The task is enqueued last and all waiting workers
    /// are woken; any one of them may claim it.
    ///
    /// Tasks submitted after [`shutdown`](Self::shutdown) are accepted but
    /// never executed; queued work does not survive shutdown.
    ///
    /// # Errors
    ///
    /// - `PoolError::QueueFull` - If the queue already holds
    ///   `max_queue_depth` tasks; the queue is left unchanged
    pub fn submit<T: Task>(&self, task: T) -> Result<(), PoolError> {
        let mut queue = self.shared.queue.lock();

        if queue.len() >= self.config.max_queue_depth {
            return Err(PoolError::QueueFull { depth: queue.len() });
        }

        {
            let mut book = self.bookkeeping.lock();
            if queue.len() > book.current_size {
                // Tasks are arriving faster than workers complete them
                self.spawn_worker(&mut book);
            } else if book.current_size > self.config.min_workers {
                self.reclaim_idle_workers(&mut book);
            }
        }

        queue.push_back(Box::new(task));
        self.shared.task_available.notify_all();
        Ok(())
    }

    /// Stops the pool and joins every worker.
    ///
    /// Workers finish the task they are currently running; nothing is
    /// force-killed and there is no timeout on the join, so this blocks for
    /// as long as the longest in-flight task. Tasks still queued are
    /// discarded without running. Safe to call more than once; also invoked
    /// from `Drop`.
    pub fn shutdown(&self) {
        {
            // Flag and wake under the queue lock so no worker can re-check
            // its predicate and miss the wakeup.
            let _queue = self.shared.queue.lock();
            self.shared.active.store(false, Ordering::Release);
            self.shared.task_available.notify_all();
        }

        let workers = {
            let mut book = self.bookkeeping.lock();
            book.current_size = 0;
            std::mem::take(&mut book.workers)
        };

        for mut entry in workers {
            if let Some(handle) = entry.handle.take() {
                let _ = handle.join();
            }
        }

        let dropped = {
            let mut queue = self.shared.queue.lock();
            let dropped = queue.len();
            queue.clear();
            dropped
        };
        if dropped > 0 {
            tracing::debug!(dropped, "discarded queued tasks during shutdown");
        }
    }

    /// Returns the count of live-or-starting workers.
    pub fn current_workers(&self) -> usize {
        self.bookkeeping.lock().current_size
    }

    /// Returns the number of tasks waiting to be claimed.
    pub fn queued_tasks(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// Starts one worker thread, refusing past `max_workers`.
    ///
    /// The cap lives here rather than at the call sites that trigger
    /// growth, so no interleaving of submissions can exceed it.
    fn spawn_worker(&self, book: &mut Bookkeeping) {
        if book.current_size >= self.config.max_workers {
            return;
        }

        let state = Arc::new(WorkerState {
            active: AtomicBool::new(true),
            terminated: AtomicBool::new(false),
            last_active_millis: AtomicU64::new(self.shared.elapsed_millis()),
        });
        let shared = Arc::clone(&self.shared);
        let worker_state = Arc::clone(&state);
        let handle = thread::spawn(move || worker_loop(shared, worker_state));

        book.workers.push(WorkerEntry {
            state,
            handle: Some(handle),
        });
        book.current_size += 1;
        tracing::trace!(current_size = book.current_size, "worker started");
    }

    /// Reaps terminated workers and requests stops for idle ones.
    ///
    /// `current_size` is decremented only at confirmed termination, when the
    /// worker's join handle is also reaped, so the size counter never
    /// under-counts live threads. Stop requests are advisory: a worker exits
    /// after its next wake, so the thread may outlive this call briefly.
    /// Outstanding stop requests are counted so the pool never asks more
    /// workers to stop than would leave `min_workers` running.
    fn reclaim_idle_workers(&self, book: &mut Bookkeeping) {
        let before = book.workers.len();
        book.workers.retain_mut(|entry| {
            if entry.state.terminated.load(Ordering::Acquire) {
                if let Some(handle) = entry.handle.take() {
                    let _ = handle.join();
                }
                false
            } else {
                true
            }
        });
        let reaped = before - book.workers.len();
        book.current_size -= reaped;
        if reaped > 0 {
            tracing::trace!(reaped, current_size = book.current_size, "reaped workers");
        }

        let now = self.shared.elapsed_millis();
        let max_idle_millis = self.config.max_idle.as_millis() as u64;
        let mut stopping = book
            .workers
            .iter()
            .filter(|w| !w.state.active.load(Ordering::Acquire))
            .count();

        for entry in &book.workers {
            if book.current_size - stopping <= self.config.min_workers {
                break;
            }
            let state = &entry.state;
            let idle_for = now.saturating_sub(state.last_active_millis.load(Ordering::Acquire));
            if state.active.load(Ordering::Acquire) && idle_for > max_idle_millis {
                state.active.store(false, Ordering::Release);
                stopping += 1;
                tracing::trace!(idle_for, "requested idle worker stop");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.config)
            .field("current_workers", &self.current_workers())
            .field("queued_tasks", &self.queued_tasks())
            .finish()
    }
}

/// Worker state machine: wait for a task, claim at most one, run it outside
/// the queue lock, repeat until the pool or this worker is stopped.
fn worker_loop(shared: Arc<PoolShared>, state: Arc<WorkerState>) {
    while shared.active.load(Ordering::Acquire) && state.active.load(Ordering::Acquire) {
        let task = {
            let mut queue = shared.queue.lock();
            while shared.active.load(Ordering::Acquire)
                && state.active.load(Ordering::Acquire)
                && queue.is_empty()
            {
                shared.task_available.wait(&mut queue);
            }
            queue.pop_front()
            // Lock released here so other workers keep draining while this
            // task runs.
        };

        if let Some(task) = task {
            if panic::catch_unwind(AssertUnwindSafe(|| task.run())).is_err() {
                tracing::warn!("task panicked; worker continues");
            }
            state
                .last_active_millis
                .store(shared.elapsed_millis(), Ordering::Release);
        }
    }

    // Last store of the loop: reclamation removes this entry exactly once.
    state.terminated.store(true, Ordering::Release);
    tracing::trace!("worker loop exited");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    use parking_lot::{Condvar, Mutex};

    use super::*;

    /// Blocks tasks until the test opens it, making queue depth observable.
    #[derive(Default)]
    struct Gate {
        open: Mutex<bool>,
        condvar: Condvar,
    }

    impl Gate {
        fn wait(&self) {
            let mut open = self.open.lock();
            while !*open {
                self.condvar.wait(&mut open);
            }
        }

        fn open(&self) {
            *self.open.lock() = true;
            self.condvar.notify_all();
        }
    }

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

    fn config(
        min_workers: usize,
        max_workers: usize,
        max_idle: Duration,
        max_queue_depth: usize,
    ) -> PoolConfig {
        PoolConfig {
            min_workers,
            max_workers,
            max_idle,
            max_queue_depth,
        }
    }

    #[test]
    fn test_rejects_zero_min_workers() {
        let result = WorkerPool::new(config(0, 4, Duration::from_secs(60), 16));

        assert!(matches!(result, Err(PoolError::InvalidConfig { .. })));
    }

    #[test]
    fn test_rejects_min_above_max() {
        let result = WorkerPool::new(config(8, 4, Duration::from_secs(60), 16));

        assert!(matches!(result, Err(PoolError::InvalidConfig { .. })));
    }

    #[test]
    fn test_rejects_zero_queue_depth() {
        let result = WorkerPool::new(config(1, 2, Duration::from_secs(60), 0));

        assert!(matches!(result, Err(PoolError::InvalidConfig { .. })));
    }

    #[test]
    fn test_starts_min_workers_eagerly() {
        let pool = WorkerPool::new(config(3, 6, Duration::from_secs(60), 16)).unwrap();

        assert_eq!(pool.current_workers(), 3);
        pool.shutdown();
    }

    #[test]
    fn test_every_task_runs_exactly_once() {
        let pool = WorkerPool::new(config(2, 4, Duration::from_secs(60), 64)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..32 {
            let counter = counter.clone();
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        assert!(wait_until(Duration::from_secs(5), || {
            counter.load(Ordering::SeqCst) == 32
        }));
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 32);
    }

    #[test]
    fn test_queue_full_rejection_leaves_queue_unchanged() {
        let pool = WorkerPool::new(config(1, 1, Duration::from_secs(60), 2)).unwrap();
        let gate = Arc::new(Gate::default());
        let started = Arc::new(AtomicUsize::new(0));
        let counter = Arc::new(AtomicUsize::new(0));

        let blocker_gate = gate.clone();
        let blocker_started = started.clone();
        pool.submit(move || {
            blocker_started.fetch_add(1, Ordering::SeqCst);
            blocker_gate.wait();
        })
        .unwrap();
        // Wait until the single worker has claimed the blocker so the queue
        // is empty before filling it.
        assert!(wait_until(Duration::from_secs(2), || {
            started.load(Ordering::SeqCst) == 1
        }));

        for _ in 0..2 {
            let counter = counter.clone();
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        assert_eq!(pool.queued_tasks(), 2);

        let rejected = pool.submit(|| {});
        assert_eq!(rejected, Err(PoolError::QueueFull { depth: 2 }));
        assert_eq!(pool.queued_tasks(), 2);

        gate.open();
        assert!(wait_until(Duration::from_secs(2), || {
            counter.load(Ordering::SeqCst) == 2
        }));
        pool.shutdown();
    }

    #[test]
    fn test_growth_is_capped_at_max_workers() {
        let pool = WorkerPool::new(config(1, 2, Duration::from_secs(60), 16)).unwrap();
        let gate = Arc::new(Gate::default());
        let completed = Arc::new(AtomicUsize::new(0));

        for _ in 0..6 {
            let gate = gate.clone();
            let completed = completed.clone();
            pool.submit(move || {
                gate.wait();
                completed.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        assert!(wait_until(Duration::from_secs(2), || {
            pool.current_workers() == 2
        }));
        // Further pressure must not grow past the cap.
        assert!(pool.current_workers() <= 2);

        gate.open();
        assert!(wait_until(Duration::from_secs(2), || {
            completed.load(Ordering::SeqCst) == 6
        }));
        pool.shutdown();
    }

    #[test]
    fn test_idle_workers_reclaimed_down_to_min() {
        let pool = WorkerPool::new(config(1, 3, Duration::from_millis(30), 16)).unwrap();
        let gate = Arc::new(Gate::default());

        // Force growth by parking tasks on the gate.
        for _ in 0..6 {
            let gate = gate.clone();
            pool.submit(move || gate.wait()).unwrap();
        }
        assert!(wait_until(Duration::from_secs(2), || {
            pool.current_workers() == 3
        }));
        gate.open();

        // Let the extra workers idle past the threshold, then keep trickling
        // submissions: each one runs a reclamation pass and wakes sleepers.
        thread::sleep(Duration::from_millis(60));
        assert!(wait_until(Duration::from_secs(3), || {
            pool.submit(|| {}).unwrap();
            thread::sleep(Duration::from_millis(20));
            pool.current_workers() == 1
        }));
        assert!(pool.current_workers() >= 1);
        pool.shutdown();
    }

    #[test]
    fn test_panicking_task_does_not_kill_worker() {
        let pool = WorkerPool::new(config(1, 1, Duration::from_secs(60), 16)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        pool.submit(|| panic!("task failure")).unwrap();
        let counter_clone = counter.clone();
        pool.submit(move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        assert!(wait_until(Duration::from_secs(2), || {
            counter.load(Ordering::SeqCst) == 1
        }));
        assert_eq!(pool.current_workers(), 1);
        pool.shutdown();
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let pool = WorkerPool::new(config(2, 4, Duration::from_secs(60), 16)).unwrap();
        pool.submit(|| thread::sleep(Duration::from_millis(10)))
            .unwrap();

        pool.shutdown();
        pool.shutdown();

        assert_eq!(pool.current_workers(), 0);
        assert_eq!(pool.queued_tasks(), 0);
    }

    #[test]
    fn test_shutdown_waits_for_running_tasks() {
        let pool = WorkerPool::new(config(2, 2, Duration::from_secs(60), 16)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let started = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let counter = counter.clone();
            let started = started.clone();
            pool.submit(move || {
                started.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(50));
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        assert!(wait_until(Duration::from_secs(2), || {
            started.load(Ordering::SeqCst) == 2
        }));

        pool.shutdown();

        // Both in-flight tasks completed before shutdown returned.
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}

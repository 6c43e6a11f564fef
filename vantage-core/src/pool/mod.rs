//! Elastic worker pool for executing tasks on OS threads.
//!
//! The pool owns a bounded set of worker threads draining a shared FIFO
//! queue. It grows by one worker when submissions outpace draining, rejects
//! submissions with [`PoolError::QueueFull`] once the queue reaches its
//! configured depth, and retires workers that have been idle longer than the
//! configured threshold. Hand-off of each task is atomic, but no global
//! execution order is guaranteed across workers.

pub mod task;
pub mod worker_pool;

// Re-export public API
pub use task::Task;
pub use worker_pool::WorkerPool;

/// Errors that can occur during worker pool operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PoolError {
    /// Task queue reached its configured depth; the submission was rejected.
    ///
    /// This is the pool's backpressure signal. The submitter decides whether
    /// to retry or drop the task; nothing is silently discarded.
    #[error("Task queue is at capacity: {depth} tasks pending")]
    QueueFull {
        /// Queue depth observed at the time of rejection
        depth: usize,
    },

    /// Pool construction was attempted with an unusable configuration.
    #[error("Invalid pool configuration: {reason}")]
    InvalidConfig {
        /// Description of the rejected configuration
        reason: String,
    },
}

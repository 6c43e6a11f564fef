//! Unit-of-work contract executed by the worker pool.

/// A unit of work that can be scheduled onto the pool.
///
/// Tasks carry no return value and no structured error channel; a task is
/// responsible for its own failure handling. The pool contains panics at the
/// execution boundary so a failing task cannot take its worker down, but it
/// does nothing else with the failure beyond logging it.
///
/// Ownership: the queue owns a task until a worker claims it; the worker
/// owns it for the duration of execution and drops it afterwards.
pub trait Task: Send + 'static {
    /// Executes the task, consuming it.
    fn run(self: Box<Self>);
}

/// Any sendable closure is a task, so call sites can submit work without
/// declaring a type for every one-off job.
impl<F> Task for F
where
    F: FnOnce() + Send + 'static,
{
    fn run(self: Box<Self>) {
        (*self)()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    struct FlagTask {
        flag: Arc<AtomicBool>,
    }

    impl Task for FlagTask {
        fn run(self: Box<Self>) {
            self.flag.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_named_task_type_runs() {
        let flag = Arc::new(AtomicBool::new(false));
        let task = Box::new(FlagTask { flag: flag.clone() });

        task.run();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_closure_satisfies_task() {
        let flag = Arc::new(AtomicBool::new(false));
        let captured = flag.clone();
        let task: Box<dyn Task> = Box::new(move || captured.store(true, Ordering::SeqCst));

        task.run();

        assert!(flag.load(Ordering::SeqCst));
    }
}

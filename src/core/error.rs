//! Error types for scheduler and task operations.

use thiserror::Error;

use crate::util::{TaskId, WorkerId};

/// Errors returned synchronously by scheduler and pool operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Submission rejected: the scheduler is draining.
    #[error("scheduler is draining")]
    SchedulerDraining,
    /// Submission rejected: the scheduler has stopped.
    #[error("scheduler is stopped")]
    SchedulerStopped,
    /// The pool is fully scaled out and the backlog limit is reached.
    #[error("pool exhausted: {queued} tasks queued with {workers} workers at max")]
    PoolExhausted {
        /// Tasks waiting in the queue.
        queued: usize,
        /// Live workers (equal to `max_workers`).
        workers: usize,
    },
    /// Task fields failed validation.
    #[error("invalid task: {0}")]
    InvalidTask(String),
    /// A live task already uses this identifier.
    #[error("duplicate task id {0}")]
    DuplicateTask(TaskId),
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Worker creation refused because `max_workers` is reached.
    #[error("worker pool at capacity ({0} workers)")]
    PoolAtCapacity(usize),
    /// Worker removal refused because it would drop the pool below `min_workers`.
    #[error("removing a worker would drop the pool below {0} workers")]
    BelowMinimum(usize),
    /// No worker with this identifier is registered.
    #[error("unknown worker {0}")]
    WorkerNotFound(WorkerId),
    /// The OS refused to spawn a worker thread.
    #[error("failed to spawn worker: {0}")]
    WorkerSpawn(String),
    /// Scheduler construction outside a tokio runtime without an explicit handle.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),
}

/// Terminal failures delivered through a task's [`TaskHandle`](crate::core::TaskHandle).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The task's deadline elapsed before a worker reported completion.
    #[error("task timed out")]
    TaskTimeout,
    /// The worker holding the task exited abnormally.
    #[error("worker crashed while running the task")]
    WorkerCrashed,
    /// The executor reported failure.
    #[error("task failed: {0}")]
    Failed(String),
    /// The scheduler stopped before the task finished.
    #[error("scheduler stopped before the task finished")]
    SchedulerStopped,
}

/// Application-facing result using anyhow, returned by executors.
pub type AppResult<T> = Result<T, anyhow::Error>;

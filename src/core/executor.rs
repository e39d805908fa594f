//! Worker-side execution contract.

use async_trait::async_trait;

use crate::core::{AppResult, TaskMetadata};

/// Executes task payloads on worker threads.
///
/// The scheduler never interprets the payload; it only routes it to a worker and
/// reports the result back to the submitter. `Ok` completes the task, `Err` fails it
/// with [`TaskError::Failed`](crate::core::TaskError::Failed). A panic inside
/// `execute` takes the worker thread down and is reported as
/// [`TaskError::WorkerCrashed`](crate::core::TaskError::WorkerCrashed).
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use adaptive_scheduler::core::{AppResult, TaskMetadata, WorkerExecutor};
///
/// #[derive(Clone)]
/// struct Checksum;
///
/// #[async_trait]
/// impl WorkerExecutor<Vec<u8>, u32> for Checksum {
///     async fn execute(&self, payload: Vec<u8>, _meta: TaskMetadata) -> AppResult<u32> {
///         Ok(payload.iter().map(|b| u32::from(*b)).sum())
///     }
/// }
/// ```
///
/// # Threading
///
/// `execute` is driven by a single-threaded tokio runtime owned by the worker thread,
/// so CPU-bound work never blocks the caller's runtime.
#[async_trait]
pub trait WorkerExecutor<P, R>: Send + Sync + Clone + 'static
where
    P: Send + 'static,
    R: Send + 'static,
{
    /// Execute one task payload.
    async fn execute(&self, payload: P, meta: TaskMetadata) -> AppResult<R>;
}

//! Task model: submission spec, queued task, caller handle and terminal outcome.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::core::TaskError;
use crate::util::{clock, Priority, TaskId, WorkerId};

/// Metadata describing a task, handed to the executor alongside the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetadata {
    /// Unique task identifier.
    pub id: TaskId,
    /// Priority class used for queue ordering.
    pub priority: Priority,
    /// Optional human-readable name for logs and audit events.
    pub label: Option<String>,
    /// Submission time in milliseconds since the Unix epoch.
    pub submitted_at_ms: u128,
    /// Maximum time from submission to completion, in milliseconds.
    pub timeout_ms: u64,
}

impl TaskMetadata {
    /// Metadata stamped with the current wall-clock time.
    #[must_use]
    pub fn new(id: TaskId, priority: Priority, timeout: Duration) -> Self {
        Self {
            id,
            priority,
            label: None,
            submitted_at_ms: clock::now_ms(),
            timeout_ms: clock::duration_ms(timeout),
        }
    }
}

/// A unit of work as submitted by a caller.
///
/// ```rust,ignore
/// let spec = TaskSpec::new(job)
///     .with_priority(Priority::High)
///     .with_timeout(Duration::from_secs(5))
///     .with_label("memory_optimization");
/// let handle = scheduler.submit(spec)?;
/// ```
#[derive(Debug, Clone)]
pub struct TaskSpec<P> {
    /// Caller-chosen identifier; one is generated when absent.
    pub id: Option<TaskId>,
    /// Opaque payload passed to the executor.
    pub payload: P,
    /// Priority class.
    pub priority: Priority,
    /// Per-task timeout; the configured default applies when absent.
    pub timeout: Option<Duration>,
    /// Optional human-readable name.
    pub label: Option<String>,
}

impl<P> TaskSpec<P> {
    /// Normal-priority task with the default timeout.
    pub const fn new(payload: P) -> Self {
        Self {
            id: None,
            payload,
            priority: Priority::Normal,
            timeout: None,
            label: None,
        }
    }

    /// Use a caller-chosen identifier.
    #[must_use]
    pub const fn with_id(mut self, id: TaskId) -> Self {
        self.id = Some(id);
        self
    }

    /// Set the priority class.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Shorthand for `with_priority(Priority::High)`.
    #[must_use]
    pub const fn high(self) -> Self {
        self.with_priority(Priority::High)
    }

    /// Override the default timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Attach a label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// An admitted task. Immutable once created.
#[derive(Debug)]
pub struct Task<P> {
    /// Scheduling metadata.
    pub meta: TaskMetadata,
    /// Caller payload.
    pub payload: P,
    submitted_at: Instant,
}

impl<P> Task<P> {
    /// Create a task stamped with the current instant.
    pub fn new(meta: TaskMetadata, payload: P) -> Self {
        Self {
            meta,
            payload,
            submitted_at: Instant::now(),
        }
    }

    /// Monotonic submission instant.
    pub const fn submitted_at(&self) -> Instant {
        self.submitted_at
    }
}

/// Successful completion of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport<R> {
    /// Task identifier.
    pub task_id: TaskId,
    /// Worker that executed the task.
    pub worker_id: WorkerId,
    /// Executor result.
    pub value: R,
    /// Time spent queued before dispatch.
    pub waited: Duration,
    /// Time spent executing on the worker.
    pub ran: Duration,
}

/// Terminal outcome delivered exactly once per task.
pub type TaskOutcome<R> = Result<TaskReport<R>, TaskError>;

/// Future resolving to the task's [`TaskOutcome`].
///
/// Dropping the handle does not cancel the task; the outcome is discarded.
#[derive(Debug)]
pub struct TaskHandle<R> {
    id: TaskId,
    rx: oneshot::Receiver<TaskOutcome<R>>,
}

impl<R> TaskHandle<R> {
    pub(crate) const fn new(id: TaskId, rx: oneshot::Receiver<TaskOutcome<R>>) -> Self {
        Self { id, rx }
    }

    /// Identifier of the task this handle tracks.
    pub const fn id(&self) -> TaskId {
        self.id
    }
}

impl<R> Future for TaskHandle<R> {
    type Output = TaskOutcome<R>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            // Sender dropped without a verdict: the scheduler went away.
            Poll::Ready(Err(_)) => Poll::Ready(Err(TaskError::SchedulerStopped)),
            Poll::Pending => Poll::Pending,
        }
    }
}

//! API-facing request/response models.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{
    Scheduler, SchedulerError, SchedulerState, SchedulerStats, TaskHandle, TaskSpec,
    WorkerExecutor,
};
use crate::util::{Priority, TaskId};

/// Task submission payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSubmission<P> {
    /// Caller-chosen identifier; generated when absent.
    #[serde(default)]
    pub id: Option<TaskId>,
    /// Opaque payload.
    pub payload: P,
    /// Priority.
    #[serde(default)]
    pub priority: Priority,
    /// Timeout in milliseconds; the scheduler default applies when absent.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Optional human-readable name.
    #[serde(default)]
    pub label: Option<String>,
}

impl<P> From<TaskSubmission<P>> for TaskSpec<P> {
    fn from(req: TaskSubmission<P>) -> Self {
        Self {
            id: req.id,
            payload: req.payload,
            priority: req.priority,
            timeout: req.timeout_ms.map(Duration::from_millis),
            label: req.label,
        }
    }
}

/// Statistics response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsResponse {
    /// Raw statistics.
    #[serde(flatten)]
    pub stats: SchedulerStats,
    /// `busy_workers / total_workers`.
    pub utilization: f64,
}

/// Health response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag: the scheduler accepts work.
    pub ok: bool,
    /// Lifecycle state.
    pub state: SchedulerState,
}

/// Submit a deserialized request.
///
/// # Errors
///
/// Any admission error from [`Scheduler::submit`].
pub fn submit_task<P, R, E>(
    scheduler: &Scheduler<P, R, E>,
    req: TaskSubmission<P>,
) -> Result<TaskHandle<R>, SchedulerError>
where
    P: Send + 'static,
    R: Send + 'static,
    E: WorkerExecutor<P, R>,
{
    scheduler.submit(req.into())
}

/// Build a statistics payload.
pub fn stats_response<P, R, E>(scheduler: &Scheduler<P, R, E>) -> StatsResponse
where
    P: Send + 'static,
    R: Send + 'static,
    E: WorkerExecutor<P, R>,
{
    let stats = scheduler.stats();
    let utilization = stats.utilization();
    StatsResponse { stats, utilization }
}

/// Return a health payload.
pub fn health<P, R, E>(scheduler: &Scheduler<P, R, E>) -> Health
where
    P: Send + 'static,
    R: Send + 'static,
    E: WorkerExecutor<P, R>,
{
    let state = scheduler.state();
    Health {
        ok: state == SchedulerState::Running,
        state,
    }
}

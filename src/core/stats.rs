//! Scheduler statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::core::SchedulerState;

/// Point-in-time scheduler statistics.
///
/// Worker counts are taken under the pool lock, so they are mutually consistent;
/// task counters are monotonic and read individually.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Registered workers, terminating ones included.
    pub total_workers: usize,
    /// Workers claimed for or running a task.
    pub busy_workers: usize,
    /// Workers available for dispatch.
    pub idle_workers: usize,
    /// Tasks waiting in the queue.
    pub queue_length: usize,
    /// Tasks accepted by `submit`.
    pub submitted: u64,
    /// Tasks whose executor returned `Ok`.
    pub completed: u64,
    /// Tasks that failed or lost their worker.
    pub failed: u64,
    /// Tasks that hit their deadline.
    pub timed_out: u64,
    /// Tasks resolved because the scheduler stopped.
    pub cancelled: u64,
    /// Worker threads that exited unexpectedly.
    pub worker_crashes: u64,
    /// Workers created since startup.
    pub workers_created: u64,
    /// Workers removed since startup.
    pub workers_removed: u64,
    /// Lifecycle state.
    pub state: SchedulerState,
}

impl SchedulerStats {
    /// Busy workers over total workers; `1.0` when there are no workers.
    #[allow(clippy::cast_precision_loss)]
    pub fn utilization(&self) -> f64 {
        if self.total_workers == 0 {
            1.0
        } else {
            self.busy_workers as f64 / self.total_workers as f64
        }
    }

    /// Tasks accepted but not yet resolved.
    pub const fn outstanding(&self) -> u64 {
        self.submitted
            .saturating_sub(self.completed + self.failed + self.timed_out + self.cancelled)
    }
}

/// Monotonic task counters.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) submitted: AtomicU64,
    pub(crate) completed: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) timed_out: AtomicU64,
    pub(crate) cancelled: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn read(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

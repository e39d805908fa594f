//! Core scheduling: tasks, queue, worker pool, scaling and the scheduler itself.

pub mod audit;
pub mod error;
pub mod executor;
pub mod queue;
pub mod scaling;
pub mod scheduler;
pub mod stats;
pub mod task;
pub mod worker_pool;

pub use audit::{
    build_audit_event, AuditAction, AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink,
};
pub use error::{AppResult, SchedulerError, TaskError};
pub use executor::WorkerExecutor;
pub use queue::TaskQueue;
pub use scaling::{
    ScalingController, ScalingDecision, ScalingPolicy, ScalingReport, ScalingSnapshot,
    ThresholdPolicy,
};
pub use scheduler::{Scheduler, SchedulerState};
pub use stats::SchedulerStats;
pub use task::{Task, TaskHandle, TaskMetadata, TaskOutcome, TaskReport, TaskSpec};
pub use worker_pool::{PoolCounts, WorkerInfo, WorkerPool, WorkerRemoval, WorkerState};

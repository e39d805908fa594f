//! # Adaptive Scheduler
//!
//! An adaptive concurrent task scheduler backed by a self-sizing pool of worker threads.
//!
//! Callers submit independent units of work; the scheduler queues them by priority,
//! hands each one to exactly one idle worker, enforces per-task timeouts, replaces
//! workers that crash and periodically grows or shrinks the pool between
//! `min_workers` and `max_workers` according to utilization and queue depth.
//!
//! ## Key Features
//!
//! - **Dedicated worker threads**: every worker is an OS thread with its own
//!   single-threaded tokio runtime, so CPU-heavy executors never block the caller's runtime
//! - **Priority queue**: `High` before `Normal`, FIFO within a class
//! - **Exactly-once outcomes**: every admitted task resolves its [`TaskHandle`] once,
//!   with a report, a failure, a timeout, a crash or a shutdown notice
//! - **Crash recovery**: a panicking executor takes down only its worker, which is replaced
//! - **Adaptive sizing**: a pluggable [`ScalingPolicy`], threshold-based by default
//! - **Graceful shutdown**: `drain`, then `stop(grace)`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use adaptive_scheduler::prelude::*;
//! use async_trait::async_trait;
//!
//! #[derive(Clone)]
//! struct Resize;
//!
//! #[async_trait]
//! impl WorkerExecutor<Image, Image> for Resize {
//!     async fn execute(&self, image: Image, _meta: TaskMetadata) -> AppResult<Image> {
//!         Ok(image.resize(640, 480))
//!     }
//! }
//!
//! let scheduler = Scheduler::start(
//!     SchedulerConfig::new().with_min_workers(2).with_max_workers(8),
//!     Resize,
//! )?;
//! let handle = scheduler.submit(TaskSpec::new(image).high().with_timeout(Duration::from_secs(5)))?;
//! let report = handle.await?;
//! println!("resized on {} after waiting {:?}", report.worker_id, report.waited);
//! scheduler.stop(Duration::from_secs(10)).await;
//! ```
//!
//! [`TaskHandle`]: crate::core::TaskHandle
//! [`ScalingPolicy`]: crate::core::ScalingPolicy

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling: tasks, queue, worker pool, scaling and the scheduler.
pub mod core;
/// Configuration models for pool bounds, scaling and timeouts.
pub mod config;
/// Builders to construct a scheduler from configuration.
pub mod builders;
/// Runtime adapter and API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;

/// Commonly used types.
pub mod prelude {
    pub use crate::builders::SchedulerBuilder;
    pub use crate::config::SchedulerConfig;
    pub use crate::core::{
        AppResult, Scheduler, SchedulerError, SchedulerState, SchedulerStats, TaskError,
        TaskHandle, TaskMetadata, TaskReport, TaskSpec, WorkerExecutor,
    };
    pub use crate::util::{Priority, TaskId, WorkerId};
}

//! Scheduler configuration: pool bounds, scaling thresholds and timeouts.

pub mod scheduler;

pub use scheduler::SchedulerConfig;

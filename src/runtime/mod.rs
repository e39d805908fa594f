//! Runtime adapter and API surface.

pub mod api;
pub mod tokio_spawner;

pub use api::{health, stats_response, submit_task, Health, StatsResponse, TaskSubmission};
pub use tokio_spawner::TokioSpawner;

//! Tests for the serializable API surface

use adaptive_scheduler::config::SchedulerConfig;
use adaptive_scheduler::core::{AppResult, Scheduler, SchedulerState, TaskMetadata, WorkerExecutor};
use adaptive_scheduler::runtime::{health, stats_response, submit_task, TaskSubmission};
use async_trait::async_trait;
use std::time::Duration;

#[derive(Clone)]
struct LabelEcho;

#[async_trait]
impl WorkerExecutor<String, String> for LabelEcho {
    async fn execute(&self, payload: String, meta: TaskMetadata) -> AppResult<String> {
        Ok(format!("{}:{payload}", meta.label.unwrap_or_default()))
    }
}

fn scheduler() -> Scheduler<String, String, LabelEcho> {
    let config = SchedulerConfig::new()
        .with_min_workers(1)
        .with_max_workers(2)
        .with_scale_interval(Duration::from_secs(3600));
    Scheduler::start(config, LabelEcho).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_submit_deserialized_request() {
    let scheduler = scheduler();
    let req: TaskSubmission<String> = serde_json::from_str(
        r#"{"payload":"gc","priority":"high","timeout_ms":2000,"label":"memory_optimization"}"#,
    )
    .unwrap();

    let report = submit_task(&scheduler, req).unwrap().await.unwrap();
    assert_eq!(report.value, "memory_optimization:gc");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_zero_timeout_request_rejected() {
    let scheduler = scheduler();
    let req: TaskSubmission<String> =
        serde_json::from_str(r#"{"payload":"gc","timeout_ms":0}"#).unwrap();
    assert!(submit_task(&scheduler, req).is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stats_and_health_payloads() {
    let scheduler = scheduler();
    let req = TaskSubmission {
        id: None,
        payload: "x".to_string(),
        priority: Default::default(),
        timeout_ms: None,
        label: None,
    };
    submit_task(&scheduler, req).unwrap().await.unwrap();

    let response = stats_response(&scheduler);
    assert_eq!(response.stats.completed, 1);
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["completed"], 1);
    assert_eq!(json["total_workers"], 1);
    assert_eq!(json["state"], "running");
    assert!(json["utilization"].is_number());

    assert!(health(&scheduler).ok);
    scheduler.stop(Duration::from_secs(1)).await;
    let h = health(&scheduler);
    assert!(!h.ok);
    assert_eq!(h.state, SchedulerState::Stopped);
}

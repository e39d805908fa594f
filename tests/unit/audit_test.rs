//! Tests for the audit trail recorded by a running scheduler

use adaptive_scheduler::builders::SchedulerBuilder;
use adaptive_scheduler::config::SchedulerConfig;
use adaptive_scheduler::core::{
    AppResult, AuditAction, InMemoryAuditSink, TaskError, TaskMetadata, TaskSpec, WorkerExecutor,
};
use async_trait::async_trait;
use std::time::Duration;

#[derive(Clone)]
struct Sleep;

#[async_trait]
impl WorkerExecutor<u64, u64> for Sleep {
    async fn execute(&self, millis: u64, _meta: TaskMetadata) -> AppResult<u64> {
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(millis)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_task_lifecycle_is_audited() {
    let sink = InMemoryAuditSink::new(256);
    let config = SchedulerConfig::new()
        .with_min_workers(1)
        .with_max_workers(1)
        .with_scale_interval(Duration::from_secs(3600));
    let scheduler = SchedulerBuilder::new(config)
        .with_audit(sink.clone())
        .start(Sleep)
        .unwrap();

    assert_eq!(sink.events_with(AuditAction::WorkerCreated).len(), 1);

    let done = scheduler
        .submit(TaskSpec::new(10).with_label("compact"))
        .unwrap();
    let done_id = done.id();
    done.await.unwrap();

    let slow = scheduler
        .submit(TaskSpec::new(300).with_timeout(Duration::from_millis(50)))
        .unwrap();
    let slow_id = slow.id();
    assert_eq!(slow.await, Err(TaskError::TaskTimeout));

    let queued = scheduler.submit(TaskSpec::new(10)).unwrap();
    scheduler.stop(Duration::ZERO).await;
    assert_eq!(queued.await, Err(TaskError::SchedulerStopped));

    let for_task = |id| {
        sink.events()
            .into_iter()
            .filter(|e| e.task_id == Some(id))
            .map(|e| e.action)
            .collect::<Vec<_>>()
    };

    assert_eq!(
        for_task(done_id),
        vec![AuditAction::Submitted, AuditAction::Dispatched, AuditAction::Completed]
    );
    assert_eq!(
        for_task(slow_id),
        vec![AuditAction::Submitted, AuditAction::Dispatched, AuditAction::TimedOut]
    );

    let completed = sink.events_with(AuditAction::Completed);
    assert_eq!(completed[0].label.as_deref(), Some("compact"));
    assert_eq!(sink.events_with(AuditAction::Cancelled).len(), 1);
}

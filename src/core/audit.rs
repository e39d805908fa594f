//! Audit sink implementations.
//!
//! The scheduler reports task and worker lifecycle transitions to an optional
//! [`AuditSink`]. Sinks are called synchronously from scheduler code paths and must
//! not block.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::util::clock::now_ms;
use crate::util::{TaskId, WorkerId};

/// Lifecycle transition being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Task accepted into the queue.
    Submitted,
    /// Task handed to a worker.
    Dispatched,
    /// Executor returned `Ok`.
    Completed,
    /// Executor returned `Err` or the worker crashed.
    Failed,
    /// Task deadline elapsed.
    TimedOut,
    /// Task resolved because the scheduler stopped.
    Cancelled,
    /// Worker added to the pool.
    WorkerCreated,
    /// Worker removed from the pool.
    WorkerRemoved,
    /// Worker thread exited unexpectedly.
    WorkerCrashed,
}

impl AuditAction {
    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Dispatched => "dispatched",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
            Self::WorkerCreated => "worker_created",
            Self::WorkerRemoved => "worker_removed",
            Self::WorkerCrashed => "worker_crashed",
        }
    }
}

/// Audit event structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Action taken.
    pub action: AuditAction,
    /// Related task, if any.
    pub task_id: Option<TaskId>,
    /// Related worker, if any.
    pub worker_id: Option<WorkerId>,
    /// Task label, when the task carried one.
    pub label: Option<String>,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
    /// Additional context.
    pub detail: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: AuditEvent);
}

/// In-memory audit sink for testing and dev.
///
/// Clones share the same buffer, so a test can keep one clone and hand the other
/// to the scheduler.
#[derive(Debug, Clone)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<VecDeque<AuditEvent>>>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events))),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Stored events with the given action.
    pub fn events_with(&self, action: AuditAction) -> Vec<AuditEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.action == action)
            .cloned()
            .collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Writes audit events to the `adaptive_scheduler::audit` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&mut self, event: AuditEvent) {
        info!(
            target: "adaptive_scheduler::audit",
            action = event.action.as_str(),
            task_id = ?event.task_id,
            worker_id = ?event.worker_id,
            label = event.label.as_deref().unwrap_or(""),
            detail = event.detail.as_deref().unwrap_or(""),
            "audit"
        );
    }
}

/// Helper to build an audit event from context.
pub fn build_audit_event(
    action: AuditAction,
    task_id: Option<TaskId>,
    worker_id: Option<WorkerId>,
    label: Option<String>,
    detail: Option<String>,
) -> AuditEvent {
    AuditEvent {
        action,
        task_id,
        worker_id,
        label,
        created_at_ms: now_ms(),
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_sink_is_bounded() {
        let sink = InMemoryAuditSink::new(2);
        let mut writer = sink.clone();
        for action in [
            AuditAction::Submitted,
            AuditAction::Dispatched,
            AuditAction::Completed,
        ] {
            writer.record(build_audit_event(action, Some(TaskId::new()), None, None, None));
        }
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, AuditAction::Dispatched);
        assert_eq!(sink.events_with(AuditAction::Completed).len(), 1);
    }

    #[test]
    fn test_action_names() {
        assert_eq!(AuditAction::TimedOut.as_str(), "timed_out");
        assert_eq!(
            serde_json::to_value(AuditAction::WorkerCrashed).unwrap(),
            "worker_crashed"
        );
    }
}

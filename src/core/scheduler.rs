//! The scheduler: admission, dispatch, timeouts and shutdown.
//!
//! Submitted tasks are parked in the [`TaskQueue`] and matched to idle workers by
//! [`dispatch`](Inner::dispatch), which runs after every enqueue and every time a
//! worker becomes available. Worker threads report back over an unbounded channel
//! drained by an event-loop task on the host tokio runtime; a second background
//! task runs the [`ScalingController`].
//!
//! Every admitted task owns one entry in the pending table. Whoever removes that
//! entry (completion, timeout, crash or shutdown) is the only party allowed to
//! resolve the caller's [`TaskHandle`], which makes notification exactly-once.
//!
//! Lock order: `state` → `pending` → `queue`, and the pool registry is never held
//! while another lock is taken. No lock is held across an `.await`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::sync::{oneshot, Notify};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::builders::SchedulerBuilder;
use crate::config::SchedulerConfig;
use crate::core::audit::{build_audit_event, AuditAction, AuditSink};
use crate::core::scaling::{ScalingController, ScalingPolicy, ScalingReport, ScalingSnapshot, ScalingTarget};
use crate::core::stats::Counters;
use crate::core::worker_pool::{Completion, WorkerEvent, WorkerInfo, WorkerPool, WorkerRemoval};
use crate::core::{
    AppResult, SchedulerError, SchedulerStats, Task, TaskError, TaskHandle, TaskMetadata,
    TaskOutcome, TaskQueue, TaskReport, TaskSpec, WorkerExecutor,
};
use crate::runtime::TokioSpawner;
use crate::util::{clock, TaskId, WorkerId};

/// Scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// Accepting and running tasks.
    Running,
    /// Rejecting submissions; queued and running tasks continue.
    Draining,
    /// Terminal. Workers and background activities are gone.
    Stopped,
}

impl SchedulerState {
    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller notification slot for an admitted task.
struct PendingTask<R> {
    tx: oneshot::Sender<TaskOutcome<R>>,
    submitted_at: Instant,
    dispatched: Option<(WorkerId, Instant)>,
    timer: Option<AbortHandle>,
    label: Option<String>,
}

struct Inner<P, R, E>
where
    P: Send + 'static,
    R: Send + 'static,
    E: WorkerExecutor<P, R>,
{
    config: SchedulerConfig,
    state: Mutex<SchedulerState>,
    queue: TaskQueue<P>,
    pool: WorkerPool<P, R, E>,
    pending: Mutex<HashMap<TaskId, PendingTask<R>>>,
    counters: Counters,
    /// Signalled whenever a task resolves or a worker goes idle.
    settled: Notify,
    spawner: TokioSpawner,
    audit: Option<Mutex<Box<dyn AuditSink>>>,
}

/// Adaptive concurrent task scheduler.
///
/// ```rust,ignore
/// let scheduler = Scheduler::start(SchedulerConfig::new(), MyExecutor)?;
/// let handle = scheduler.submit(TaskSpec::new(job).high())?;
/// let report = handle.await?;
/// scheduler.stop(Duration::from_secs(5)).await;
/// ```
///
/// Dropping a scheduler that was not stopped performs a forced shutdown: pending
/// callers receive [`TaskError::SchedulerStopped`] and worker threads are told to exit.
pub struct Scheduler<P, R, E>
where
    P: Send + 'static,
    R: Send + 'static,
    E: WorkerExecutor<P, R>,
{
    inner: Arc<Inner<P, R, E>>,
    controller: Arc<ScalingController>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl<P, R, E> fmt::Debug for Scheduler<P, R, E>
where
    P: Send + 'static,
    R: Send + 'static,
    E: WorkerExecutor<P, R>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("state", &self.state())
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}

impl<P, R, E> Scheduler<P, R, E>
where
    P: Send + 'static,
    R: Send + 'static,
    E: WorkerExecutor<P, R>,
{
    /// Start a scheduler with the default threshold policy on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// `InvalidConfig`, `NoRuntime` outside a tokio runtime, or `WorkerSpawn` when the
    /// initial `min_workers` threads cannot be created.
    pub fn start(config: SchedulerConfig, executor: E) -> Result<Self, SchedulerError> {
        SchedulerBuilder::new(config).start(executor)
    }

    /// Builder for audit sinks, custom policies or an explicit runtime handle.
    pub fn builder(config: SchedulerConfig) -> SchedulerBuilder {
        SchedulerBuilder::new(config)
    }

    pub(crate) fn launch(
        config: SchedulerConfig,
        executor: E,
        policy: Box<dyn ScalingPolicy>,
        audit: Option<Box<dyn AuditSink>>,
        spawner: TokioSpawner,
    ) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;

        let (events_tx, events_rx) = unbounded_channel();
        let pool = WorkerPool::new(&config, executor, events_tx);
        pool.initialize()
            .inspect_err(|e| error!(error = %e, "failed to create initial workers"))?;

        let controller = Arc::new(ScalingController::new(policy, &config));
        let inner = Arc::new(Inner {
            config,
            state: Mutex::new(SchedulerState::Running),
            queue: TaskQueue::new(),
            pool,
            pending: Mutex::new(HashMap::new()),
            counters: Counters::default(),
            settled: Notify::new(),
            spawner,
            audit: audit.map(Mutex::new),
        });
        for worker in inner.pool.workers() {
            inner.record(AuditAction::WorkerCreated, None, Some(worker.id), None, None);
        }

        let events = inner
            .spawner
            .spawn(run_events(Arc::downgrade(&inner), events_rx));
        let scaling = inner
            .spawner
            .spawn(Arc::clone(&controller).run(Arc::downgrade(&inner)));

        info!(
            min_workers = inner.config.min_workers,
            max_workers = inner.config.max_workers,
            policy = controller.policy_name(),
            scale_interval_ms = inner.config.scale_interval_ms,
            "scheduler started"
        );
        Ok(Self {
            inner,
            controller,
            background: Mutex::new(vec![events, scaling]),
        })
    }

    /// Admit a task and return a handle resolving to its outcome.
    ///
    /// Never blocks beyond the enqueue.
    ///
    /// # Errors
    ///
    /// `SchedulerDraining` / `SchedulerStopped` after `drain` / `stop`, `InvalidTask`
    /// for a zero timeout, `DuplicateTask` when a live task has the same id and
    /// `PoolExhausted` when `max_backlog` is set, the pool is at `max_workers` and
    /// the backlog is full.
    pub fn submit(&self, spec: TaskSpec<P>) -> Result<TaskHandle<R>, SchedulerError> {
        let inner = &self.inner;
        let timeout = spec
            .timeout
            .unwrap_or_else(|| inner.config.default_task_timeout());
        if timeout.is_zero() {
            return Err(SchedulerError::InvalidTask(
                "timeout must be greater than zero".into(),
            ));
        }

        let id = spec.id.unwrap_or_default();
        let mut meta = TaskMetadata::new(id, spec.priority, timeout);
        meta.label = spec.label;
        let label = meta.label.clone();
        let task = Task::new(meta, spec.payload);
        let (tx, rx) = oneshot::channel();

        {
            let state = inner.state.lock();
            match *state {
                SchedulerState::Running => {}
                SchedulerState::Draining => return Err(SchedulerError::SchedulerDraining),
                SchedulerState::Stopped => return Err(SchedulerError::SchedulerStopped),
            }
            if let Some(limit) = inner.config.max_backlog {
                let queued = inner.queue.len();
                let workers = inner.pool.len();
                if queued >= limit && workers >= inner.config.max_workers {
                    warn!(queued, workers, "rejecting task: pool exhausted");
                    return Err(SchedulerError::PoolExhausted { queued, workers });
                }
            }

            let mut pending = inner.pending.lock();
            if pending.contains_key(&id) {
                return Err(SchedulerError::DuplicateTask(id));
            }
            let timer = inner
                .spawner
                .spawn(expire(Arc::downgrade(inner), id, timeout))
                .abort_handle();
            pending.insert(
                id,
                PendingTask {
                    tx,
                    submitted_at: task.submitted_at(),
                    dispatched: None,
                    timer: Some(timer),
                    label: label.clone(),
                },
            );
            Counters::bump(&inner.counters.submitted);
            inner.queue.enqueue(task);
        }

        debug!(
            task_id = %id,
            label = label.as_deref().unwrap_or(""),
            timeout_ms = clock::duration_ms(timeout),
            "task submitted"
        );
        inner.record(AuditAction::Submitted, Some(id), None, label.as_deref(), None);
        inner.dispatch();
        Ok(TaskHandle::new(id, rx))
    }

    /// Stop accepting tasks. Queued and running work continues.
    pub fn drain(&self) {
        let mut state = self.inner.state.lock();
        if *state == SchedulerState::Running {
            *state = SchedulerState::Draining;
            info!(queued = self.inner.queue.len(), "scheduler draining");
        }
    }

    /// Drain, wait up to `grace` for the queue to empty and every worker to go idle,
    /// then fail whatever is left with [`TaskError::SchedulerStopped`] and terminate
    /// all workers and background activities. Idempotent.
    pub async fn stop(&self, grace: Duration) {
        {
            let mut state = self.inner.state.lock();
            match *state {
                SchedulerState::Stopped => return,
                SchedulerState::Running => {
                    *state = SchedulerState::Draining;
                    info!(grace_ms = clock::duration_ms(grace), "scheduler stopping");
                }
                SchedulerState::Draining => {}
            }
        }

        // `None` when the grace is too large to represent; wait without a limit.
        let deadline = tokio::time::Instant::now().checked_add(grace);
        loop {
            let notified = self.inner.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.is_quiescent() {
                break;
            }
            let expired = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, notified).await.is_err(),
                None => {
                    notified.await;
                    false
                }
            };
            if expired {
                let counts = self.inner.pool.counts();
                warn!(
                    queued = self.inner.queue.len(),
                    busy = counts.busy,
                    "grace period elapsed with work outstanding"
                );
                break;
            }
        }
        self.terminate();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        *self.inner.state.lock()
    }

    /// Point-in-time statistics.
    pub fn stats(&self) -> SchedulerStats {
        let inner = &self.inner;
        let counts = inner.pool.counts();
        let c = &inner.counters;
        SchedulerStats {
            total_workers: counts.total,
            busy_workers: counts.busy,
            idle_workers: counts.idle,
            queue_length: inner.queue.len(),
            submitted: Counters::read(&c.submitted),
            completed: Counters::read(&c.completed),
            failed: Counters::read(&c.failed),
            timed_out: Counters::read(&c.timed_out),
            cancelled: Counters::read(&c.cancelled),
            worker_crashes: inner.pool.crashes(),
            workers_created: inner.pool.workers_created(),
            workers_removed: inner.pool.workers_removed(),
            state: self.state(),
        }
    }

    /// Per-worker diagnostics.
    pub fn workers(&self) -> Vec<WorkerInfo> {
        self.inner.pool.workers()
    }

    /// Configuration the scheduler was started with.
    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Add one worker outside the scaling cycle.
    ///
    /// # Errors
    ///
    /// `SchedulerStopped`, `PoolAtCapacity` or `WorkerSpawn`.
    pub fn add_worker(&self) -> Result<WorkerId, SchedulerError> {
        if self.inner.has_stopped() {
            return Err(SchedulerError::SchedulerStopped);
        }
        let id = self.inner.pool.create_worker()?;
        self.inner
            .record(AuditAction::WorkerCreated, None, Some(id), None, None);
        info!(worker_id = %id, "worker added");
        self.inner.dispatch();
        Ok(id)
    }

    /// Remove a worker. A busy worker finishes its current task first.
    ///
    /// # Errors
    ///
    /// `SchedulerStopped`, `WorkerNotFound` or `BelowMinimum`.
    pub fn remove_worker(&self, id: WorkerId) -> Result<WorkerRemoval, SchedulerError> {
        if self.inner.has_stopped() {
            return Err(SchedulerError::SchedulerStopped);
        }
        let removal = self.inner.pool.remove_worker(id)?;
        if removal == WorkerRemoval::Removed {
            self.inner
                .record(AuditAction::WorkerRemoved, None, Some(id), None, None);
        }
        Ok(removal)
    }

    /// Run one scaling pass now, through the same path as the periodic timer.
    pub fn evaluate_scaling_now(&self) -> ScalingReport {
        self.controller.evaluate_once(&*self.inner)
    }

    fn terminate(&self) {
        if self.inner.finalize() {
            info!(stats = ?self.stats(), "scheduler stopped");
        }
        for task in self.background.lock().drain(..) {
            task.abort();
        }
    }
}

impl<P, R, E> Drop for Scheduler<P, R, E>
where
    P: Send + 'static,
    R: Send + 'static,
    E: WorkerExecutor<P, R>,
{
    fn drop(&mut self) {
        self.terminate();
    }
}

impl<P, R, E> Inner<P, R, E>
where
    P: Send + 'static,
    R: Send + 'static,
    E: WorkerExecutor<P, R>,
{
    fn has_stopped(&self) -> bool {
        *self.state.lock() == SchedulerState::Stopped
    }

    /// Nothing queued, no caller awaiting an outcome and every worker idle. A worker
    /// goes idle before its outcome is settled, so the pending table is checked too.
    fn is_quiescent(&self) -> bool {
        if !self.queue.is_empty() || !self.pending.lock().is_empty() {
            return false;
        }
        self.pool.counts().busy == 0
    }

    /// Match queued tasks to idle workers until one side runs out.
    fn dispatch(&self) {
        loop {
            let Some(worker_id) = self.pool.find_idle_worker() else {
                // With `min_workers = 0` nothing else would ever wake a queued task
                // before the next scaling cycle.
                if self.pool.is_empty() && !self.queue.is_empty() && self.spawn_workers(1) > 0 {
                    continue;
                }
                return;
            };

            let Some(task) = self.queue.dequeue() else {
                self.pool.release(worker_id);
                // A submitter may have enqueued while this worker was claimed.
                if self.queue.is_empty() {
                    return;
                }
                continue;
            };

            let task_id = task.meta.id;
            {
                let mut pending = self.pending.lock();
                let Some(entry) = pending.get_mut(&task_id) else {
                    drop(pending);
                    debug!(task_id = %task_id, "skipping task resolved while queued");
                    self.pool.release(worker_id);
                    continue;
                };
                entry.dispatched = Some((worker_id, Instant::now()));
            }

            let label = task.meta.label.clone();
            match self.pool.assign(worker_id, task) {
                Ok(()) => {
                    debug!(task_id = %task_id, worker_id = %worker_id, "task dispatched");
                    self.record(
                        AuditAction::Dispatched,
                        Some(task_id),
                        Some(worker_id),
                        label.as_deref(),
                        None,
                    );
                }
                Err(task) => {
                    self.requeue(task);
                    self.replenish();
                }
            }
        }
    }

    fn requeue(&self, task: Task<P>) {
        let mut pending = self.pending.lock();
        if let Some(entry) = pending.get_mut(&task.meta.id) {
            entry.dispatched = None;
            self.queue.enqueue(task);
        }
    }

    fn on_finished(&self, worker_id: WorkerId, task_id: TaskId, result: AppResult<R>, ran: Duration) {
        if self.pool.complete(worker_id, task_id, ran, result.is_ok()) == Completion::Retired {
            self.record(AuditAction::WorkerRemoved, None, Some(worker_id), None, None);
        }

        let entry = {
            let mut pending = self.pending.lock();
            let holds = pending
                .get(&task_id)
                .and_then(|e| e.dispatched)
                .is_some_and(|(w, _)| w == worker_id);
            if holds {
                pending.remove(&task_id)
            } else {
                None
            }
        };

        match entry {
            Some(entry) => {
                let waited = entry
                    .dispatched
                    .map_or(Duration::ZERO, |(_, at)| at.saturating_duration_since(entry.submitted_at));
                let outcome = match result {
                    Ok(value) => Ok(TaskReport {
                        task_id,
                        worker_id,
                        value,
                        waited,
                        ran,
                    }),
                    Err(e) => Err(TaskError::Failed(format!("{e:#}"))),
                };
                self.settle(task_id, entry, outcome);
            }
            None => {
                debug!(task_id = %task_id, worker_id = %worker_id, "discarding result of an already resolved task");
            }
        }

        self.settled.notify_waiters();
        self.dispatch();
    }

    fn on_exited(&self, worker_id: WorkerId, abnormal: bool) {
        let Some(report) = self.pool.handle_exit(worker_id, abnormal) else {
            debug!(worker_id = %worker_id, "worker exit acknowledged");
            return;
        };
        self.record(
            AuditAction::WorkerCrashed,
            report.in_flight,
            Some(worker_id),
            None,
            Some(format!("{} workers remain", report.remaining)),
        );

        if let Some(task_id) = report.in_flight {
            let entry = self.pending.lock().remove(&task_id);
            if let Some(entry) = entry {
                self.settle(task_id, entry, Err(TaskError::WorkerCrashed));
            }
        }

        self.replenish();
        self.settled.notify_waiters();
        self.dispatch();
    }

    fn on_timeout(&self, task_id: TaskId) {
        let Some(mut entry) = self.pending.lock().remove(&task_id) else {
            return;
        };
        // This runs on the timer task itself.
        entry.timer = None;
        match entry.dispatched {
            Some((worker_id, _)) => {
                self.pool.mark_abandoned(worker_id, task_id);
                warn!(task_id = %task_id, worker_id = %worker_id, "task timed out while running; result will be discarded");
            }
            None => {
                self.queue.remove(task_id);
                warn!(task_id = %task_id, "task timed out while queued");
            }
        }
        self.settle(task_id, entry, Err(TaskError::TaskTimeout));
    }

    /// Resolve a task whose pending entry the caller has already removed.
    fn settle(&self, task_id: TaskId, mut entry: PendingTask<R>, outcome: TaskOutcome<R>) {
        if let Some(timer) = entry.timer.take() {
            timer.abort();
        }
        let worker_id = entry.dispatched.map(|(w, _)| w);
        let c = &self.counters;
        let (counter, action) = match &outcome {
            Ok(_) => (&c.completed, AuditAction::Completed),
            Err(TaskError::Failed(_) | TaskError::WorkerCrashed) => (&c.failed, AuditAction::Failed),
            Err(TaskError::TaskTimeout) => (&c.timed_out, AuditAction::TimedOut),
            Err(TaskError::SchedulerStopped) => (&c.cancelled, AuditAction::Cancelled),
        };
        Counters::bump(counter);

        match &outcome {
            Ok(report) => debug!(
                task_id = %task_id,
                worker_id = %report.worker_id,
                waited_ms = clock::duration_ms(report.waited),
                ran_ms = clock::duration_ms(report.ran),
                "task completed"
            ),
            Err(e) => debug!(task_id = %task_id, error = %e, "task resolved with error"),
        }
        let detail = outcome.as_ref().err().map(ToString::to_string);
        self.record(action, Some(task_id), worker_id, entry.label.as_deref(), detail);

        if entry.tx.send(outcome).is_err() {
            debug!(task_id = %task_id, "task handle dropped before resolution");
        }
        self.settled.notify_waiters();
    }

    /// Create one worker if a crash left the pool below `min_workers`. A failure is
    /// left to the next scaling cycle's reconciliation.
    fn replenish(&self) {
        if self.has_stopped() {
            return;
        }
        let counts = self.pool.counts();
        if counts.total - counts.terminating < self.config.min_workers {
            self.spawn_workers(1);
        }
    }

    fn spawn_workers(&self, count: usize) -> usize {
        let mut created = 0;
        for _ in 0..count {
            if self.has_stopped() {
                break;
            }
            match self.pool.create_worker() {
                Ok(id) => {
                    self.record(AuditAction::WorkerCreated, None, Some(id), None, None);
                    created += 1;
                }
                Err(SchedulerError::PoolAtCapacity(_) | SchedulerError::SchedulerStopped) => break,
                Err(e) => {
                    error!(error = %e, "failed to create worker");
                    break;
                }
            }
        }
        created
    }

    /// Move to `Stopped` and fail everything still outstanding. Returns `false` if
    /// the scheduler had already stopped.
    fn finalize(&self) -> bool {
        {
            let mut state = self.state.lock();
            if *state == SchedulerState::Stopped {
                return false;
            }
            *state = SchedulerState::Stopped;
        }

        let in_flight = self.pool.shutdown();
        let queued = self.queue.drain_all();
        let outstanding: Vec<(TaskId, PendingTask<R>)> = self.pending.lock().drain().collect();
        if !outstanding.is_empty() {
            warn!(
                queued = queued.len(),
                running = in_flight.len(),
                "failing outstanding tasks at shutdown"
            );
        }
        for (task_id, entry) in outstanding {
            self.settle(task_id, entry, Err(TaskError::SchedulerStopped));
        }
        self.settled.notify_waiters();
        true
    }

    fn record(
        &self,
        action: AuditAction,
        task_id: Option<TaskId>,
        worker_id: Option<WorkerId>,
        label: Option<&str>,
        detail: Option<String>,
    ) {
        if let Some(sink) = &self.audit {
            sink.lock().record(build_audit_event(
                action,
                task_id,
                worker_id,
                label.map(str::to_owned),
                detail,
            ));
        }
    }
}

impl<P, R, E> ScalingTarget for Inner<P, R, E>
where
    P: Send + 'static,
    R: Send + 'static,
    E: WorkerExecutor<P, R>,
{
    fn snapshot(&self) -> ScalingSnapshot {
        let counts = self.pool.counts();
        ScalingSnapshot {
            total_workers: counts.total,
            busy_workers: counts.busy,
            idle_workers: counts.idle,
            queue_length: self.queue.len(),
            min_workers: self.config.min_workers,
            max_workers: self.config.max_workers,
        }
    }

    fn is_stopped(&self) -> bool {
        self.has_stopped()
    }

    fn grow(&self, count: usize) -> usize {
        let created = self.spawn_workers(count);
        if created > 0 {
            self.dispatch();
        }
        created
    }

    fn shrink(&self, count: usize, grace: Duration) -> usize {
        if self.has_stopped() {
            return 0;
        }
        let retired = self.pool.retire_idle(grace, count);
        for id in &retired {
            self.record(AuditAction::WorkerRemoved, None, Some(*id), None, None);
        }
        retired.len()
    }
}

async fn run_events<P, R, E>(inner: Weak<Inner<P, R, E>>, mut events: UnboundedReceiver<WorkerEvent<R>>)
where
    P: Send + 'static,
    R: Send + 'static,
    E: WorkerExecutor<P, R>,
{
    while let Some(event) = events.recv().await {
        let Some(strong) = inner.upgrade() else {
            break;
        };
        match event {
            WorkerEvent::Finished {
                worker_id,
                task_id,
                result,
                ran,
            } => strong.on_finished(worker_id, task_id, result, ran),
            WorkerEvent::Exited {
                worker_id,
                abnormal,
            } => strong.on_exited(worker_id, abnormal),
        }
    }
    debug!("worker event loop exited");
}

async fn expire<P, R, E>(inner: Weak<Inner<P, R, E>>, task_id: TaskId, after: Duration)
where
    P: Send + 'static,
    R: Send + 'static,
    E: WorkerExecutor<P, R>,
{
    tokio::time::sleep(after).await;
    if let Some(inner) = inner.upgrade() {
        inner.on_timeout(task_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[derive(Clone)]
    struct Sleeper;

    #[async_trait]
    impl WorkerExecutor<u64, u64> for Sleeper {
        async fn execute(&self, millis: u64, _meta: TaskMetadata) -> AppResult<u64> {
            tokio::time::sleep(Duration::from_millis(millis)).await;
            Ok(millis)
        }
    }

    fn config() -> SchedulerConfig {
        SchedulerConfig::new()
            .with_min_workers(1)
            .with_max_workers(2)
            .with_scale_interval(Duration::from_secs(3600))
            .with_thread_stack_size(256 * 1024)
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SchedulerState::Draining.to_string(), "draining");
        assert_eq!(
            serde_json::to_value(SchedulerState::Stopped).unwrap(),
            "stopped"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_submit_and_complete() {
        let scheduler = Scheduler::start(config(), Sleeper).unwrap();
        let report = scheduler.submit(TaskSpec::new(5)).unwrap().await.unwrap();
        assert_eq!(report.value, 5);
        let stats = scheduler.stats();
        assert_eq!(stats.submitted, 1);
        assert_eq!(stats.completed, 1);
        scheduler.stop(Duration::from_secs(1)).await;
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_zero_timeout_rejected() {
        let scheduler = Scheduler::start(config(), Sleeper).unwrap();
        let err = scheduler
            .submit(TaskSpec::new(1).with_timeout(Duration::ZERO))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidTask(_)));
        assert_eq!(scheduler.stats().submitted, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_drop_fails_pending_tasks() {
        let scheduler = Scheduler::start(config(), Sleeper).unwrap();
        let running = scheduler.submit(TaskSpec::new(500)).unwrap();
        let queued = scheduler.submit(TaskSpec::new(500)).unwrap();
        drop(scheduler);
        assert_eq!(running.await, Err(TaskError::SchedulerStopped));
        assert_eq!(queued.await, Err(TaskError::SchedulerStopped));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_empty_pool_spawns_on_demand() {
        let scheduler =
            Scheduler::start(config().with_min_workers(0), Sleeper).unwrap();
        assert_eq!(scheduler.stats().total_workers, 0);
        let report = scheduler.submit(TaskSpec::new(1)).unwrap().await.unwrap();
        assert_eq!(report.value, 1);
        assert_eq!(scheduler.stats().total_workers, 1);
    }
}

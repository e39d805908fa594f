//! Worker pool: owns worker threads and their bookkeeping.
//!
//! The registry is a single `parking_lot::Mutex` over the worker slots, so
//! "find an idle worker and claim it" and "retire idle workers" are each one
//! critical section. Worker threads never touch the registry; they report through
//! the scheduler's event channel and the scheduler calls back into the pool.
//!
//! # Lifecycle
//!
//! ```text
//!   create_worker ──► Idle ──find_idle_worker──► Busy ──complete──► Idle
//!                      │                          │
//!                      │ remove_worker            │ remove_worker
//!                      ▼                          ▼
//!                   (gone)       ◄──complete──  Terminating
//! ```
//!
//! A worker thread that exits while its slot is still registered has crashed; the
//! scheduler fails its in-flight task and asks for a replacement.

mod worker;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::core::{SchedulerError, Task, WorkerExecutor};
use crate::util::{TaskId, WorkerId};

pub(crate) use worker::WorkerEvent;
use worker::{spawn_worker, WorkerThread};

/// Worker state as seen by the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Waiting for a task.
    Idle,
    /// Claimed for, or running, a task.
    Busy,
    /// Marked for removal; finishes its current task, then exits.
    Terminating,
}

/// Per-worker diagnostics. Never used for scheduling correctness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerInfo {
    /// Worker identifier.
    pub id: WorkerId,
    /// Current state.
    pub state: WorkerState,
    /// Task being executed, if any.
    pub current_task: Option<TaskId>,
    /// Tasks whose executor returned `Ok`.
    pub tasks_completed: u64,
    /// Tasks whose executor returned `Err`.
    pub tasks_failed: u64,
    /// Tasks that timed out while this worker was still running them.
    pub tasks_abandoned: u64,
    /// Cumulative time spent executing tasks.
    pub busy_time: Duration,
    /// Time since the worker was created.
    pub age: Duration,
    /// Time since the worker last finished a task (or was created).
    pub idle_for: Duration,
}

/// Worker counts taken under one lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolCounts {
    /// All registered workers, including terminating ones.
    pub total: usize,
    /// Workers claimed for or running a task.
    pub busy: usize,
    /// Workers available for dispatch.
    pub idle: usize,
    /// Workers marked for removal.
    pub terminating: usize,
}

/// Result of [`WorkerPool::remove_worker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerRemoval {
    /// The worker was idle and has been terminated.
    Removed,
    /// The worker is busy; it will exit after its current task.
    Deferred,
}

/// What the scheduler should do after a worker reported a finished task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Completion {
    /// Worker is idle again.
    Idle,
    /// Worker was marked for removal and is now gone.
    Retired,
    /// The report did not match the worker's bookkeeping and was ignored.
    Stale,
}

/// Bookkeeping for a worker whose thread exited while still registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CrashReport {
    pub(crate) in_flight: Option<TaskId>,
    pub(crate) remaining: usize,
}

#[derive(Debug, Default, Clone, Copy)]
struct SlotStats {
    completed: u64,
    failed: u64,
    abandoned: u64,
    busy_time: Duration,
}

struct WorkerSlot<P> {
    thread: WorkerThread<P>,
    state: WorkerState,
    current_task: Option<TaskId>,
    /// A task that timed out after this worker was claimed for it but before hand-off.
    abandoned_early: Option<TaskId>,
    stats: SlotStats,
    created_at: Instant,
    last_used_at: Instant,
}

impl<P> WorkerSlot<P> {
    fn is_busy(&self) -> bool {
        self.state == WorkerState::Busy || self.current_task.is_some()
    }

    fn info(&self, id: WorkerId, now: Instant) -> WorkerInfo {
        WorkerInfo {
            id,
            state: self.state,
            current_task: self.current_task,
            tasks_completed: self.stats.completed,
            tasks_failed: self.stats.failed,
            tasks_abandoned: self.stats.abandoned,
            busy_time: self.stats.busy_time,
            age: now.saturating_duration_since(self.created_at),
            idle_for: now.saturating_duration_since(self.last_used_at),
        }
    }
}

/// Owns the set of live workers.
pub struct WorkerPool<P, R, E>
where
    P: Send + 'static,
    R: Send + 'static,
    E: WorkerExecutor<P, R>,
{
    min_workers: usize,
    max_workers: usize,
    stack_size: usize,
    name_prefix: String,
    executor: E,
    events: UnboundedSender<WorkerEvent<R>>,
    slots: Mutex<BTreeMap<WorkerId, WorkerSlot<P>>>,
    next_id: AtomicU64,
    created: AtomicU64,
    removed: AtomicU64,
    crashes: AtomicU64,
    spawning: AtomicUsize,
    closed: AtomicBool,
}

impl<P, R, E> WorkerPool<P, R, E>
where
    P: Send + 'static,
    R: Send + 'static,
    E: WorkerExecutor<P, R>,
{
    pub(crate) fn new(
        config: &SchedulerConfig,
        executor: E,
        events: UnboundedSender<WorkerEvent<R>>,
    ) -> Self {
        Self {
            min_workers: config.min_workers,
            max_workers: config.max_workers,
            stack_size: config.thread_stack_size,
            name_prefix: config.worker_name_prefix.clone(),
            executor,
            events,
            slots: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(0),
            created: AtomicU64::new(0),
            removed: AtomicU64::new(0),
            crashes: AtomicU64::new(0),
            spawning: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Create `min_workers` workers. Any failure tears down what was created.
    pub(crate) fn initialize(&self) -> Result<(), SchedulerError> {
        for _ in 0..self.min_workers {
            if let Err(e) = self.create_worker() {
                self.shutdown();
                return Err(e);
            }
        }
        info!(
            min_workers = self.min_workers,
            max_workers = self.max_workers,
            "worker pool initialized"
        );
        Ok(())
    }

    /// Spawn a new idle worker.
    ///
    /// # Errors
    ///
    /// `PoolAtCapacity` when `max_workers` workers are registered or being spawned,
    /// `WorkerSpawn` when the OS refuses the thread, `SchedulerStopped` after
    /// [`shutdown`](Self::shutdown).
    pub fn create_worker(&self) -> Result<WorkerId, SchedulerError> {
        let id = {
            let slots = self.slots.lock();
            // Checked under the registry lock so shutdown cannot race a late spawn.
            if self.closed.load(Ordering::Acquire) {
                return Err(SchedulerError::SchedulerStopped);
            }
            // `spawning` only changes under the lock, so reservations count toward capacity.
            if slots.len() + self.spawning.load(Ordering::Relaxed) >= self.max_workers {
                return Err(SchedulerError::PoolAtCapacity(self.max_workers));
            }
            self.spawning.fetch_add(1, Ordering::Relaxed);
            WorkerId(self.next_id.fetch_add(1, Ordering::Relaxed))
        };

        let spawned = spawn_worker(
            id,
            &self.name_prefix,
            self.stack_size,
            self.executor.clone(),
            self.events.clone(),
        );

        let mut slots = self.slots.lock();
        self.spawning.fetch_sub(1, Ordering::Relaxed);
        let thread = spawned?;
        if self.closed.load(Ordering::Acquire) {
            // Dropping the command sender tells the new thread to exit.
            drop(slots);
            drop(thread);
            return Err(SchedulerError::SchedulerStopped);
        }
        let now = Instant::now();
        slots.insert(
            id,
            WorkerSlot {
                thread,
                state: WorkerState::Idle,
                current_task: None,
                abandoned_early: None,
                stats: SlotStats::default(),
                created_at: now,
                last_used_at: now,
            },
        );
        self.created.fetch_add(1, Ordering::Relaxed);
        debug!(worker_id = %id, workers = slots.len(), "worker created");
        Ok(id)
    }

    /// Claim an idle worker, marking it busy in the same critical section.
    ///
    /// The most recently used idle worker is preferred so that cold workers age out
    /// and become scale-down candidates.
    pub(crate) fn find_idle_worker(&self) -> Option<WorkerId> {
        let mut slots = self.slots.lock();
        let (id, slot) = slots
            .iter_mut()
            .filter(|(_, s)| s.state == WorkerState::Idle)
            .max_by_key(|(_, s)| s.last_used_at)?;
        slot.state = WorkerState::Busy;
        Some(*id)
    }

    /// Undo a claim that found no task to run.
    pub(crate) fn release(&self, id: WorkerId) {
        let mut slots = self.slots.lock();
        let retire = match slots.get_mut(&id) {
            Some(slot) if slot.current_task.is_none() => {
                if slot.state == WorkerState::Busy {
                    slot.state = WorkerState::Idle;
                }
                slot.state == WorkerState::Terminating
            }
            _ => false,
        };
        if retire {
            slots.remove(&id);
            self.removed.fetch_add(1, Ordering::Relaxed);
            debug!(worker_id = %id, "claimed worker retired");
        }
    }

    /// Hand a task to a claimed worker. If the worker's channel is gone the slot is
    /// dropped and the task is given back.
    pub(crate) fn assign(&self, id: WorkerId, task: Task<P>) -> Result<(), Task<P>> {
        let mut slots = self.slots.lock();
        let Some(slot) = slots.get_mut(&id) else {
            return Err(task);
        };
        let task_id = task.meta.id;
        match slot.thread.commands.try_send(task) {
            Ok(()) => {
                slot.current_task = Some(task_id);
                if slot.abandoned_early.take() == Some(task_id) {
                    slot.stats.abandoned += 1;
                }
                Ok(())
            }
            Err(e) => {
                warn!(worker_id = %id, task_id = %task_id, "worker channel unusable, dropping worker");
                slots.remove(&id);
                self.crashes.fetch_add(1, Ordering::Relaxed);
                Err(e.into_inner())
            }
        }
    }

    /// Record a finished task and return the worker to service (or retire it).
    pub(crate) fn complete(
        &self,
        id: WorkerId,
        task_id: TaskId,
        ran: Duration,
        succeeded: bool,
    ) -> Completion {
        let mut slots = self.slots.lock();
        let Some(slot) = slots.get_mut(&id) else {
            return Completion::Stale;
        };
        if slot.current_task != Some(task_id) {
            warn!(worker_id = %id, task_id = %task_id, "completion for a task the worker does not hold");
            return Completion::Stale;
        }
        slot.current_task = None;
        slot.last_used_at = Instant::now();
        slot.stats.busy_time += ran;
        if succeeded {
            slot.stats.completed += 1;
        } else {
            slot.stats.failed += 1;
        }
        if slot.state == WorkerState::Terminating {
            slots.remove(&id);
            self.removed.fetch_add(1, Ordering::Relaxed);
            debug!(worker_id = %id, "worker retired after finishing its task");
            Completion::Retired
        } else {
            slot.state = WorkerState::Idle;
            Completion::Idle
        }
    }

    /// Note that the task a worker is running has timed out.
    pub(crate) fn mark_abandoned(&self, id: WorkerId, task_id: TaskId) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(&id) {
            if slot.current_task == Some(task_id) {
                slot.stats.abandoned += 1;
            } else if slot.current_task.is_none() && slot.state != WorkerState::Idle {
                // Claimed but not yet assigned; counted once the hand-off lands.
                slot.abandoned_early = Some(task_id);
            }
        }
    }

    /// Drop a worker whose thread exited. Returns `None` when the slot was already
    /// removed on purpose (retirement or shutdown).
    pub(crate) fn handle_exit(&self, id: WorkerId, abnormal: bool) -> Option<CrashReport> {
        let mut slots = self.slots.lock();
        let slot = slots.remove(&id)?;
        self.crashes.fetch_add(1, Ordering::Relaxed);
        warn!(
            worker_id = %id,
            thread = slot.thread.join.thread().name().unwrap_or("unnamed"),
            abnormal,
            task_id = ?slot.current_task,
            "worker thread exited unexpectedly"
        );
        Some(CrashReport {
            in_flight: slot.current_task,
            remaining: slots.len(),
        })
    }

    /// Remove a worker. Idle workers go immediately; busy workers are marked
    /// `Terminating` and leave after their current task.
    ///
    /// # Errors
    ///
    /// `WorkerNotFound` for an unknown id, `BelowMinimum` when the removal would leave
    /// fewer than `min_workers` workers that are not already terminating.
    pub fn remove_worker(&self, id: WorkerId) -> Result<WorkerRemoval, SchedulerError> {
        let mut slots = self.slots.lock();
        let active = slots
            .values()
            .filter(|s| s.state != WorkerState::Terminating)
            .count();
        let slot = slots.get_mut(&id).ok_or(SchedulerError::WorkerNotFound(id))?;
        if slot.state == WorkerState::Terminating {
            return Ok(WorkerRemoval::Deferred);
        }
        if active <= self.min_workers {
            return Err(SchedulerError::BelowMinimum(self.min_workers));
        }
        if slot.is_busy() {
            slot.state = WorkerState::Terminating;
            info!(worker_id = %id, "worker marked for removal after current task");
            return Ok(WorkerRemoval::Deferred);
        }
        slots.remove(&id);
        self.removed.fetch_add(1, Ordering::Relaxed);
        info!(worker_id = %id, "worker removed");
        Ok(WorkerRemoval::Removed)
    }

    /// Remove up to `limit` idle workers that have been idle for at least `grace`,
    /// least recently used first, never going below `min_workers`.
    pub(crate) fn retire_idle(&self, grace: Duration, limit: usize) -> Vec<WorkerId> {
        let mut slots = self.slots.lock();
        let now = Instant::now();
        let active = slots
            .values()
            .filter(|s| s.state != WorkerState::Terminating)
            .count();
        let limit = limit.min(active.saturating_sub(self.min_workers));

        let retired = idle_longer_than(&slots, now, grace, limit);
        for id in &retired {
            slots.remove(id);
        }
        self.removed.fetch_add(retired.len() as u64, Ordering::Relaxed);
        retired
    }

    /// Idle workers unused for at least `grace`, least recently used first, at most
    /// `limit` of them. Read-only; see [`retire_idle`](Self::retire_idle).
    pub fn idle_candidates(&self, grace: Duration, limit: usize) -> Vec<WorkerId> {
        let slots = self.slots.lock();
        idle_longer_than(&slots, Instant::now(), grace, limit)
    }

    /// Remove every worker and return the tasks they were running. Worker threads are
    /// detached; busy ones exit once their payload returns.
    pub(crate) fn shutdown(&self) -> Vec<TaskId> {
        let drained = {
            let mut slots = self.slots.lock();
            self.closed.store(true, Ordering::Release);
            std::mem::take(&mut *slots)
        };
        let count = drained.len();
        let in_flight: Vec<TaskId> = drained.values().filter_map(|s| s.current_task).collect();
        self.removed.fetch_add(count as u64, Ordering::Relaxed);
        drop(drained);
        if count > 0 {
            info!(workers = count, in_flight = in_flight.len(), "worker pool shut down");
        }
        in_flight
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Worker counts.
    pub fn counts(&self) -> PoolCounts {
        let slots = self.slots.lock();
        let mut counts = PoolCounts {
            total: slots.len(),
            ..PoolCounts::default()
        };
        for slot in slots.values() {
            if slot.is_busy() {
                counts.busy += 1;
            }
            match slot.state {
                WorkerState::Idle => counts.idle += 1,
                WorkerState::Terminating => counts.terminating += 1,
                WorkerState::Busy => {}
            }
        }
        counts
    }

    /// Number of registered workers.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Whether the pool has no workers.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Diagnostics for every worker, ordered by id.
    pub fn workers(&self) -> Vec<WorkerInfo> {
        let now = Instant::now();
        self.slots
            .lock()
            .iter()
            .map(|(id, slot)| slot.info(*id, now))
            .collect()
    }

    /// Configured lower bound.
    pub const fn min_workers(&self) -> usize {
        self.min_workers
    }

    /// Configured upper bound.
    pub const fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Workers created since startup, replacements included.
    pub fn workers_created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Workers removed by scale-down, explicit removal or shutdown.
    pub fn workers_removed(&self) -> u64 {
        self.removed.load(Ordering::Relaxed)
    }

    /// Worker threads that exited unexpectedly.
    pub fn crashes(&self) -> u64 {
        self.crashes.load(Ordering::Relaxed)
    }
}

fn idle_longer_than<P>(
    slots: &BTreeMap<WorkerId, WorkerSlot<P>>,
    now: Instant,
    grace: Duration,
    limit: usize,
) -> Vec<WorkerId> {
    let mut candidates: Vec<(WorkerId, Instant)> = slots
        .iter()
        .filter(|(_, s)| {
            s.state == WorkerState::Idle && now.saturating_duration_since(s.last_used_at) >= grace
        })
        .map(|(id, s)| (*id, s.last_used_at))
        .collect();
    candidates.sort_by_key(|(_, used)| *used);
    candidates.into_iter().take(limit).map(|(id, _)| id).collect()
}

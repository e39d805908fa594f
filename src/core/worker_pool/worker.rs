//! Worker thread: one dedicated OS thread with its own single-threaded tokio runtime.
//!
//! A worker blocks on its command channel, runs one task at a time and reports back
//! over the scheduler's event channel. Dropping the command sender is the terminate
//! signal: the worker finishes whatever it is running and exits. Any exit, orderly or
//! by panic, is announced with [`WorkerEvent::Exited`] from a drop guard so the pool
//! can tell retirements from crashes.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error};

use crate::core::{AppResult, SchedulerError, Task, WorkerExecutor};
use crate::util::{TaskId, WorkerId};

/// Messages from worker threads to the scheduler's event loop.
#[derive(Debug)]
pub(crate) enum WorkerEvent<R> {
    /// The executor returned for a task.
    Finished {
        worker_id: WorkerId,
        task_id: TaskId,
        result: AppResult<R>,
        ran: Duration,
    },
    /// The worker thread is gone. `abnormal` is set when it unwound from a panic or
    /// never got its runtime running.
    Exited { worker_id: WorkerId, abnormal: bool },
}

/// Scheduler-side end of a worker thread.
pub(crate) struct WorkerThread<P> {
    pub(crate) commands: Sender<Task<P>>,
    pub(crate) join: JoinHandle<()>,
}

/// Announces thread exit even when the thread unwinds.
struct ExitGuard<R> {
    worker_id: WorkerId,
    events: UnboundedSender<WorkerEvent<R>>,
    orderly: bool,
}

impl<R> Drop for ExitGuard<R> {
    fn drop(&mut self) {
        let abnormal = !self.orderly || thread::panicking();
        let _ = self.events.send(WorkerEvent::Exited {
            worker_id: self.worker_id,
            abnormal,
        });
    }
}

/// Spawn a worker thread named `{prefix}-{id}`.
pub(crate) fn spawn_worker<P, R, E>(
    worker_id: WorkerId,
    name_prefix: &str,
    stack_size: usize,
    executor: E,
    events: UnboundedSender<WorkerEvent<R>>,
) -> Result<WorkerThread<P>, SchedulerError>
where
    P: Send + 'static,
    R: Send + 'static,
    E: WorkerExecutor<P, R>,
{
    // Capacity 1: a worker never holds more than the task it was dispatched.
    let (commands, inbox) = bounded::<Task<P>>(1);
    let join = thread::Builder::new()
        .name(format!("{name_prefix}-{}", worker_id.0))
        .stack_size(stack_size)
        .spawn(move || worker_main(worker_id, &inbox, &executor, events))
        .map_err(|e| SchedulerError::WorkerSpawn(e.to_string()))?;
    Ok(WorkerThread { commands, join })
}

fn worker_main<P, R, E>(
    worker_id: WorkerId,
    inbox: &Receiver<Task<P>>,
    executor: &E,
    events: UnboundedSender<WorkerEvent<R>>,
) where
    P: Send + 'static,
    R: Send + 'static,
    E: WorkerExecutor<P, R>,
{
    let mut guard = ExitGuard {
        worker_id,
        events: events.clone(),
        orderly: false,
    };

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(worker_id = %worker_id, error = %e, "failed to create worker runtime");
            return;
        }
    };
    debug!(worker_id = %worker_id, "worker thread started");

    // recv() fails once the pool drops the sender.
    while let Ok(task) = inbox.recv() {
        let task_id = task.meta.id;
        debug!(worker_id = %worker_id, task_id = %task_id, "worker executing task");

        let started = Instant::now();
        let result = rt.block_on(executor.execute(task.payload, task.meta));
        let ran = started.elapsed();

        let finished = WorkerEvent::Finished {
            worker_id,
            task_id,
            result,
            ran,
        };
        if events.send(finished).is_err() {
            debug!(worker_id = %worker_id, "scheduler gone, worker exiting");
            break;
        }
    }

    guard.orderly = true;
    debug!(worker_id = %worker_id, "worker thread exiting");
}

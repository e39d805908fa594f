//! Priority-aware backlog of tasks awaiting a worker.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use parking_lot::Mutex;

use crate::core::Task;
use crate::util::{Priority, TaskId};

/// Heap entry ordered by priority (highest first), then arrival sequence (lowest first).
struct QueuedTask<P> {
    seq: u64,
    task: Task<P>,
}

impl<P> QueuedTask<P> {
    const fn priority(&self) -> Priority {
        self.task.meta.priority
    }
}

impl<P> PartialEq for QueuedTask<P> {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl<P> Eq for QueuedTask<P> {}

impl<P> PartialOrd for QueuedTask<P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<P> Ord for QueuedTask<P> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority()
            .cmp(&other.priority())
            // Max-heap: the earlier arrival must compare greater.
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct QueueInner<P> {
    heap: BinaryHeap<QueuedTask<P>>,
    next_seq: u64,
}

/// Thread-safe task queue.
///
/// Tasks are dequeued by priority class, FIFO within a class. Arrival order is an
/// internal sequence number, so tasks submitted within the same millisecond keep
/// their submission order. Enqueue never blocks or fails; any backlog bound is
/// enforced by the scheduler at submission time.
pub struct TaskQueue<P> {
    inner: Mutex<QueueInner<P>>,
    len: AtomicUsize,
}

impl<P> Default for TaskQueue<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> TaskQueue<P> {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                heap: BinaryHeap::new(),
                next_seq: 0,
            }),
            len: AtomicUsize::new(0),
        }
    }

    /// Insert at the tail of the task's priority class. O(log n).
    pub fn enqueue(&self, task: Task<P>) {
        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.heap.push(QueuedTask { seq, task });
        self.len.store(inner.heap.len(), AtomicOrdering::Release);
    }

    /// Remove the highest-priority, oldest task. Each task is returned to exactly one
    /// caller. O(log n).
    pub fn dequeue(&self) -> Option<Task<P>> {
        let mut inner = self.inner.lock();
        let task = inner.heap.pop().map(|q| q.task);
        self.len.store(inner.heap.len(), AtomicOrdering::Release);
        task
    }

    /// Withdraw a specific task, e.g. one whose deadline passed while queued. O(n).
    pub fn remove(&self, id: TaskId) -> Option<Task<P>> {
        let mut inner = self.inner.lock();
        if !inner.heap.iter().any(|q| q.task.meta.id == id) {
            return None;
        }
        let (hit, keep): (Vec<_>, Vec<_>) = std::mem::take(&mut inner.heap)
            .into_vec()
            .into_iter()
            .partition(|q| q.task.meta.id == id);
        inner.heap = keep.into();
        self.len.store(inner.heap.len(), AtomicOrdering::Release);
        hit.into_iter().next().map(|q| q.task)
    }

    /// Empty the queue, returning tasks in dequeue order.
    pub fn drain_all(&self) -> Vec<Task<P>> {
        let mut inner = self.inner.lock();
        let heap = std::mem::take(&mut inner.heap);
        self.len.store(0, AtomicOrdering::Release);
        drop(inner);
        heap.into_sorted_vec().into_iter().rev().map(|q| q.task).collect()
    }

    /// Number of queued tasks. Lock-free.
    pub fn len(&self) -> usize {
        self.len.load(AtomicOrdering::Acquire)
    }

    /// Whether the queue is empty. Lock-free.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

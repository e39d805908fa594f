//! Benchmarks for the adaptive scheduler.
//!
//! Benchmarks cover:
//! - Queue operations (enqueue/dequeue, mixed priorities, removal)
//! - End-to-end submission throughput through real worker threads

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::time::Duration;

use adaptive_scheduler::builders::SchedulerBuilder;
use adaptive_scheduler::config::SchedulerConfig;
use adaptive_scheduler::core::{AppResult, Task, TaskMetadata, TaskQueue, TaskSpec, WorkerExecutor};
use adaptive_scheduler::util::{Priority, TaskId};

use async_trait::async_trait;
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::runtime::Runtime;

// ============================================================================
// Test Payload and Executor
// ============================================================================

#[derive(Clone)]
struct BenchExecutor;

#[async_trait]
impl WorkerExecutor<u64, u64> for BenchExecutor {
    async fn execute(&self, payload: u64, _meta: TaskMetadata) -> AppResult<u64> {
        // Simulate minimal work
        Ok(payload.wrapping_mul(31))
    }
}

fn build_task(priority: Priority) -> Task<u64> {
    Task::new(
        TaskMetadata::new(TaskId::new(), priority, Duration::from_secs(30)),
        0,
    )
}

// ============================================================================
// Queue Benchmarks
// ============================================================================

fn bench_queue_enqueue_dequeue(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_enqueue_dequeue");

    for size in [100u64, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let q = TaskQueue::new();
                for _ in 0..size {
                    q.enqueue(build_task(Priority::Normal));
                }
                while let Some(task) = q.dequeue() {
                    black_box(task);
                }
            });
        });
    }
    group.finish();
}

fn bench_queue_mixed_priorities(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_mixed_priorities");

    for size in [100u64, 1_000, 5_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let mut rng = StdRng::seed_from_u64(7);
            b.iter(|| {
                let q = TaskQueue::new();
                for _ in 0..size {
                    let priority = if rng.random_bool(0.25) {
                        Priority::High
                    } else {
                        Priority::Normal
                    };
                    q.enqueue(build_task(priority));
                }
                let mut count = 0;
                while q.dequeue().is_some() {
                    count += 1;
                }
                black_box(count);
            });
        });
    }
    group.finish();
}

fn bench_queue_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_remove");

    for size in [100u64, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let q = TaskQueue::new();
                let mut ids = Vec::new();
                for i in 0..size {
                    let task = build_task(Priority::Normal);
                    if i % 2 == 0 {
                        ids.push(task.meta.id);
                    }
                    q.enqueue(task);
                }
                // Timed-out tasks are withdrawn from the middle of the queue.
                for id in ids {
                    black_box(q.remove(id));
                }
            });
        });
    }
    group.finish();
}

// ============================================================================
// Scheduler Benchmarks
// ============================================================================

fn bench_end_to_end_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler_throughput");
    let rt = Runtime::new().unwrap();

    for workers in [1usize, 4] {
        let config = SchedulerConfig::new()
            .with_min_workers(workers)
            .with_max_workers(workers)
            .with_scale_interval(Duration::from_secs(3600));
        let scheduler = SchedulerBuilder::new(config)
            .with_runtime(rt.handle().clone())
            .start(BenchExecutor)
            .unwrap();

        group.throughput(Throughput::Elements(256));
        group.bench_with_input(BenchmarkId::new("workers", workers), &workers, |b, _| {
            b.to_async(&rt).iter(|| async {
                let handles: Vec<_> = (0..256u64)
                    .map(|i| scheduler.submit(TaskSpec::new(i)).unwrap())
                    .collect();
                for outcome in join_all(handles).await {
                    black_box(outcome.unwrap());
                }
            });
        });

        rt.block_on(scheduler.stop(Duration::from_secs(1)));
    }
    group.finish();
}

criterion_group!(
    queue_benches,
    bench_queue_enqueue_dequeue,
    bench_queue_mixed_priorities,
    bench_queue_remove
);

criterion_group!(scheduler_benches, bench_end_to_end_throughput);

criterion_main!(queue_benches, scheduler_benches);

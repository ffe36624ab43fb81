//! Block pool, stack and queue benchmarks
//!
//! Compares the pooled structures against their closest std baselines under
//! single-threaded and contended workloads.

use std::collections::VecDeque;
use std::hint::black_box;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use nebula_lockfree::{BlockPool, PoolConfig, Queue, Stack};

/// Benchmark single allocate/release cycle
fn bench_pool_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_cycle");

    group.bench_function("block_pool", |b| {
        let pool = BlockPool::<u64>::with_config(PoolConfig::production()).unwrap();
        b.iter(|| {
            let mut slot = pool.allocate().unwrap();
            slot.write(black_box(7));
            black_box(slot.index());
        });
    });

    // System allocator (baseline)
    group.bench_function("box", |b| {
        b.iter(|| black_box(Box::new(black_box(7u64))));
    });

    group.finish();
}

/// Benchmark batch push/pop and enqueue/dequeue
fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_100");
    group.throughput(Throughput::Elements(100));

    group.bench_function("stack", |b| {
        let stack = Stack::with_config(PoolConfig::production()).unwrap();
        b.iter(|| {
            for i in 0..100u64 {
                stack.push(i).unwrap();
            }
            while let Some(v) = stack.pop() {
                black_box(v);
            }
        });
    });

    group.bench_function("queue", |b| {
        let queue = Queue::with_config(PoolConfig::production()).unwrap();
        b.iter(|| {
            for i in 0..100u64 {
                queue.enqueue(i).unwrap();
            }
            while let Some(v) = queue.dequeue() {
                black_box(v);
            }
        });
    });

    group.bench_function("vec_deque", |b| {
        let mut deque = VecDeque::with_capacity(100);
        b.iter(|| {
            for i in 0..100u64 {
                deque.push_back(i);
            }
            while let Some(v) = deque.pop_front() {
                black_box(v);
            }
        });
    });

    group.finish();
}

fn contended<F>(threads: usize, per_thread: usize, op: F)
where
    F: Fn(usize) + Send + Sync + 'static,
{
    let op = Arc::new(op);
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let op = Arc::clone(&op);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..per_thread {
                    op(i);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

/// Benchmark contended producers/consumers
fn bench_contended(c: &mut Criterion) {
    const PER_THREAD: usize = 1_000;

    let mut group = c.benchmark_group("contended");

    for threads in [2, 4, 8] {
        group.throughput(Throughput::Elements((threads * PER_THREAD) as u64));

        group.bench_with_input(BenchmarkId::new("queue", threads), &threads, |b, &threads| {
            let queue = Arc::new(Queue::with_config(PoolConfig::production()).unwrap());
            b.iter(|| {
                let queue = Arc::clone(&queue);
                contended(threads, PER_THREAD, move |i| {
                    if i % 2 == 0 {
                        let _ = queue.enqueue(i);
                    } else {
                        black_box(queue.dequeue());
                    }
                });
            });
        });

        group.bench_with_input(BenchmarkId::new("stack", threads), &threads, |b, &threads| {
            let stack = Arc::new(Stack::with_config(PoolConfig::production()).unwrap());
            b.iter(|| {
                let stack = Arc::clone(&stack);
                contended(threads, PER_THREAD, move |i| {
                    if i % 2 == 0 {
                        let _ = stack.push(i);
                    } else {
                        black_box(stack.pop());
                    }
                });
            });
        });

        // Mutex (baseline)
        group.bench_with_input(BenchmarkId::new("mutex_vec_deque", threads), &threads, |b, &threads| {
            let deque = Arc::new(Mutex::new(VecDeque::with_capacity(1024)));
            b.iter(|| {
                let deque = Arc::clone(&deque);
                contended(threads, PER_THREAD, move |i| {
                    let mut guard = deque.lock().unwrap();
                    if i % 2 == 0 {
                        guard.push_back(i);
                    } else {
                        black_box(guard.pop_front());
                    }
                });
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pool_cycle, bench_batch, bench_contended);
criterion_main!(benches);

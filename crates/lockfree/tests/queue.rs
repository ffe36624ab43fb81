//! Michael–Scott queue integration tests.
#![cfg(not(loom))]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use nebula_lockfree::{PoolConfig, Queue};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[test]
fn test_spsc_fifo() {
    const COUNT: usize = 20_000;

    let queue = Arc::new(Queue::with_capacity(64).unwrap());
    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            for i in 0..COUNT {
                let mut value = i;
                while let Err(back) = queue.enqueue(value) {
                    value = back;
                    thread::yield_now();
                }
            }
        })
    };

    let mut expected = 0;
    while expected < COUNT {
        match queue.dequeue() {
            Some(value) => {
                assert_eq!(value, expected);
                expected += 1;
            },
            None => thread::yield_now(),
        }
    }
    producer.join().unwrap();
    assert!(queue.is_empty());
}

#[test]
fn test_mpmc_per_producer_order() {
    const PRODUCERS: usize = 4;
    const CONSUMERS: usize = 4;
    const PER_PRODUCER: usize = 5_000;

    let queue = Queue::with_config(PoolConfig::debug().with_capacity(32)).unwrap();
    let done = AtomicBool::new(false);

    let consumed: Vec<Vec<(usize, usize)>> = thread::scope(|s| {
        let consumers: Vec<_> = (0..CONSUMERS)
            .map(|_| {
                let queue = &queue;
                let done = &done;
                s.spawn(move || {
                    let mut seen = Vec::new();
                    loop {
                        match queue.dequeue() {
                            Some(item) => seen.push(item),
                            None if done.load(Ordering::Acquire) => {
                                // Producers finished before `done`; one more
                                // pass drains anything still linked.
                                while let Some(item) = queue.dequeue() {
                                    seen.push(item);
                                }
                                return seen;
                            },
                            None => thread::yield_now(),
                        }
                    }
                })
            })
            .collect();

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = &queue;
                s.spawn(move || {
                    for i in 0..PER_PRODUCER {
                        let mut item = (p, i);
                        while let Err(back) = queue.enqueue(item) {
                            item = back;
                            thread::yield_now();
                        }
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }
        done.store(true, Ordering::Release);

        consumers.into_iter().map(|c| c.join().unwrap()).collect()
    });

    // Each consumer sees every producer's values in increasing order.
    for seen in &consumed {
        let mut last = [None; PRODUCERS];
        for &(p, i) in seen {
            assert!(last[p].is_none_or(|prev| prev < i));
            last[p] = Some(i);
        }
    }

    let total: usize = consumed.iter().map(Vec::len).sum();
    assert_eq!(total, PRODUCERS * PER_PRODUCER);
    assert_eq!(queue.pool().in_use(), 1);

    let stats = queue.pool().stats().unwrap();
    // The dummy stays allocated.
    assert_eq!(stats.allocations, stats.releases + 1);
}

#[test]
fn test_churn_never_leaks_slots() {
    const THREADS: usize = 6;
    const ROUNDS: usize = 10_000;

    let queue = Queue::with_capacity(4).unwrap();
    thread::scope(|s| {
        for t in 0..THREADS {
            let queue = &queue;
            s.spawn(move || {
                for round in 0..ROUNDS {
                    if (t + round) % 2 == 0 {
                        let _ = queue.enqueue(round);
                    } else {
                        queue.dequeue();
                    }
                }
            });
        }
    });

    while queue.dequeue().is_some() {}
    assert_eq!(queue.pool().in_use(), 1);
    let snapshot = queue.pool().snapshot();
    assert_eq!(snapshot.in_use.len(), 1);
    assert_eq!(snapshot.unaccounted(), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn queue_matches_vecdeque_model(
        capacity in 1usize..12,
        ops in proptest::collection::vec(proptest::option::of(any::<u32>()), 1..128),
    ) {
        let queue = Queue::with_capacity(capacity).unwrap();
        let mut model = VecDeque::new();

        for op in ops {
            match op {
                Some(value) => {
                    let result = queue.enqueue(value);
                    if model.len() < capacity {
                        prop_assert_eq!(result, Ok(()));
                        model.push_back(value);
                    } else {
                        prop_assert_eq!(result, Err(value));
                    }
                },
                None => prop_assert_eq!(queue.dequeue(), model.pop_front()),
            }
            prop_assert_eq!(queue.is_empty(), model.is_empty());
            prop_assert_eq!(queue.pool().in_use(), model.len() + 1);
        }
    }
}

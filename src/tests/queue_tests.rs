// src/tests/queue_tests.rs

//! tests for `queue.rs`

use std::thread;
use std::time::{Duration, Instant};

use crate::common::ResultFind;
use crate::engine::queue::WorkQueue;

#[test]
fn test_push_pop_fifo() {
    let queue: WorkQueue<u32> = WorkQueue::new(8);
    for value in 0..5u32 {
        queue.push(value).unwrap();
    }
    assert_eq!(queue.len(), 5);
    for value in 0..5u32 {
        assert!(matches!(queue.pop(), ResultFind::Found(found) if found == value));
    }
}

#[test]
fn test_pop_after_close_drains_then_done() {
    let queue: WorkQueue<u32> = WorkQueue::new(8);
    queue.push(1).unwrap();
    queue.push(2).unwrap();
    queue.close(false);
    assert!(matches!(queue.pop(), ResultFind::Found(1)));
    assert!(matches!(queue.pop(), ResultFind::Found(2)));
    assert!(queue.pop().is_done());
}

#[test]
fn test_push_after_close_returns_item() {
    let queue: WorkQueue<u32> = WorkQueue::new(8);
    queue.close(false);
    assert_eq!(queue.push(7), Err(7));
}

/// Closing with `abort=true` does not deliver buffered items.
#[test]
fn test_close_abort_discards_buffered() {
    let queue: WorkQueue<u32> = WorkQueue::new(8);
    queue.push(1).unwrap();
    queue.close(true);
    assert!(queue.pop().is_done());
}

#[test]
fn test_close_idempotent() {
    let queue: WorkQueue<u32> = WorkQueue::new(8);
    queue.close(false);
    queue.close(true);
    queue.close(false);
    assert!(queue.is_closed());
}

/// A consumer blocked on `pop` of an empty queue must be released within
/// bounded time of `close(abort=true)`, with a "done" signal, not a hang.
#[test]
fn test_close_abort_unblocks_blocked_consumer() {
    let queue: WorkQueue<u32> = WorkQueue::new(8);
    let consumer = {
        let queue = queue.clone();
        thread::spawn(move || {
            let start: Instant = Instant::now();
            let result = queue.pop();
            (result, start.elapsed())
        })
    };
    thread::sleep(Duration::from_millis(100));
    queue.close(true);
    let (result, elapsed) = consumer.join().unwrap();
    assert!(result.is_done());
    assert!(elapsed < Duration::from_secs(2), "pop blocked for {:?}", elapsed);
}

/// A producer blocked on `push` of a full queue must be released within
/// bounded time of `close(abort=true)`, getting its item back, even when
/// no consumer ever drains the buffered items.
#[test]
fn test_close_abort_unblocks_blocked_producer() {
    let queue: WorkQueue<u32> = WorkQueue::new(2);
    queue.push(1).unwrap();
    queue.push(2).unwrap();
    let producer = {
        let queue = queue.clone();
        thread::spawn(move || {
            let start: Instant = Instant::now();
            let result = queue.push(3);
            (result, start.elapsed())
        })
    };
    thread::sleep(Duration::from_millis(100));
    queue.close(true);
    let (result, elapsed) = producer.join().unwrap();
    assert_eq!(result, Err(3));
    assert!(elapsed < Duration::from_secs(2), "push blocked for {:?}", elapsed);
}

/// Multiple producers and consumers; every pushed item is popped exactly
/// once.
#[test]
fn test_mpmc_all_items_delivered() {
    const PRODUCERS: usize = 3;
    const ITEMS: usize = 100;
    let queue: WorkQueue<usize> = WorkQueue::new(16);
    let mut producers = Vec::new();
    for producer in 0..PRODUCERS {
        let queue = queue.clone();
        producers.push(thread::spawn(move || {
            for item in 0..ITEMS {
                queue.push(producer * ITEMS + item).unwrap();
            }
        }));
    }
    let mut consumers = Vec::new();
    for _ in 0..2 {
        let queue = queue.clone();
        consumers.push(thread::spawn(move || {
            let mut received: Vec<usize> = Vec::new();
            loop {
                match queue.pop() {
                    ResultFind::Found(item) => received.push(item),
                    ResultFind::Done => break,
                    ResultFind::Err(err) => panic!("pop error {:?}", err),
                }
            }
            received
        }));
    }
    for producer in producers.into_iter() {
        producer.join().unwrap();
    }
    queue.close(false);
    let mut all: Vec<usize> = Vec::new();
    for consumer in consumers.into_iter() {
        all.extend(consumer.join().unwrap());
    }
    all.sort_unstable();
    let expected: Vec<usize> = (0..PRODUCERS * ITEMS).collect();
    assert_eq!(all, expected);
}

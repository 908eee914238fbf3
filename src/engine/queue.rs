// src/engine/queue.rs

//! Bounded multi-producer/multi-consumer [`WorkQueue`] connecting
//! Collector → Extraction Workers → result drain.
//!
//! A full queue back-pressures producers (`push` blocks): intentional
//! flow control so a fast collector cannot unboundedly outpace slow
//! workers or a slow storage writer. `close(abort)` releases blocked
//! producers (their item handed back) and blocked consumers (a
//! distinguishable "done" signal) instead of a hang; with `abort=true`,
//! items still buffered are not delivered.
//!
//! [`WorkQueue`]: WorkQueue

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ::crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use ::si_trace_print::{defn, defx, defñ};

use crate::common::ResultFind;

/// How long a blocked `push` or `pop` waits before re-checking the
/// close and abort state. Bounds the release time of threads blocked
/// across a close.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// `pop` result: `Found(item)`, `Done` (queue closed and, absent abort,
/// drained), or `Err` (never currently produced; reserved by the
/// [`ResultFind`] shape).
///
/// [`ResultFind`]: crate::common::ResultFind
pub type ResultPop<T> = ResultFind<T, std::io::Error>;

struct WorkQueueInner<T> {
    sender: Mutex<Option<Sender<T>>>,
    receiver: Receiver<T>,
    aborted: AtomicBool,
}

/// Bounded MPMC queue. Cheap to clone; clones share the same queue.
pub struct WorkQueue<T> {
    inner: Arc<WorkQueueInner<T>>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> WorkQueue<T> {
        WorkQueue {
            inner: self.inner.clone(),
        }
    }
}

impl<T> WorkQueue<T> {
    pub fn new(capacity: usize) -> WorkQueue<T> {
        defñ!("({})", capacity);
        let (sender, receiver) = bounded::<T>(capacity);
        WorkQueue {
            inner: Arc::new(WorkQueueInner {
                sender: Mutex::new(Some(sender)),
                receiver,
                aborted: AtomicBool::new(false),
            }),
        }
    }

    /// Push one item, blocking while the queue is full.
    /// Returns the item back if the queue has been closed; a producer
    /// blocked on a full queue is released within bounded time of
    /// `close`, also getting its item back.
    pub fn push(
        &self,
        item: T,
    ) -> Result<(), T> {
        let sender: Sender<T> = {
            // clone out of the lock so the send does not hold it
            let guard = match self.inner.sender.lock() {
                Ok(val) => val,
                Err(poisoned) => poisoned.into_inner(),
            };
            match guard.as_ref() {
                Some(sender) => sender.clone(),
                None => return Err(item),
            }
        };
        let mut item: T = item;
        loop {
            match sender.send_timeout(item, POLL_INTERVAL) {
                Ok(_) => return Ok(()),
                Err(SendTimeoutError::Disconnected(returned)) => return Err(returned),
                Err(SendTimeoutError::Timeout(returned)) => {
                    item = returned;
                    // close() may have run while this send waited; the
                    // cloned sender keeps the channel itself connected
                    if self.inner.aborted.load(Ordering::Relaxed) || self.is_closed() {
                        return Err(item);
                    }
                }
            }
        }
    }

    /// Pop one item, blocking while the queue is empty and not closed.
    /// Returns `Done` once the queue is closed and drained, or as soon as
    /// practical after `close(true)` regardless of buffered items.
    pub fn pop(&self) -> ResultPop<T> {
        loop {
            if self.inner.aborted.load(Ordering::Relaxed) {
                return ResultFind::Done;
            }
            match self.inner.receiver.recv_timeout(POLL_INTERVAL) {
                Ok(item) => return ResultFind::Found(item),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return ResultFind::Done,
            }
        }
    }

    /// Close the queue: no further pushes succeed. With `abort=true`,
    /// blocked and future `pop`s return `Done` without draining buffered
    /// items. Idempotent.
    pub fn close(
        &self,
        abort: bool,
    ) {
        defn!("(abort {})", abort);
        if abort {
            self.inner.aborted.store(true, Ordering::Relaxed);
        }
        let mut guard = match self.inner.sender.lock() {
            Ok(val) => val,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = None;
        defx!();
    }

    /// Approximate count of currently buffered items.
    pub fn len(&self) -> usize {
        self.inner.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.receiver.is_empty()
    }

    /// Has `close` been called?
    pub fn is_closed(&self) -> bool {
        let guard = match self.inner.sender.lock() {
            Ok(val) => val,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.is_none()
    }
}

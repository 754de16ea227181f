//! Message queue — unbounded MPMC FIFO for inter-task handoff
//!
//! xQueueSend / xQueueReceive on a host OS: a mutex-guarded deque plus a
//! condition variable for blocked receivers.
//!
//! Unlike a real RTOS queue there is no capacity: `send` never blocks and
//! never rejects an item. If producers outpace consumers, memory grows.
//! Bounded behavior would need an explicit backpressure policy and is not
//! provided here.
//!
//! Author: Moroya Sakamoto

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use thiserror::Error;

/// `receive` gave up waiting; nothing was consumed
///
/// An expected outcome, not a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("receive timed out after {waited:?}")]
pub struct ReceiveTimeout {
    /// The timeout that elapsed
    pub waited: Duration,
}

/// Thread-safe FIFO shared between tasks (wrap in `Arc`)
///
/// Each item is delivered to exactly one receiver. Items already enqueued
/// leave in insertion order no matter how many receivers compete.
pub struct MessageQueue<T> {
    items: Mutex<VecDeque<T>>,
    available: Condvar,
}

impl<T> MessageQueue<T> {
    /// Create a new empty queue
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    /// Append an item to the tail and wake at most one waiting receiver
    pub fn send(&self, item: T) {
        self.items.lock().push_back(item);
        self.available.notify_one();
    }

    /// Remove the head item, waiting for one if the queue is empty
    ///
    /// `None` waits indefinitely. `Some(timeout)` waits at most that long
    /// (never less) and returns [`ReceiveTimeout`] if nothing arrived.
    pub fn receive(&self, timeout: Option<Duration>) -> Result<T, ReceiveTimeout> {
        let mut items = self.items.lock();
        if let Some(item) = items.pop_front() {
            return Ok(item);
        }

        let Some(timeout) = timeout else {
            return Ok(self.wait_for_item(items));
        };
        // A timeout too large to represent as an Instant is an unbounded wait.
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Ok(self.wait_for_item(items));
        };

        loop {
            if self.available.wait_until(&mut items, deadline).timed_out() {
                // An item may have landed between the timeout and relocking.
                return items.pop_front().ok_or(ReceiveTimeout { waited: timeout });
            }
            if let Some(item) = items.pop_front() {
                return Ok(item);
            }
        }
    }

    /// Blocking receive with no timeout
    pub fn recv(&self) -> T {
        self.wait_for_item(self.items.lock())
    }

    fn wait_for_item(&self, mut items: MutexGuard<'_, VecDeque<T>>) -> T {
        loop {
            if let Some(item) = items.pop_front() {
                return item;
            }
            self.available.wait(&mut items);
        }
    }

    /// Non-blocking receive (zero-timeout poll)
    pub fn try_receive(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Number of items waiting
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Is the queue empty?
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl<T> Default for MessageQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> core::fmt::Debug for MessageQueue<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MessageQueue")
            .field("len", &self.len())
            .finish()
    }
}

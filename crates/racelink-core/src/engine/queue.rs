//! Bounded blocking queue between a producer and a dispatcher
//!
//! The queue is owned by a supervisor and shared with exactly one writer and
//! one reader thread. Items come out in the order they went in; the queue is
//! never iterated, only pushed and popped.

use crate::error::QueueError;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Default number of commands a queue holds before pushes start waiting
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Bounded FIFO with timed push and pop
#[derive(Debug)]
pub struct CommandQueue<T> {
    items: Mutex<VecDeque<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T> CommandQueue<T> {
    /// Create a queue holding at most `capacity` items
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_QUEUE_CAPACITY))),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    /// Push an item, waiting up to `timeout` for room
    ///
    /// On timeout the item is dropped and [`QueueError::Full`] returned.
    pub fn push_timeout(&self, item: T, timeout: Duration) -> Result<(), QueueError> {
        let deadline = Instant::now() + timeout;
        let mut items = self.items.lock();

        while items.len() >= self.capacity {
            if self.not_full.wait_until(&mut items, deadline).timed_out()
                && items.len() >= self.capacity
            {
                return Err(QueueError::Full {
                    waited_ms: timeout.as_millis() as u64,
                });
            }
        }

        items.push_back(item);
        drop(items);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Push without waiting
    pub fn try_push(&self, item: T) -> Result<(), QueueError> {
        self.push_timeout(item, Duration::ZERO)
    }

    /// Pop the oldest item, waiting up to `timeout` for one to arrive
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut items = self.items.lock();

        loop {
            if let Some(item) = items.pop_front() {
                drop(items);
                self.not_full.notify_one();
                return Some(item);
            }
            if self.not_empty.wait_until(&mut items, deadline).timed_out() {
                let item = items.pop_front();
                if item.is_some() {
                    drop(items);
                    self.not_full.notify_one();
                }
                return item;
            }
        }
    }

    /// Pop without waiting
    pub fn try_pop(&self) -> Option<T> {
        let item = self.items.lock().pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Discard every queued item, returning how many were dropped
    pub fn clear(&self) -> usize {
        let mut items = self.items.lock();
        let dropped = items.len();
        items.clear();
        drop(items);
        self.not_full.notify_all();
        dropped
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// True if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Maximum number of queued items
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> Default for CommandQueue<T> {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

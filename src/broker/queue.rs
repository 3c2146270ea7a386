//! Bounded FIFO buffer
//!
//! `BoundedQueue` is a plain data structure; it takes `&mut self` and leaves
//! synchronization to its owner (the broker keeps each queue behind its own
//! mutex so every operation below is one atomic step for remote callers).

use std::collections::VecDeque;

/// Default capacity of both broker queues.
pub const DEFAULT_CAPACITY: usize = 10;

/// Returned by [`BoundedQueue::put`] when the queue is full. Hands the
/// rejected item back to the caller.
#[derive(Debug, PartialEq, Eq)]
pub struct QueueFull<T>(pub T);

#[derive(Debug)]
pub struct BoundedQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `item` at the tail, or reject it if `len() == capacity()`.
    /// A rejected put leaves the queue untouched.
    pub fn put(&mut self, item: T) -> Result<(), QueueFull<T>> {
        if self.items.len() >= self.capacity {
            return Err(QueueFull(item));
        }
        self.items.push_back(item);
        Ok(())
    }

    /// Remove and return the oldest item.
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// The oldest item, left in place.
    pub fn peek(&self) -> Option<&T> {
        self.items.front()
    }

    /// Drop every item, returning how many there were.
    pub fn clear(&mut self) -> usize {
        let n = self.items.len();
        self.items.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items from head (oldest) to tail.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T> Default for BoundedQueue<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

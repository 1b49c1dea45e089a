//! Prefetch Queue Module
//!
//! Max-priority queue with FIFO order among equal priorities.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Queued item with its ordering key.
#[derive(Debug)]
struct Queued<T> {
    priority: i32,
    sequence: Reverse<u64>,
    item: T,
}

impl<T> PartialEq for Queued<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl<T> Eq for Queued<T> {}

impl<T> PartialOrd for Queued<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Queued<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first, then lower sequence (earlier enqueue) first
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.sequence.cmp(&other.sequence))
    }
}

// == Prefetch Queue ==
/// Binary heap keyed on `(priority, Reverse(sequence))`.
///
/// Push and pop are O(log n).
#[derive(Debug)]
pub struct PrefetchQueue<T> {
    heap: BinaryHeap<Queued<T>>,
    next_sequence: u64,
}

impl<T> Default for PrefetchQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PrefetchQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_sequence: 0,
        }
    }

    /// Enqueues `item`.
    pub fn push(&mut self, priority: i32, item: T) {
        let sequence = Reverse(self.next_sequence);
        self.next_sequence += 1;
        self.heap.push(Queued {
            priority,
            sequence,
            item,
        });
    }

    /// Removes the highest priority, earliest enqueued item.
    pub fn pop(&mut self) -> Option<T> {
        self.heap.pop().map(|q| q.item)
    }

    /// Priority of the item `pop` would return.
    pub fn peek_priority(&self) -> Option<i32> {
        self.heap.peek().map(|q| q.priority)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drops every queued item.
    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

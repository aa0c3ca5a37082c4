//! Request priority and the ordered pending set.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Dispatch priority. Higher priorities are taken first; equal priorities
/// are taken in the order they were added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low = 0,
    #[default]
    Normal = 1,
    High = 2,
    Immediate = 3,
}

struct Pending<T> {
    priority: Priority,
    sequence: u64,
    item: T,
}

impl<T> PartialEq for Pending<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl<T> Eq for Pending<T> {}

impl<T> PartialOrd for Pending<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Pending<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            // lower sequence first
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Max-heap on (priority, reverse sequence).
pub(crate) struct PendingQueue<T> {
    heap: BinaryHeap<Pending<T>>,
}

impl<T> PendingQueue<T> {
    pub(crate) fn new() -> Self {
        Self { heap: BinaryHeap::new() }
    }

    pub(crate) fn push(&mut self, item: T, priority: Priority, sequence: u64) {
        self.heap.push(Pending { priority, sequence, item });
    }

    pub(crate) fn pop(&mut self) -> Option<T> {
        self.heap.pop().map(|p| p.item)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> {
        self.heap.iter().map(|p| &p.item)
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }
}

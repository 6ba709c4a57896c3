// src/streaming/queue.rs
// Min-priority queue of adjustments. Owned and drained exclusively by the
// lens's management pass; never shared across threads.

use std::collections::BinaryHeap;

use crate::streaming::types::Adjustment;

struct QueueItem {
    priority: f32,
    /// Monotonic insertion tie-breaker so equal priorities stay FIFO.
    seq: u64,
    adjustment: Adjustment,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueueItem {}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap; invert so the numerically smallest
        // priority (then oldest seq) comes out first.
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
pub struct AdjustmentQueue {
    heap: BinaryHeap<QueueItem>,
    next_seq: u64,
}

impl AdjustmentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, priority: f32, adjustment: Adjustment) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(QueueItem {
            priority,
            seq,
            adjustment,
        });
    }

    pub fn dequeue(&mut self) -> Option<Adjustment> {
        self.heap.pop().map(|item| item.adjustment)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

use std::{
    cmp::Reverse,
    collections::BinaryHeap,
    time::{Duration, Instant},
};

use crate::media::HandleId;

/// What a timer is guarding when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TimerTarget {
    /// Deadline of the warm-up running on this handle
    Warmup(HandleId),
    /// Deadline of the active clip load running on this handle
    Load(HandleId),
}

/// Pending deadlines, earliest first.
///
/// Timers are never cancelled: whoever receives a fired timer checks
/// whether it still cares about it.
#[derive(Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<(Instant, u64, TimerTarget)>>,
    seq: u64,
}

impl TimerQueue {
    pub fn schedule(&mut self, now: Instant, after: Duration, target: TimerTarget) {
        // The sequence number keeps timers with the same deadline in scheduling order
        self.seq += 1;
        self.heap.push(Reverse((now + after, self.seq, target)));
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse((deadline, _, _))| *deadline)
    }

    /// Pop the earliest timer if its deadline has been reached
    pub fn pop_due(&mut self, now: Instant) -> Option<TimerTarget> {
        match self.heap.peek() {
            Some(Reverse((deadline, _, _))) if *deadline <= now => {
                self.heap.pop().map(|Reverse((_, _, target))| target)
            }
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.heap.len()
    }
}

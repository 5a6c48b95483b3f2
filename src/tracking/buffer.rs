//! buffer.rs
//! Fixed-capacity FIFO between the producer and the publisher.
//!
//! - Enqueue never blocks: a full buffer drops the NEWEST sample so the
//!   oldest unsent backlog stays contiguous.
//! - Dequeue is two-phase: `peek_oldest` is non-destructive, `commit_dequeue`
//!   removes the head only once delivery has been confirmed.

use parking_lot::{Condvar, Mutex};
use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};
use log::warn;

use crate::tracking::sample::Sample;

/// Number of slots needed to hold `buffer_ms` worth of samples taken every `period_ms`.
pub fn capacity_for(buffer_ms: u64, period_ms: u64) -> usize {
    buffer_ms.div_ceil(period_ms) as usize
}

// Slots allocated up front; the deque grows on demand past this.
const PREALLOCATED_SLOTS: usize = 1024;

pub struct SampleBuffer {
    slots: Mutex<VecDeque<Sample>>,
    not_empty: Condvar,
    capacity: usize,
}

impl SampleBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(VecDeque::with_capacity(capacity.min(PREALLOCATED_SLOTS))),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Returns `false` and leaves the buffer untouched when full.
    pub fn try_enqueue(&self, sample: Sample) -> bool {
        let mut slots = self.slots.lock();
        if slots.len() >= self.capacity {
            return false;
        }
        slots.push_back(sample);
        drop(slots);
        self.not_empty.notify_one();
        true
    }

    /// Copy of the oldest sample, waiting up to `timeout` for one to arrive.
    pub fn peek_oldest(&self, timeout: Duration) -> Option<Sample> {
        let deadline = Instant::now() + timeout;
        let mut slots = self.slots.lock();
        while slots.is_empty() {
            if self.not_empty.wait_until(&mut slots, deadline).timed_out() {
                return slots.front().copied();
            }
        }
        slots.front().copied()
    }

    /// Removes the sample last returned by `peek_oldest`.
    pub fn commit_dequeue(&self) -> bool {
        let removed = self.slots.lock().pop_front().is_some();
        if !removed {
            warn!("[Buffer] commit on empty buffer; nothing removed");
        }
        removed
    }

    /// Snapshot of buffered samples, oldest first.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.slots.lock().iter().copied().collect()
    }
}

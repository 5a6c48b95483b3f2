//! Stack headroom estimate for the long-running loop threads.
//!
//! `StackMonitor::new` records the address of a local at thread entry as the
//! base. Deep call sites (generator step, payload encoding, transport publish)
//! call [`mark_depth`], which keeps the deepest distance from that base seen on
//! the current thread. `check()` folds that mark into the low-water estimate.
//! Advisory only: nothing is corrected, a warning is logged.

use std::{cell::Cell, hint::black_box};
use log::{debug, warn};

thread_local! {
    // Base address of this thread's monitor; 0 when the thread is unmonitored.
    static BASE: Cell<usize> = const { Cell::new(0) };
    // Deepest distance from BASE recorded by `mark_depth()`.
    static DEEPEST: Cell<usize> = const { Cell::new(0) };
}

#[inline(always)]
fn current_address() -> usize {
    let marker = 0u8;
    black_box(&marker) as *const u8 as usize
}

/// Records the current stack depth for this thread's monitor, if any.
#[inline(never)]
pub fn mark_depth() {
    let here = current_address();
    let base = BASE.with(Cell::get);
    if base != 0 {
        DEEPEST.with(|deepest| deepest.set(deepest.get().max(base.abs_diff(here))));
    }
}

pub struct StackMonitor {
    name: String,
    stack_size: usize,
    warn_below: usize,
    max_depth: usize,
    warned_at: Option<usize>,
    checks: u64,
}

impl StackMonitor {
    /// Must be created at the top of the thread body.
    #[inline(never)]
    pub fn new(name: &str, stack_size: usize, warn_below: usize) -> Self {
        BASE.with(|base| base.set(current_address()));
        DEEPEST.with(|deepest| deepest.set(0));
        Self {
            name: name.to_string(),
            stack_size,
            warn_below,
            max_depth: 0,
            warned_at: None,
            checks: 0,
        }
    }

    /// Updates the low-water mark; returns the remaining headroom estimate in bytes.
    pub fn check(&mut self) -> usize {
        mark_depth();
        self.checks += 1;

        let deepest = DEEPEST.with(Cell::get);
        if deepest <= self.max_depth {
            return self.remaining();
        }
        self.max_depth = deepest;
        let remaining = self.remaining();

        if remaining < self.warn_below && self.warned_at.is_none_or(|w| remaining < w) {
            warn!("[{}] stack may be undersized: ~{} bytes unused", self.name, remaining);
            self.warned_at = Some(remaining);
        } else {
            debug!("[{}] min unused stack: ~{} bytes", self.name, remaining);
        }
        remaining
    }

    pub fn remaining(&self) -> usize {
        self.stack_size.saturating_sub(self.max_depth)
    }

    pub fn checks(&self) -> u64 {
        self.checks
    }
}

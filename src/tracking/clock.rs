//! clock.rs
//! Wall-clock access and the one-time startup time synchronisation gate.

use crossbeam::channel::{Receiver, RecvTimeoutError};
use serde::Deserialize;
use std::{
    thread,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

/// Any wall clock earlier than 2022-01-01T00:00:00Z is treated as unsynchronised.
pub const MIN_VALID_UNIX_SECS: i64 = 1_640_995_200;

const SYNC_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Source of sample timestamps (Unix seconds).
pub trait Clock: Send {
    fn unix_now(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default()
    }
}

/// Where the startup time-sync signal comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSource {
    /// Poll the system clock ([`SystemClockSync`]).
    System,
    /// Wait for the session layer to report sync ([`SignalledSync`]).
    Session,
}

/// Signals when wall-clock time is known to be valid.
pub trait ClockSync: Send {
    /// Blocks up to `upper_bound`; returns `false` on timeout.
    fn wait_for_sync(&self, upper_bound: Duration) -> bool;
}

/// Polls the system clock until it is past [`MIN_VALID_UNIX_SECS`].
#[derive(Debug, Default)]
pub struct SystemClockSync;

impl ClockSync for SystemClockSync {
    fn wait_for_sync(&self, upper_bound: Duration) -> bool {
        let deadline = Instant::now() + upper_bound;
        loop {
            if SystemClock.unix_now() >= MIN_VALID_UNIX_SECS {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(SYNC_POLL_INTERVAL.min(deadline - now));
        }
    }
}

/// Waits for an external synchronisation source to signal over a channel.
pub struct SignalledSync {
    rx: Receiver<()>,
}

impl SignalledSync {
    pub fn new(rx: Receiver<()>) -> Self {
        Self { rx }
    }
}

impl ClockSync for SignalledSync {
    fn wait_for_sync(&self, upper_bound: Duration) -> bool {
        match self.rx.recv_timeout(upper_bound) {
            Ok(()) => true,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }
}

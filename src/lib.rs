//! # Position uplink
//!
//! Samples a position signal on a fixed period, buffers samples across
//! network outages, and forwards them in order to a remote endpoint once
//! the uplink is ready.
//!
//! ## Pipeline
//! RuntimeControls → SampleGenerator → Producer → SampleBuffer → Publisher → Transport
//!
//! - **Producer:** one-time time-sync and readiness gates, then a fixed-period tick
//!   (oversampled in synthetic mode); drops the newest sample when the buffer is full.
//! - **Publisher:** peek → wait for the gate → publish → commit only on success.
//! - **SignalGate:** link-up AND no-maintenance, set by transport callbacks.
//!
//! ## Concurrency
//! Two threads for the life of the process, sharing only the buffer and the gate.
//! Neither loop is cancellable; a loop that exits or panics is logged and not restarted.

pub mod config;
pub mod error;
pub mod sim;
pub mod tracking;
pub mod uplink;
pub mod ui;
pub mod utils;

use std::{
    panic::{self, AssertUnwindSafe},
    thread::{self, JoinHandle},
};
use log::error;

use crate::{
    config::TrackerConfig,
    error::TrackerError,
    tracking::producer::Producer,
    uplink::{publisher::Publisher, transport::Transport},
};

pub const PRODUCER_THREAD: &str = "ProduceSamples";
pub const PUBLISHER_THREAD: &str = "PublishSamples";

/// Runs `body` on a named thread with the configured stack size.
/// The body is expected never to return; if it does, or panics, that is fatal
/// for this thread and is logged at error level.
fn spawn_forever<F>(name: &'static str, stack_size: usize, body: F) -> Result<JoinHandle<()>, TrackerError>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .stack_size(stack_size)
        .spawn(move || match panic::catch_unwind(AssertUnwindSafe(body)) {
            Ok(()) => error!("[{}] loop exited unexpectedly; thread torn down", name),
            Err(_) => error!("[{}] loop panicked; thread torn down", name),
        })
        .map_err(|source| TrackerError::Spawn { name, source })
}

pub fn spawn_producer(mut producer: Producer, cfg: &TrackerConfig) -> Result<JoinHandle<()>, TrackerError> {
    let (stack_size, warn_below) = (cfg.task_stack_size, cfg.stack_warn_bytes);
    spawn_forever(PRODUCER_THREAD, stack_size, move || producer.run(stack_size, warn_below))
}

pub fn spawn_publisher<T: Transport + 'static>(
    mut publisher: Publisher<T>,
    cfg: &TrackerConfig,
) -> Result<JoinHandle<()>, TrackerError> {
    let (stack_size, warn_below) = (cfg.task_stack_size, cfg.stack_warn_bytes);
    spawn_forever(PUBLISHER_THREAD, stack_size, move || publisher.run(stack_size, warn_below))
}

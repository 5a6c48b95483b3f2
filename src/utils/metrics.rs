//! Delivery counters and lifecycle event recording.
//!
//! Two independent paths:
//! - **TrackerStats:** atomic counters bumped by both loops, read at any time via `snapshot()`.
//! - **EventRecorder:** lock-free bounded queue → background CSV exporter (drops when full).

use std::{
    fs::File,
    io::BufWriter,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use crossbeam_queue::ArrayQueue;
use csv::Writer;
use log::{debug, error};
use serde::Serialize;

const EVENT_QUEUE_CAPACITY: usize = 4_096;
const EXPORTER_POLL_MS: u64 = 50;

#[derive(Debug, Default)]
pub struct TrackerStats {
    generated: AtomicU64,
    enqueued: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
    failed_attempts: AtomicU64,
    idle_polls: AtomicU64,
}

/// Plain-value copy of [`TrackerStats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub generated: u64,
    pub enqueued: u64,
    pub dropped: u64,
    pub delivered: u64,
    pub failed_attempts: u64,
    pub idle_polls: u64,
}

pub type SharedStats = Arc<TrackerStats>;

impl TrackerStats {
    pub fn record_generated(&self) {
        self.generated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_attempt(&self) {
        self.failed_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_idle_poll(&self) {
        self.idle_polls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            generated: self.generated.load(Ordering::Relaxed),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed_attempts: self.failed_attempts.load(Ordering::Relaxed),
            idle_polls: self.idle_polls.load(Ordering::Relaxed),
        }
    }
}

/// Sample lifecycle: enqueue (or drop) through delivery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    Enqueued { captured_at: i64, queue_len: usize },
    Dropped { captured_at: i64 },
    Delivered { captured_at: i64, attempt_us: u64 },
    DeliveryFailed { captured_at: i64, attempt_us: u64 },
}

#[derive(Debug, Serialize)]
struct EventRow {
    ts_us: u64,
    event: &'static str,
    captured_at: i64,
    value: u64,
}

impl Event {
    fn to_row(self, ts_us: u64) -> EventRow {
        let (event, captured_at, value) = match self {
            Event::Enqueued { captured_at, queue_len } => ("enqueued", captured_at, queue_len as u64),
            Event::Dropped { captured_at } => ("dropped", captured_at, 0),
            Event::Delivered { captured_at, attempt_us } => ("delivered", captured_at, attempt_us),
            Event::DeliveryFailed { captured_at, attempt_us } => ("delivery_failed", captured_at, attempt_us),
        };
        EventRow { ts_us, event, captured_at, value }
    }
}

/// Non-blocking recorder. `record()` never waits; events are dropped if the queue is full.
#[derive(Clone)]
pub struct EventRecorder {
    queue: Arc<ArrayQueue<(u64, Event)>>,
    run_start: Instant,
    exporting: Arc<AtomicBool>,
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRecorder {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(EVENT_QUEUE_CAPACITY)),
            run_start: Instant::now(),
            exporting: Arc::new(AtomicBool::new(false)),
        }
    }

    #[inline]
    pub fn record(&self, event: Event) {
        let ts_us = self.run_start.elapsed().as_micros() as u64;
        let _ = self.queue.push((ts_us, event));
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drains everything currently queued, oldest first.
    pub fn drain(&self) -> Vec<Event> {
        let mut out = Vec::with_capacity(self.queue.len());
        while let Some((_, event)) = self.queue.pop() {
            out.push(event);
        }
        out
    }

    /// Spawns a background thread that drains the queue into `output_csv`
    /// until [`EventRecorder::stop_exporter`] is called.
    pub fn start_exporter(&self, output_csv: PathBuf) -> std::io::Result<JoinHandle<()>> {
        let file = File::create(&output_csv)?;
        let queue = self.queue.clone();
        let running = self.exporting.clone();
        running.store(true, Ordering::SeqCst);

        thread::Builder::new()
            .name("event_exporter".into())
            .spawn(move || {
                let mut wtr = Writer::from_writer(BufWriter::new(file));

                let write_pending = |wtr: &mut Writer<BufWriter<File>>| {
                    let mut any = false;
                    while let Some((ts_us, event)) = queue.pop() {
                        any = true;
                        if let Err(e) = wtr.serialize(event.to_row(ts_us)) {
                            error!("[EventRecorder] failed to write row: {}", e);
                        }
                    }
                    if any {
                        wtr.flush().ok();
                    }
                };

                while running.load(Ordering::SeqCst) {
                    write_pending(&mut wtr);
                    thread::sleep(Duration::from_millis(EXPORTER_POLL_MS));
                }

                // Final drain
                write_pending(&mut wtr);
                debug!("[EventRecorder] exporter exiting: {:?}", output_csv);
            })
    }

    pub fn stop_exporter(&self) {
        self.exporting.store(false, Ordering::SeqCst);
    }
}

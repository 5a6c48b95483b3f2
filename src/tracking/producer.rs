//! producer.rs
//! Fixed-period sampling loop feeding the sample buffer.
//!
//! States: AwaitingTimeSync → AwaitingGate → Sampling (forever).
//! - Both waits happen once at startup and are never re-entered.
//! - In synthetic mode the generator runs `oversampling` times per delivery
//!   period; only the last invocation of each window is enqueued.
//! - A full buffer drops the sample with a warning; the loop never blocks on it.

use spin_sleep::{SpinSleeper, SpinStrategy};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use chrono::Utc;
use log::{debug, info, warn};

use crate::tracking::{
    buffer::SampleBuffer,
    clock::ClockSync,
    controls::RuntimeControls,
    generator::SampleGenerator,
    sample::Sample,
};
use crate::uplink::gate::SignalGate;
use crate::utils::{
    metrics::{Event, EventRecorder, SharedStats},
    stack::StackMonitor,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerState {
    AwaitingTimeSync,
    AwaitingGate,
    Sampling,
}

/// What a single tick did with the generated sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Mid-window tick: sample only fed the integration.
    Generated,
    Enqueued(Sample),
    Dropped(Sample),
    /// Window boundary reached while production is paused.
    Paused,
}

#[derive(Debug, Clone, Copy)]
pub struct ProducerSettings {
    pub period: Duration,
    pub oversampling: u32,
    pub time_sync_wait: Duration,
}

pub struct Producer {
    generator: SampleGenerator,
    buffer: Arc<SampleBuffer>,
    gate: Arc<SignalGate>,
    controls: Arc<RuntimeControls>,
    clock_sync: Box<dyn ClockSync>,
    settings: ProducerSettings,
    stats: SharedStats,
    recorder: EventRecorder,
    state: ProducerState,
    ticks_in_window: u32,
    /// Invocations in the current window; latched at each boundary.
    window_len: u32,
    /// Installed by `run()` on the producer thread.
    stack: Option<StackMonitor>,
}

impl Producer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        generator: SampleGenerator,
        buffer: Arc<SampleBuffer>,
        gate: Arc<SignalGate>,
        controls: Arc<RuntimeControls>,
        clock_sync: Box<dyn ClockSync>,
        settings: ProducerSettings,
        stats: SharedStats,
        recorder: EventRecorder,
    ) -> Self {
        let mut producer = Self {
            generator,
            buffer,
            gate,
            controls,
            clock_sync,
            settings,
            stats,
            recorder,
            state: ProducerState::AwaitingTimeSync,
            ticks_in_window: 0,
            window_len: 1,
            stack: None,
        };
        producer.window_len = producer.loops_per_sample();
        producer
    }

    pub fn state(&self) -> ProducerState {
        self.state
    }

    pub fn generator(&self) -> &SampleGenerator {
        &self.generator
    }

    /// Generator invocations per delivered sample under the current mode.
    pub fn loops_per_sample(&self) -> u32 {
        if self.controls.mock_enabled() {
            self.settings.oversampling.max(1)
        } else {
            1
        }
    }

    /// Pacing of the current window. A mode switch takes effect at the next boundary.
    pub fn tick_period(&self) -> Duration {
        self.settings.period / self.window_len
    }

    /// Runs the two one-time startup gates and enters Sampling.
    pub fn start(&mut self) {
        if self.state == ProducerState::AwaitingTimeSync {
            info!(
                "[Producer] waiting up to {} s for time sync...",
                self.settings.time_sync_wait.as_secs()
            );
            if self.clock_sync.wait_for_sync(self.settings.time_sync_wait) {
                info!("[Producer] ...time sync complete");
            } else {
                warn!("[Producer] ...timeout waiting for time sync; proceeding (timestamps may be inaccurate)");
            }
            info!("[Producer] current date/time: {}", Utc::now().format("%a %b %d %X %Y %Z"));
            self.state = ProducerState::AwaitingGate;
        }

        if self.state == ProducerState::AwaitingGate {
            debug!("[Producer] waiting for the uplink to become ready...");
            self.gate.wait_until_ready();
            debug!("[Producer] ...uplink ready");
            self.state = ProducerState::Sampling;
            self.window_len = self.loops_per_sample();
        }
    }

    /// One sampling tick. Does not sleep.
    pub fn tick(&mut self) -> TickOutcome {
        let sample = self.generator.next_sample();
        self.stats.record_generated();

        self.ticks_in_window += 1;
        if self.ticks_in_window < self.window_len {
            return TickOutcome::Generated;
        }
        self.ticks_in_window = 0;
        self.window_len = self.loops_per_sample();
        if let Some(stack) = self.stack.as_mut() {
            stack.check();
        }

        if self.controls.paused() {
            return TickOutcome::Paused;
        }

        debug!(
            "[Producer] producing {} [{:.6}, {:.6}]",
            sample.captured_at, sample.longitude, sample.latitude
        );

        if self.buffer.try_enqueue(sample) {
            self.stats.record_enqueued();
            self.recorder.record(Event::Enqueued {
                captured_at: sample.captured_at,
                queue_len: self.buffer.len(),
            });
            TickOutcome::Enqueued(sample)
        } else {
            self.stats.record_dropped();
            self.recorder.record(Event::Dropped { captured_at: sample.captured_at });
            warn!("[Producer] sample buffer full; discarding sample {}", sample.captured_at);
            TickOutcome::Dropped(sample)
        }
    }

    /// Startup gates, then periodic release forever.
    pub fn run(&mut self, stack_size: usize, stack_warn_bytes: usize) {
        self.stack = Some(StackMonitor::new("Producer", stack_size, stack_warn_bytes));
        self.start();

        let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);
        let mut next_release = Instant::now();

        loop {
            // ================================================================
            // Periodic release: the tick period follows the current mode
            // ================================================================
            next_release += self.tick_period();
            let now = Instant::now();
            if now < next_release {
                sleeper.sleep(next_release - now);
            } else if now - next_release > self.settings.period {
                debug!("[Producer] fell more than one period behind; resynchronising");
                next_release = now;
            }

            self.tick();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::{
        clock::Clock,
        generator::{GeneratorParams, MotionSensor},
        sample::MotionScale,
    };
    use crate::uplink::gate::GateEvent;
    use crate::utils::metrics::TrackerStats;
    use std::{
        sync::atomic::{AtomicBool, AtomicI64, Ordering},
        thread,
    };

    struct Still;

    impl MotionSensor for Still {
        fn read_accel(&mut self) -> (f32, f32) {
            (0.3, -0.2)
        }
    }

    /// Every read advances time by one second, so each invocation is identifiable.
    struct Counting(Arc<AtomicI64>);

    impl Clock for Counting {
        fn unix_now(&self) -> i64 {
            self.0.fetch_add(1, Ordering::Relaxed) + 1
        }
    }

    struct Flag(Arc<AtomicBool>);

    impl ClockSync for Flag {
        fn wait_for_sync(&self, _upper_bound: Duration) -> bool {
            self.0.store(true, Ordering::SeqCst);
            false
        }
    }

    struct Fixture {
        producer: Producer,
        buffer: Arc<SampleBuffer>,
        gate: Arc<SignalGate>,
        controls: Arc<RuntimeControls>,
        synced: Arc<AtomicBool>,
    }

    fn fixture(oversampling: u32, capacity: usize, mock: bool) -> Fixture {
        let controls = Arc::new(RuntimeControls::new(mock, MotionScale::Drive, false));
        let generator = SampleGenerator::new(
            GeneratorParams {
                offset_x: 0.0,
                offset_y: 0.0,
                calc_period_ms: 50,
                origin_lon: -93.63705,
                origin_lat: 44.81584,
            },
            Box::new(Still),
            Box::new(Counting(Arc::new(AtomicI64::new(0)))),
            controls.clone(),
        );
        let buffer = Arc::new(SampleBuffer::new(capacity));
        let gate = Arc::new(SignalGate::new());
        let synced = Arc::new(AtomicBool::new(false));
        let producer = Producer::new(
            generator,
            buffer.clone(),
            gate.clone(),
            controls.clone(),
            Box::new(Flag(synced.clone())),
            ProducerSettings {
                period: Duration::from_millis(10_000),
                oversampling,
                time_sync_wait: Duration::from_millis(1),
            },
            Arc::new(TrackerStats::default()),
            EventRecorder::new(),
        );
        Fixture { producer, buffer, gate, controls, synced }
    }

    #[test]
    fn one_in_every_window_is_enqueued() {
        let mut f = fixture(200, 60, true);
        for _ in 0..(200 * 3) {
            f.producer.tick();
        }
        let times: Vec<i64> = f.buffer.snapshot().iter().map(|s| s.captured_at).collect();
        assert_eq!(times, vec![200, 400, 600]);
        assert_eq!(f.producer.stats.snapshot().generated, 600);
        assert_eq!(f.producer.stats.snapshot().enqueued, 3);
    }

    #[test]
    fn tick_period_divides_by_oversampling_in_mock_mode() {
        let mut f = fixture(200, 60, true);
        assert_eq!(f.producer.tick_period(), Duration::from_millis(50));

        // Switching mode mid-window finishes the window at the old pace.
        f.producer.tick();
        f.controls.toggle_mode();
        assert_eq!(f.producer.loops_per_sample(), 1);
        assert_eq!(f.producer.tick_period(), Duration::from_millis(50));

        for _ in 1..199 {
            assert_eq!(f.producer.tick(), TickOutcome::Generated);
        }
        assert!(matches!(f.producer.tick(), TickOutcome::Enqueued(_)));
        assert_eq!(f.producer.tick_period(), Duration::from_millis(10_000));
        assert!(matches!(f.producer.tick(), TickOutcome::Enqueued(_)));
    }

    #[test]
    fn stack_is_checked_once_per_window() {
        let mut f = fixture(200, 60, true);
        f.producer.stack = Some(StackMonitor::new("Producer", 1 << 20, 1024));
        for _ in 0..(200 * 2 + 50) {
            f.producer.tick();
        }
        assert_eq!(f.producer.stack.as_ref().map(StackMonitor::checks), Some(2));
    }

    #[test]
    fn real_mode_enqueues_every_tick() {
        let mut f = fixture(200, 60, false);
        for _ in 0..3 {
            assert!(matches!(f.producer.tick(), TickOutcome::Enqueued(_)));
        }
        assert_eq!(f.buffer.len(), 3);
    }

    #[test]
    fn paused_window_is_skipped() {
        let mut f = fixture(2, 60, true);
        f.controls.toggle_pause();
        assert_eq!(f.producer.tick(), TickOutcome::Generated);
        assert_eq!(f.producer.tick(), TickOutcome::Paused);
        assert!(f.buffer.is_empty());

        f.controls.toggle_pause();
        f.producer.tick();
        assert!(matches!(f.producer.tick(), TickOutcome::Enqueued(s) if s.captured_at == 4));
    }

    #[test]
    fn full_buffer_drops_newest_without_blocking() {
        let mut f = fixture(1, 2, true);
        assert!(matches!(f.producer.tick(), TickOutcome::Enqueued(_)));
        assert!(matches!(f.producer.tick(), TickOutcome::Enqueued(_)));
        assert!(matches!(f.producer.tick(), TickOutcome::Dropped(s) if s.captured_at == 3));
        let times: Vec<i64> = f.buffer.snapshot().iter().map(|s| s.captured_at).collect();
        assert_eq!(times, vec![1, 2]);
        assert_eq!(f.producer.stats.snapshot().dropped, 1);
    }

    #[test]
    fn startup_waits_for_gate_once() {
        let mut f = fixture(1, 4, true);
        let gate = f.gate.clone();
        let opener = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            gate.apply(GateEvent::Connected);
        });

        f.producer.start();
        opener.join().unwrap();
        assert!(f.synced.load(Ordering::SeqCst));
        assert_eq!(f.producer.state(), ProducerState::Sampling);

        // Steady state does not re-check the gate.
        f.gate.apply(GateEvent::Disconnected);
        assert!(matches!(f.producer.tick(), TickOutcome::Enqueued(_)));
    }
}

//! publisher.rs
//! Delivers buffered samples in order, at least once.
//!
//! Cycle: WaitForSample → WaitForGate → Attempt → Success | Failure.
//! - The gate is waited on before EVERY attempt, with no timeout.
//! - A sample leaves the buffer only after the transport confirms it.
//! - A failed sample stays at the head and is retried; nothing behind it
//!   is ever sent first.

use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};
use log::{debug, warn};

use crate::tracking::{buffer::SampleBuffer, sample::Sample};
use crate::uplink::{
    gate::SignalGate,
    payload,
    transport::{Qos, Transport},
};
use crate::utils::{
    metrics::{Event, EventRecorder, SharedStats},
    stack::StackMonitor,
};

/// Result of one publisher cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    /// Peek timed out with nothing buffered.
    Idle,
    Delivered(Sample),
    /// The sample is still at the head of the buffer.
    Failed(Sample),
}

pub struct PublisherSettings {
    pub topic: String,
    pub qos: Qos,
    pub peek_timeout: Duration,
    pub retry_delay: Duration,
}

pub struct Publisher<T: Transport> {
    buffer: Arc<SampleBuffer>,
    gate: Arc<SignalGate>,
    transport: T,
    settings: PublisherSettings,
    stats: SharedStats,
    recorder: EventRecorder,
}

impl<T: Transport> Publisher<T> {
    pub fn new(
        buffer: Arc<SampleBuffer>,
        gate: Arc<SignalGate>,
        transport: T,
        settings: PublisherSettings,
        stats: SharedStats,
        recorder: EventRecorder,
    ) -> Self {
        Self {
            buffer,
            gate,
            transport,
            settings,
            stats,
            recorder,
        }
    }

    pub fn topic(&self) -> &str {
        &self.settings.topic
    }

    /// One WaitForSample → WaitForGate → Attempt pass.
    pub fn step(&mut self) -> PublishOutcome {
        // Bounded only so the thread wakes periodically; an empty buffer is not an error.
        let sample = match self.buffer.peek_oldest(self.settings.peek_timeout) {
            Some(s) => s,
            None => {
                self.stats.record_idle_poll();
                return PublishOutcome::Idle;
            }
        };

        // Do not hand the transport anything while it cannot deliver.
        self.gate.wait_until_ready();

        let body = payload::encode(&sample);
        let started = Instant::now();
        let result = self.transport.publish(&self.settings.topic, &body, self.settings.qos);
        let attempt_us = started.elapsed().as_micros() as u64;

        match result {
            Ok(()) => {
                if !self.buffer.commit_dequeue() {
                    warn!("[Publisher] delivered sample {} was no longer buffered", sample.captured_at);
                }
                self.stats.record_delivered();
                self.recorder.record(Event::Delivered {
                    captured_at: sample.captured_at,
                    attempt_us,
                });
                debug!("[Publisher] delivered {} ({} left)", sample.captured_at, self.buffer.len());
                PublishOutcome::Delivered(sample)
            }
            Err(e) => {
                self.stats.record_failed_attempt();
                self.recorder.record(Event::DeliveryFailed {
                    captured_at: sample.captured_at,
                    attempt_us,
                });
                warn!("[Publisher] delivery of {} failed: {}; will retry", sample.captured_at, e);
                PublishOutcome::Failed(sample)
            }
        }
    }

    /// Runs for the life of the process.
    pub fn run(&mut self, stack_size: usize, stack_warn_bytes: usize) {
        let mut stack = StackMonitor::new("Publisher", stack_size, stack_warn_bytes);
        debug!("[Publisher] started, topic={}", self.settings.topic);

        loop {
            if let PublishOutcome::Failed(_) = self.step() {
                thread::sleep(self.settings.retry_delay);
            }
            stack.check();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::uplink::gate::GateEvent;
    use crate::utils::metrics::TrackerStats;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Replays a scripted list of outcomes and records every payload it sees.
    struct Scripted {
        outcomes: Mutex<VecDeque<Result<(), TransportError>>>,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Transport for Scripted {
        fn client_id(&self) -> &str {
            "dev"
        }

        fn publish(&self, _topic: &str, payload: &str, _qos: Qos) -> Result<(), TransportError> {
            self.seen.lock().push(payload.to_string());
            self.outcomes.lock().pop_front().unwrap_or(Ok(()))
        }
    }

    fn sample(t: i64) -> Sample {
        Sample::new(t, -93.0, 44.0)
    }

    fn publisher(
        outcomes: Vec<Result<(), TransportError>>,
        capacity: usize,
    ) -> (Publisher<Scripted>, Arc<SampleBuffer>, Arc<SignalGate>, Arc<Mutex<Vec<String>>>) {
        let buffer = Arc::new(SampleBuffer::new(capacity));
        let gate = Arc::new(SignalGate::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let transport = Scripted {
            outcomes: Mutex::new(outcomes.into()),
            seen: seen.clone(),
        };
        let settings = PublisherSettings {
            topic: "dev/location".into(),
            qos: Qos::AtLeastOnce,
            peek_timeout: Duration::from_millis(10),
            retry_delay: Duration::ZERO,
        };
        let p = Publisher::new(
            buffer.clone(),
            gate.clone(),
            transport,
            settings,
            Arc::new(TrackerStats::default()),
            EventRecorder::new(),
        );
        (p, buffer, gate, seen)
    }

    #[test]
    fn empty_buffer_is_idle() {
        let (mut p, _buffer, gate, seen) = publisher(vec![], 4);
        gate.apply(GateEvent::Connected);
        assert_eq!(p.step(), PublishOutcome::Idle);
        assert!(seen.lock().is_empty());
        assert_eq!(p.stats.snapshot().idle_polls, 1);
    }

    #[test]
    fn success_commits_and_moves_on() {
        let (mut p, buffer, gate, _seen) = publisher(vec![], 4);
        gate.apply(GateEvent::Connected);
        buffer.try_enqueue(sample(1));
        buffer.try_enqueue(sample(2));

        assert_eq!(p.step(), PublishOutcome::Delivered(sample(1)));
        assert_eq!(p.step(), PublishOutcome::Delivered(sample(2)));
        assert!(buffer.is_empty());
        assert_eq!(p.stats.snapshot().delivered, 2);
    }

    #[test]
    fn repeated_failures_retry_the_same_head() {
        let n = 5;
        let outcomes = (0..n).map(|_| Err(TransportError::NotConnected)).collect();
        let (mut p, buffer, gate, seen) = publisher(outcomes, 4);
        gate.apply(GateEvent::Connected);
        for t in 1..=3 {
            buffer.try_enqueue(sample(t));
        }

        for _ in 0..n {
            assert_eq!(p.step(), PublishOutcome::Failed(sample(1)));
            assert_eq!(buffer.snapshot(), vec![sample(1), sample(2), sample(3)]);
        }
        assert_eq!(p.step(), PublishOutcome::Delivered(sample(1)));
        assert_eq!(buffer.snapshot(), vec![sample(2), sample(3)]);

        let seen = seen.lock();
        assert_eq!(seen.len(), n + 1);
        assert!(seen.iter().all(|body| body == &payload::encode(&sample(1))));
        assert_eq!(p.stats.snapshot().failed_attempts, n as u64);
    }

    #[test]
    fn interleaved_failures_keep_order_without_gaps() {
        let outcomes = vec![
            Ok(()),
            Err(TransportError::AckTimeout(1000)),
            Ok(()),
            Err(TransportError::AgentGone),
            Err(TransportError::NotConnected),
            Ok(()),
            Ok(()),
        ];
        let (mut p, buffer, gate, _seen) = publisher(outcomes, 8);
        gate.apply(GateEvent::Connected);
        for t in 10..14 {
            buffer.try_enqueue(sample(t));
        }

        let mut delivered = Vec::new();
        while !buffer.is_empty() {
            if let PublishOutcome::Delivered(s) = p.step() {
                delivered.push(s.captured_at);
            }
        }
        assert_eq!(delivered, vec![10, 11, 12, 13]);
    }

    #[test]
    fn blocks_on_closed_gate_until_ready() {
        let (mut p, buffer, gate, seen) = publisher(vec![], 4);
        buffer.try_enqueue(sample(1));

        let opener = {
            let gate = gate.clone();
            let seen = seen.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                // Nothing may have been attempted while the link was down.
                let attempted = seen.lock().len();
                gate.apply(GateEvent::Connected);
                attempted
            })
        };

        assert_eq!(p.step(), PublishOutcome::Delivered(sample(1)));
        assert_eq!(opener.join().unwrap(), 0);
    }
}

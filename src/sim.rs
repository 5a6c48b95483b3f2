//! sim.rs
//! Simulated session layer for running without a broker.
//!
//! Randomly flaps the link and maintenance state and raises the same readiness
//! events a real session layer would. Probabilities are evaluated once per
//! `tick`. Either transport variant can sit on top:
//! - agent: serves `AgentTransport` publish requests and acknowledges them.
//! - standalone: drives the transport's own link flag and drains its sink.
//!
//! The first successful connect also signals wall-clock sync when asked to.

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, bounded};
use rand::{Rng, rngs::ThreadRng};
use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use log::{debug, info};

use crate::error::TransportError;
use crate::uplink::{
    gate::{GateEvent, SignalGate},
    transport::{AgentTransport, Outbound, PublishCommand, Qos, StandaloneTransport, Transport, TransportKind},
};

#[derive(Debug, Clone, Copy)]
pub struct LinkSimSettings {
    pub connect_delay: Duration,
    pub tick: Duration,
    pub disconnect_p: f64,
    pub reconnect_p: f64,
    pub maintenance_start_p: f64,
    pub maintenance_stop_p: f64,
    /// Chance an at-least-once publish is not acknowledged (agent only).
    pub nack_p: f64,
    pub queue_depth: usize,
    pub ack_timeout: Duration,
}

impl Default for LinkSimSettings {
    fn default() -> Self {
        Self {
            connect_delay: Duration::from_secs(2),
            tick: Duration::from_secs(1),
            disconnect_p: 0.01,
            reconnect_p: 0.2,
            maintenance_start_p: 0.002,
            maintenance_stop_p: 0.1,
            nack_p: 0.05,
            queue_depth: 8,
            ack_timeout: Duration::from_secs(30),
        }
    }
}

struct LinkSim {
    gate: Arc<SignalGate>,
    settings: LinkSimSettings,
    rng: ThreadRng,
    connected: bool,
    maintenance: bool,
    /// Link flag owned by a standalone transport.
    link_flag: Option<Arc<AtomicBool>>,
    /// Fired once, on the first connect.
    time_sync: Option<Sender<()>>,
}

impl LinkSim {
    fn new(
        gate: Arc<SignalGate>,
        settings: LinkSimSettings,
        link_flag: Option<Arc<AtomicBool>>,
        time_sync: Option<Sender<()>>,
    ) -> Self {
        Self {
            gate,
            settings,
            rng: rand::rng(),
            connected: false,
            maintenance: false,
            link_flag,
            time_sync,
        }
    }

    fn chance(&mut self, p: f64) -> bool {
        self.rng.random_bool(p.clamp(0.0, 1.0))
    }

    fn raise(&mut self, event: GateEvent) {
        match event {
            GateEvent::Connected => self.connected = true,
            GateEvent::Disconnected => self.connected = false,
            GateEvent::MaintenanceStarted => self.maintenance = true,
            GateEvent::MaintenanceStopped => self.maintenance = false,
        }
        if let Some(flag) = &self.link_flag {
            flag.store(self.connected, Ordering::Release);
        }
        self.gate.apply(event);

        if self.connected {
            if let Some(sync) = self.time_sync.take() {
                debug!("[LinkSim] signalling time sync");
                let _ = sync.try_send(());
            }
        }
    }

    fn flap(&mut self) {
        let s = self.settings;
        if self.connected && self.chance(s.disconnect_p) {
            self.raise(GateEvent::Disconnected);
        } else if !self.connected && self.chance(s.reconnect_p) {
            self.raise(GateEvent::Connected);
        }

        if !self.maintenance && self.chance(s.maintenance_start_p) {
            self.raise(GateEvent::MaintenanceStarted);
        } else if self.maintenance && self.chance(s.maintenance_stop_p) {
            self.raise(GateEvent::MaintenanceStopped);
        }
    }

    fn serve(&mut self, cmd: PublishCommand) {
        let result = if !self.connected {
            Err(TransportError::NotConnected)
        } else if self.maintenance {
            Err(TransportError::Rejected("maintenance in progress".into()))
        } else if cmd.qos == Qos::AtLeastOnce && self.chance(self.settings.nack_p) {
            Err(TransportError::Rejected("no PUBACK".into()))
        } else {
            info!("Publishing message: [{}] {}", cmd.topic, cmd.payload);
            Ok(())
        };
        cmd.complete(result);
    }

    /// Connects, then handles `inbound` until every sender is dropped.
    fn run<T>(mut self, inbound: Receiver<T>, mut on_item: impl FnMut(&mut Self, T)) {
        thread::sleep(self.settings.connect_delay);
        self.raise(GateEvent::Connected);
        let mut last_flap = Instant::now();

        loop {
            match inbound.recv_timeout(self.settings.tick) {
                Ok(item) => on_item(&mut self, item),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            if last_flap.elapsed() >= self.settings.tick {
                self.flap();
                last_flap = Instant::now();
            }
        }
        debug!("[LinkSim] all transports dropped; session exiting");
    }
}

/// Builds the requested transport variant on top of a simulated session thread.
pub fn spawn_session(
    kind: TransportKind,
    client_id: &str,
    gate: Arc<SignalGate>,
    settings: LinkSimSettings,
    time_sync: Option<Sender<()>>,
) -> io::Result<(Box<dyn Transport>, JoinHandle<()>)> {
    let builder = thread::Builder::new().name("link_agent".into());

    match kind {
        TransportKind::Agent => {
            let (transport, commands) = AgentTransport::new(client_id, settings.queue_depth, settings.ack_timeout);
            let handle = builder.spawn(move || {
                LinkSim::new(gate, settings, None, time_sync).run(commands, LinkSim::serve)
            })?;
            Ok((Box::new(transport), handle))
        }
        TransportKind::Standalone => {
            let link_up = Arc::new(AtomicBool::new(false));
            let (sink, outbound) = bounded::<Outbound>(settings.queue_depth);
            let transport = StandaloneTransport::new(client_id, link_up.clone(), sink);
            let handle = builder.spawn(move || {
                let sim = LinkSim::new(gate, settings, Some(link_up), time_sync);
                sim.run(outbound, |_, (topic, payload)| {
                    info!("Publishing message: [{}] {}", topic, payload);
                })
            })?;
            Ok((Box::new(transport), handle))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::clock::{ClockSync, SignalledSync};
    use crate::uplink::gate::GateCondition;

    fn steady() -> LinkSimSettings {
        LinkSimSettings {
            connect_delay: Duration::ZERO,
            tick: Duration::from_millis(5),
            disconnect_p: 0.0,
            reconnect_p: 0.0,
            maintenance_start_p: 0.0,
            maintenance_stop_p: 0.0,
            nack_p: 0.0,
            queue_depth: 4,
            ack_timeout: Duration::from_secs(2),
        }
    }

    fn wait_for_link_down(gate: &SignalGate) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while gate.is_set(GateCondition::LinkUp) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!gate.is_set(GateCondition::LinkUp));
    }

    #[test]
    fn agent_session_connects_and_acknowledges() {
        let gate = Arc::new(SignalGate::new());
        let (transport, agent) = spawn_session(TransportKind::Agent, "sim", gate.clone(), steady(), None).unwrap();

        assert!(gate.wait_until_ready_for(Duration::from_secs(2)));
        assert_eq!(transport.client_id(), "sim");
        assert_eq!(transport.publish("sim/location", "{}", Qos::AtLeastOnce), Ok(()));

        drop(transport);
        agent.join().unwrap();
    }

    #[test]
    fn agent_always_nack_fails_at_least_once_only() {
        let gate = Arc::new(SignalGate::new());
        let settings = LinkSimSettings { nack_p: 1.0, ..steady() };
        let (transport, agent) = spawn_session(TransportKind::Agent, "sim", gate.clone(), settings, None).unwrap();

        assert!(gate.wait_until_ready_for(Duration::from_secs(2)));
        assert!(matches!(
            transport.publish("t", "{}", Qos::AtLeastOnce),
            Err(TransportError::Rejected(_))
        ));
        assert_eq!(transport.publish("t", "{}", Qos::AtMostOnce), Ok(()));

        drop(transport);
        agent.join().unwrap();
    }

    #[test]
    fn certain_disconnect_closes_the_gate() {
        let gate = Arc::new(SignalGate::new());
        let settings = LinkSimSettings { disconnect_p: 1.0, ..steady() };
        let (transport, agent) = spawn_session(TransportKind::Agent, "sim", gate.clone(), settings, None).unwrap();

        assert!(gate.wait_until_ready_for(Duration::from_secs(2)));
        wait_for_link_down(&gate);

        drop(transport);
        agent.join().unwrap();
    }

    #[test]
    fn standalone_session_drives_link_flag_and_gate() {
        let gate = Arc::new(SignalGate::new());
        let (transport, session) =
            spawn_session(TransportKind::Standalone, "solo", gate.clone(), steady(), None).unwrap();

        assert!(gate.wait_until_ready_for(Duration::from_secs(2)));
        assert_eq!(transport.client_id(), "solo");
        assert_eq!(transport.publish("solo/location", "{}", Qos::AtLeastOnce), Ok(()));

        drop(transport);
        session.join().unwrap();
    }

    #[test]
    fn standalone_disconnect_rejects_publishes() {
        let gate = Arc::new(SignalGate::new());
        let settings = LinkSimSettings { disconnect_p: 1.0, ..steady() };
        let (transport, session) =
            spawn_session(TransportKind::Standalone, "solo", gate.clone(), settings, None).unwrap();

        assert!(gate.wait_until_ready_for(Duration::from_secs(2)));
        wait_for_link_down(&gate);
        assert_eq!(
            transport.publish("solo/location", "{}", Qos::AtLeastOnce),
            Err(TransportError::NotConnected)
        );

        drop(transport);
        session.join().unwrap();
    }

    #[test]
    fn first_connect_signals_time_sync() {
        let gate = Arc::new(SignalGate::new());
        let (tx, rx) = bounded(1);
        let sync = SignalledSync::new(rx);
        let settings = LinkSimSettings { connect_delay: Duration::from_millis(20), ..steady() };
        let (transport, session) =
            spawn_session(TransportKind::Standalone, "solo", gate.clone(), settings, Some(tx)).unwrap();

        assert!(sync.wait_for_sync(Duration::from_secs(2)));
        assert!(gate.is_set(GateCondition::LinkUp));

        drop(transport);
        session.join().unwrap();
    }
}

//! gate.rs
//! Coalesced readiness for delivery: the link is usable AND no maintenance
//! operation is in progress.
//!
//! Set/clear come from transport callbacks and never block beyond the short
//! state lock. Waiters block until both conditions hold at the same time;
//! waiting does not consume readiness, so every waiter observes it.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};
use log::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateCondition {
    LinkUp,
    MaintenanceIdle,
}

/// Readiness events raised by the transport/session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateEvent {
    Connected,
    Disconnected,
    MaintenanceStarted,
    MaintenanceStopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GateState {
    link_up: bool,
    maintenance_idle: bool,
}

impl GateState {
    fn ready(&self) -> bool {
        self.link_up && self.maintenance_idle
    }
}

#[derive(Debug)]
pub struct SignalGate {
    state: Mutex<GateState>,
    changed: Condvar,
}

impl Default for SignalGate {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalGate {
    /// Link down, no maintenance in progress.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                link_up: false,
                maintenance_idle: true,
            }),
            changed: Condvar::new(),
        }
    }

    pub fn set(&self, which: GateCondition) {
        self.update(which, true);
    }

    pub fn clear(&self, which: GateCondition) {
        self.update(which, false);
    }

    fn update(&self, which: GateCondition, value: bool) {
        let mut state = self.state.lock();
        let slot = match which {
            GateCondition::LinkUp => &mut state.link_up,
            GateCondition::MaintenanceIdle => &mut state.maintenance_idle,
        };
        if *slot == value {
            return;
        }
        *slot = value;
        let ready = state.ready();
        drop(state);

        debug!("[Gate] {:?} -> {} (ready={})", which, value, ready);
        if ready {
            self.changed.notify_all();
        }
    }

    pub fn apply(&self, event: GateEvent) {
        match event {
            GateEvent::Connected => {
                info!("[Gate] link connected");
                self.set(GateCondition::LinkUp);
            }
            GateEvent::Disconnected => {
                info!("[Gate] link disconnected: pausing delivery");
                self.clear(GateCondition::LinkUp);
            }
            GateEvent::MaintenanceStarted => {
                info!("[Gate] maintenance started: pausing delivery");
                self.clear(GateCondition::MaintenanceIdle);
            }
            GateEvent::MaintenanceStopped => {
                info!("[Gate] maintenance stopped");
                self.set(GateCondition::MaintenanceIdle);
            }
        }
    }

    pub fn is_set(&self, which: GateCondition) -> bool {
        let state = self.state.lock();
        match which {
            GateCondition::LinkUp => state.link_up,
            GateCondition::MaintenanceIdle => state.maintenance_idle,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state.lock().ready()
    }

    /// Blocks with no timeout until both conditions are set.
    pub fn wait_until_ready(&self) {
        let mut state = self.state.lock();
        while !state.ready() {
            self.changed.wait(&mut state);
        }
    }

    /// Bounded variant of [`SignalGate::wait_until_ready`]; `false` on timeout.
    pub fn wait_until_ready_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !state.ready() {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                return state.ready();
            }
        }
        true
    }
}

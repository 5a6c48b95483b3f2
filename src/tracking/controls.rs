//! controls.rs
//! Runtime flags toggled by the control surface and read by the producer.
//!
//! Each flag is an independent scalar; there is no invariant spanning them,
//! so Relaxed loads are enough (worst case one tick sees a stale value).

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use log::info;

use crate::tracking::sample::MotionScale;

/// Discrete triggers raised by the control surface. Fire-and-forget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlTrigger {
    ToggleMode,
    CycleScale,
    TogglePause,
}

#[derive(Debug)]
pub struct RuntimeControls {
    mock_enabled: AtomicBool,
    motion_scale: AtomicU8,
    paused: AtomicBool,
}

impl RuntimeControls {
    pub fn new(mock_enabled: bool, motion_scale: MotionScale, paused: bool) -> Self {
        Self {
            mock_enabled: AtomicBool::new(mock_enabled),
            motion_scale: AtomicU8::new(motion_scale.to_raw()),
            paused: AtomicBool::new(paused),
        }
    }

    pub fn mock_enabled(&self) -> bool {
        self.mock_enabled.load(Ordering::Relaxed)
    }

    pub fn motion_scale(&self) -> MotionScale {
        MotionScale::from_raw(self.motion_scale.load(Ordering::Relaxed))
    }

    pub fn paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub fn toggle_mode(&self) -> bool {
        !self.mock_enabled.fetch_xor(true, Ordering::Relaxed)
    }

    // Only the control surface writes the scale, so load-then-store is fine.
    pub fn cycle_scale(&self) -> MotionScale {
        let next = self.motion_scale().next();
        self.motion_scale.store(next.to_raw(), Ordering::Relaxed);
        next
    }

    pub fn toggle_pause(&self) -> bool {
        !self.paused.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn apply(&self, trigger: ControlTrigger) {
        match trigger {
            ControlTrigger::ToggleMode => {
                self.toggle_mode();
                info!("[Controls] generator mode -> {}", self.mode_label());
            }
            ControlTrigger::CycleScale => {
                let scale = self.cycle_scale();
                info!("[Controls] motion scale -> {}", scale.label());
            }
            ControlTrigger::TogglePause => {
                self.toggle_pause();
                info!("[Controls] production -> {}", self.pause_label());
            }
        }
    }

    pub fn mode_label(&self) -> &'static str {
        if self.mock_enabled() { "Mock" } else { "GPS" }
    }

    pub fn scale_label(&self) -> &'static str {
        self.motion_scale().label()
    }

    pub fn pause_label(&self) -> &'static str {
        if self.paused() { "Paused" } else { "Active" }
    }
}

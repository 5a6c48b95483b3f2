//! console.rs
//! Keyboard control surface: one key per trigger, one trigger per line.
//!
//!   m  toggle generator mode (Mock / GPS)
//!   s  cycle motion scale (Walk → Drive → Fly)
//!   p  toggle pause

use std::{
    io::BufRead,
    sync::Arc,
    thread::{self, JoinHandle},
};
use log::debug;

use crate::tracking::controls::{ControlTrigger, RuntimeControls};
use crate::ui::display::{ControlLabels, StatusDisplay};

pub fn parse_trigger(line: &str) -> Option<ControlTrigger> {
    match line.trim().to_ascii_lowercase().as_str() {
        "m" => Some(ControlTrigger::ToggleMode),
        "s" => Some(ControlTrigger::CycleScale),
        "p" => Some(ControlTrigger::TogglePause),
        _ => None,
    }
}

/// Applies triggers read from `input` until it is exhausted.
pub fn run_control_surface<R: BufRead>(input: R, controls: &RuntimeControls, display: &dyn StatusDisplay) {
    for line in input.lines() {
        let Ok(line) = line else { break };
        match parse_trigger(&line) {
            Some(trigger) => {
                controls.apply(trigger);
                display.set_labels(ControlLabels::from_controls(controls));
            }
            None if line.trim().is_empty() => {}
            None => display.add_line("keys: m = mode, s = scale, p = pause"),
        }
    }
    debug!("[Controls] input closed");
}

pub fn spawn_control_surface<R: BufRead + Send + 'static>(
    input: R,
    controls: Arc<RuntimeControls>,
    display: Arc<dyn StatusDisplay>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("control_surface".into())
        .spawn(move || run_control_surface(input, &controls, display.as_ref()))
}

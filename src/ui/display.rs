//! display.rs
//! Status display capability: UI-enabled (console) or headless.
//!
//! The display only mirrors control state and progress lines; it never
//! reports errors and nothing in the core depends on which variant is used.

use parking_lot::Mutex;
use std::io::{self, Write};

use crate::tracking::controls::RuntimeControls;

/// Labels shown on the three control buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlLabels {
    pub mode: &'static str,
    pub scale: &'static str,
    pub pause: &'static str,
}

impl ControlLabels {
    pub fn from_controls(controls: &RuntimeControls) -> Self {
        Self {
            mode: controls.mode_label(),
            scale: controls.scale_label(),
            pause: controls.pause_label(),
        }
    }
}

pub trait StatusDisplay: Send + Sync {
    fn set_header(&self, text: &str);
    fn add_line(&self, text: &str);
    fn set_labels(&self, labels: ControlLabels);
}

pub struct HeadlessDisplay;

impl StatusDisplay for HeadlessDisplay {
    fn set_header(&self, _text: &str) {}
    fn add_line(&self, _text: &str) {}
    fn set_labels(&self, _labels: ControlLabels) {}
}

pub struct ConsoleDisplay<W: Write + Send> {
    out: Mutex<W>,
}

impl ConsoleDisplay<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleDisplay<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn emit(&self, line: &str) {
        let mut out = self.out.lock();
        // Display output is best effort.
        let _ = writeln!(out, "{}", line);
        let _ = out.flush();
    }
}

impl<W: Write + Send> StatusDisplay for ConsoleDisplay<W> {
    fn set_header(&self, text: &str) {
        self.emit(&format!("┌─ {} ─┐", text));
    }

    fn add_line(&self, text: &str) {
        self.emit(text);
    }

    fn set_labels(&self, labels: ControlLabels) {
        self.emit(&format!(
            "[m] {:<5} | [s] {:<5} | [p] {:<6}",
            labels.mode, labels.scale, labels.pause
        ));
    }
}

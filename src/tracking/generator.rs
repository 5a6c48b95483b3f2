//! generator.rs
//! Produces one position sample per producer tick.
//!
//! - Real-sensor mode: position hardware is not integrated; returns the origin.
//! - Synthetic mode: integrates a 2-axis tilt reading into displacement from
//!   the origin. Drift is accumulated for the life of the process and never reset.

use std::sync::Arc;
use log::{debug, warn};

use crate::tracking::{
    clock::Clock,
    controls::RuntimeControls,
    sample::{MotionScale, Sample},
};
use crate::utils::stack;

/// Nominal jogging speed (6 MPH) a full-scale tilt corresponds to.
pub const WALK_SPEED_FT_PER_S: f64 = 8.8;

/// Very rough feet → decimal degrees conversion at mid latitudes.
pub const FT_TO_DEGREES: f64 = 0.000_002_160_039;

/// Accelerometer-like tilt input, roughly -1.0..=1.0 per axis.
pub trait MotionSensor: Send {
    fn read_accel(&mut self) -> (f32, f32);
}

/// Random-walk tilt used when no motion hardware is attached.
#[derive(Debug, Default)]
pub struct SimulatedTilt {
    x: f32,
    y: f32,
}

impl SimulatedTilt {
    const STEP: f32 = 0.02;

    pub fn new() -> Self {
        Self::default()
    }
}

impl MotionSensor for SimulatedTilt {
    fn read_accel(&mut self) -> (f32, f32) {
        self.x = (self.x + rand::random_range(-Self::STEP..Self::STEP)).clamp(-1.0, 1.0);
        self.y = (self.y + rand::random_range(-Self::STEP..Self::STEP)).clamp(-1.0, 1.0);
        (self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorParams {
    pub offset_x: f64,
    pub offset_y: f64,
    pub calc_period_ms: u64,
    pub origin_lon: f64,
    pub origin_lat: f64,
}

pub struct SampleGenerator {
    params: GeneratorParams,
    sensor: Box<dyn MotionSensor>,
    clock: Box<dyn Clock>,
    controls: Arc<RuntimeControls>,
    drift_x: f64,
    drift_y: f64,
}

impl SampleGenerator {
    pub fn new(
        params: GeneratorParams,
        sensor: Box<dyn MotionSensor>,
        clock: Box<dyn Clock>,
        controls: Arc<RuntimeControls>,
    ) -> Self {
        Self {
            params,
            sensor,
            clock,
            controls,
            drift_x: 0.0,
            drift_y: 0.0,
        }
    }

    pub fn next_sample(&mut self) -> Sample {
        let captured_at = self.clock.unix_now();

        if !self.controls.mock_enabled() {
            warn!("[Generator] position hardware not integrated; reporting origin");
            return Sample::new(captured_at, self.params.origin_lon, self.params.origin_lat);
        }

        let (raw_x, raw_y) = self.sensor.read_accel();
        let (longitude, latitude) = self.integrate(raw_x, raw_y, self.controls.motion_scale());
        Sample::new(captured_at, longitude, latitude)
    }

    /// One synthetic integration step; returns `(longitude, latitude)`.
    pub fn integrate(&mut self, raw_x: f32, raw_y: f32, scale: MotionScale) -> (f64, f64) {
        let p = &self.params;

        let cal_x = raw_x as f64 + p.offset_x;
        let cal_y = raw_y as f64 + p.offset_y;

        // Tenths only; sensor jitter lives below that.
        let round_x = (10.0 * cal_x).round() / 10.0;
        let round_y = (10.0 * cal_y).round() / 10.0;

        let tick_secs = p.calc_period_ms as f64 / 1000.0;
        let inc_x = round_x * tick_secs * WALK_SPEED_FT_PER_S * scale.multiplier();
        let inc_y = round_y * tick_secs * WALK_SPEED_FT_PER_S * scale.multiplier();

        self.drift_x += inc_x;
        self.drift_y += inc_y;

        let longitude = p.origin_lon - self.drift_x * FT_TO_DEGREES;
        let latitude = p.origin_lat - self.drift_y * FT_TO_DEGREES;
        stack::mark_depth();

        debug!(
            "[Generator] raw {:+.2}/{:+.2} | cal {:+.2}/{:+.2} | rounded {:+.2}/{:+.2} | drift {:+.0}/{:+.0} ft | {:.6}/{:.6}",
            raw_x, raw_y, cal_x, cal_y, round_x, round_y, self.drift_x, self.drift_y, longitude, latitude
        );

        (longitude, latitude)
    }

    /// Accumulated `(x, y)` displacement in feet since process start.
    pub fn drift(&self) -> (f64, f64) {
        (self.drift_x, self.drift_y)
    }
}

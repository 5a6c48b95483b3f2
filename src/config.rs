//! Tracker configuration.
//!
//! Defaults are the build-time values; a JSON file may override any subset
//! of fields at startup. Nothing here is mutable once the loops are running.

use serde::Deserialize;
use std::{fs, path::{Path, PathBuf}, time::Duration};
use log::warn;

use crate::{
    error::ConfigError,
    tracking::{buffer::capacity_for, clock::TimeSource, generator::GeneratorParams, sample::MotionScale},
    uplink::transport::{Qos, TransportKind},
};

pub const DEFAULT_PERIOD_MS: u64 = 10_000;
pub const DEFAULT_BUFFER_DURATION_MIN: u64 = 10;
pub const DEFAULT_CALC_PERIOD_MS: u64 = 50;
pub const DEFAULT_OFFSET_X: f64 = 0.05;
pub const DEFAULT_OFFSET_Y: f64 = 0.0;
pub const DEFAULT_ORIGIN_LAT: f64 = 44.81584;
pub const DEFAULT_ORIGIN_LON: f64 = -93.63705;
pub const DEFAULT_TOPIC_POSTFIX: &str = "/location";
pub const DEFAULT_TIME_SYNC_WAIT_SECS: u64 = 60;
pub const DEFAULT_PEEK_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;
pub const DEFAULT_TASK_STACK_SIZE: usize = 256 * 1024;
pub const DEFAULT_STACK_WARN_BYTES: usize = 1024;
/// Upper bound on buffer slots; about eleven days at the default period.
pub const MAX_BUFFER_CAPACITY: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Delivery cadence.
    pub period_ms: u64,
    /// How long the buffer can cover a network outage.
    pub buffer_duration_min: u64,
    /// Internal generator cadence in synthetic mode.
    pub calc_period_ms: u64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub origin_lat: f64,
    pub origin_lon: f64,
    pub mock_default: bool,
    pub scale_default: MotionScale,
    pub paused_default: bool,
    pub qos: Qos,
    pub transport: TransportKind,
    pub time_source: TimeSource,
    pub topic_postfix: String,
    pub time_sync_wait_secs: u64,
    pub peek_timeout_ms: u64,
    pub retry_delay_ms: u64,
    pub task_stack_size: usize,
    pub stack_warn_bytes: usize,
    pub ui_enabled: bool,
    pub trace_csv: Option<PathBuf>,
    pub summary_csv: Option<PathBuf>,
    pub run_for_secs: Option<u64>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            period_ms: DEFAULT_PERIOD_MS,
            buffer_duration_min: DEFAULT_BUFFER_DURATION_MIN,
            calc_period_ms: DEFAULT_CALC_PERIOD_MS,
            offset_x: DEFAULT_OFFSET_X,
            offset_y: DEFAULT_OFFSET_Y,
            origin_lat: DEFAULT_ORIGIN_LAT,
            origin_lon: DEFAULT_ORIGIN_LON,
            mock_default: true,
            scale_default: MotionScale::Drive,
            paused_default: false,
            qos: Qos::AtLeastOnce,
            transport: TransportKind::Agent,
            time_source: TimeSource::System,
            topic_postfix: DEFAULT_TOPIC_POSTFIX.to_string(),
            time_sync_wait_secs: DEFAULT_TIME_SYNC_WAIT_SECS,
            peek_timeout_ms: DEFAULT_PEEK_TIMEOUT_MS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            task_stack_size: DEFAULT_TASK_STACK_SIZE,
            stack_warn_bytes: DEFAULT_STACK_WARN_BYTES,
            ui_enabled: false,
            trace_csv: None,
            summary_csv: None,
            run_for_secs: None,
        }
    }
}

impl TrackerConfig {
    /// Defaults overlaid with the fields present in a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period_ms == 0 {
            return Err(ConfigError::Zero { field: "period_ms" });
        }
        if self.calc_period_ms == 0 {
            return Err(ConfigError::Zero { field: "calc_period_ms" });
        }
        if self.buffer_duration_min == 0 {
            return Err(ConfigError::Zero { field: "buffer_duration_min" });
        }
        let buffer_ms = self
            .buffer_duration_min
            .checked_mul(60 * 1000)
            .ok_or(ConfigError::BufferDurationOverflow { minutes: self.buffer_duration_min })?;
        if self.calc_period_ms > self.period_ms {
            return Err(ConfigError::CalcPeriodTooLong {
                calc_ms: self.calc_period_ms,
                period_ms: self.period_ms,
            });
        }
        if buffer_ms < self.period_ms {
            return Err(ConfigError::BufferTooShort {
                buffer_ms,
                period_ms: self.period_ms,
            });
        }
        let capacity = buffer_ms.div_ceil(self.period_ms);
        if capacity > MAX_BUFFER_CAPACITY as u64 {
            return Err(ConfigError::BufferTooLarge {
                capacity,
                max: MAX_BUFFER_CAPACITY,
            });
        }
        if self.period_ms % self.calc_period_ms != 0 {
            warn!(
                "calc_period_ms {} does not divide period_ms {} evenly; synthetic smoothing will be approximate",
                self.calc_period_ms, self.period_ms
            );
        }
        Ok(())
    }

    /// Saturates; `validate()` rejects durations that would overflow.
    pub fn buffer_ms(&self) -> u64 {
        self.buffer_duration_min.saturating_mul(60 * 1000)
    }

    pub fn buffer_capacity(&self) -> usize {
        capacity_for(self.buffer_ms(), self.period_ms)
    }

    /// Generator invocations per delivered sample in synthetic mode.
    pub fn oversampling_factor(&self) -> u32 {
        (self.period_ms / self.calc_period_ms).max(1) as u32
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn generator_params(&self) -> GeneratorParams {
        GeneratorParams {
            offset_x: self.offset_x,
            offset_y: self.offset_y,
            calc_period_ms: self.calc_period_ms,
            origin_lon: self.origin_lon,
            origin_lat: self.origin_lat,
        }
    }

    pub fn topic_for(&self, client_id: &str) -> String {
        format!("{}{}", client_id, self.topic_postfix)
    }
}

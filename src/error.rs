//! Error types for setup and for the transport boundary.
//!
//! Nothing here crosses between the producer and publisher loops; those
//! handle their recoverable conditions locally and only log.

use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("calculation period {calc_ms} ms exceeds delivery period {period_ms} ms")]
    CalcPeriodTooLong { calc_ms: u64, period_ms: u64 },

    #[error("buffer duration {buffer_ms} ms holds less than one sample every {period_ms} ms")]
    BufferTooShort { buffer_ms: u64, period_ms: u64 },

    #[error("buffer duration of {minutes} min is out of range")]
    BufferDurationOverflow { minutes: u64 },

    #[error("buffer capacity {capacity} exceeds the limit of {max} samples")]
    BufferTooLarge { capacity: u64, max: usize },

    #[error("failed to read config {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("malformed config {path:?}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("link is not connected")]
    NotConnected,

    #[error("publish rejected: {0}")]
    Rejected(String),

    #[error("no acknowledgement within {0} ms")]
    AckTimeout(u64),

    #[error("transport agent is gone")]
    AgentGone,
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to spawn {name} thread: {source}")]
    Spawn { name: &'static str, source: io::Error },
}

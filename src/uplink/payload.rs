//! payload.rs
//! Wire payload for one sample.
//!
//! `{"SampleTime": <unix secs>, "Position": [<lon>, <lat>]}`. Key names and
//! order are a contract with downstream consumers.

use serde::Serialize;

use crate::tracking::sample::Sample;
use crate::utils::stack;

#[derive(Debug, Serialize)]
pub struct LocationPayload {
    #[serde(rename = "SampleTime")]
    pub sample_time: i64,
    #[serde(rename = "Position")]
    pub position: [f64; 2],
}

impl From<&Sample> for LocationPayload {
    fn from(s: &Sample) -> Self {
        Self {
            sample_time: s.captured_at,
            position: [s.longitude, s.latitude],
        }
    }
}

pub fn encode(sample: &Sample) -> String {
    stack::mark_depth();
    // A struct of an i64 and two f64s always serialises; non-finite floats become null.
    serde_json::to_string(&LocationPayload::from(sample)).unwrap_or_default()
}

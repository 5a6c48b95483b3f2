//! sample.rs
//! Position sample and motion scale types shared by the producer and publisher.

/// One timestamped position reading.
/// `captured_at` is Unix seconds; coordinates are decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub captured_at: i64,
    pub longitude: f64,
    pub latitude: f64,
}

impl Sample {
    pub fn new(captured_at: i64, longitude: f64, latitude: f64) -> Self {
        Self { captured_at, longitude, latitude }
    }
}

/// Multiplier applied to synthetic displacement increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionScale {
    Walk,   // ~6 MPH max
    Drive,  // ~60 MPH max
    Fly,    // ~600 MPH max
}

impl MotionScale {
    pub fn multiplier(&self) -> f64 {
        match self {
            MotionScale::Walk => 1.0,
            MotionScale::Drive => 10.0,
            MotionScale::Fly => 100.0,
        }
    }

    /// Walk → Drive → Fly → Walk.
    pub fn next(&self) -> Self {
        match self {
            MotionScale::Walk => MotionScale::Drive,
            MotionScale::Drive => MotionScale::Fly,
            MotionScale::Fly => MotionScale::Walk,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MotionScale::Walk => "Walk",
            MotionScale::Drive => "Drive",
            MotionScale::Fly => "Fly",
        }
    }

    pub(crate) fn to_raw(self) -> u8 {
        match self {
            MotionScale::Walk => 1,
            MotionScale::Drive => 10,
            MotionScale::Fly => 100,
        }
    }

    pub(crate) fn from_raw(raw: u8) -> Self {
        match raw {
            1 => MotionScale::Walk,
            100 => MotionScale::Fly,
            _ => MotionScale::Drive,
        }
    }
}

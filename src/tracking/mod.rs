// Tracking side: sample production into the local buffer.
// Generates position samples (synthetic or passthrough), paces them on a
// fixed period, and buffers them across connectivity gaps.

pub mod sample;
pub mod controls;
pub mod clock;
pub mod generator;
pub mod buffer;
pub mod producer;

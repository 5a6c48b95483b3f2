// Uplink side: readiness gating and in-order, at-least-once delivery of
// buffered samples through the transport collaborator.

pub mod gate;
pub mod payload;
pub mod transport;
pub mod publisher;

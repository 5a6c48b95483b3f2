// Diagnostics shared by the producer and publisher: counters, event trace,
// stack headroom and run summary export.
pub mod metrics;
pub mod stack;
pub mod export;

//! Buffered remote logging for the dock station.
//!
//! The firmware reports to its backend through a [`TelemetryBuffer`]: lines
//! are written to the local `tracing` log and/or queued for the log topic, and
//! the queue is drained by [`TelemetryBuffer::tick`] once per scheduler
//! iteration.

pub mod buffer;

pub use buffer::{FlushOutcome, TelemetryBuffer, TelemetryStats};

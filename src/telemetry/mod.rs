//! Telemetry emitted by the invocation core.
//!
//! Every admission decision and invocation outcome can be turned into a
//! [`events::PolicyEvent`] and handed to a [`sinks::TelemetrySink`]. Sinks are
//! `tower::Service<PolicyEvent>` implementations, so they compose with
//! `tower`'s combinators the same way any other service does.

pub mod events;
pub mod sinks;

pub use events::PolicyEvent;
pub use sinks::{emit_best_effort, LogSink, MemorySink, NullSink, TelemetrySink};

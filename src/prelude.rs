//! Convenient re-exports for common mjolnir-core types.
pub use crate::{
    bulkhead::{Bulkhead, BulkheadRejected, Permit, QueuedBulkhead, SemaphoreBulkhead},
    cancellation::{CancelCause, Cancelable, CancellationToken},
    circuit_breaker::{BreakerConfig, BreakerState, CircuitBreaker},
    clock::{Clock, MonotonicClock},
    command_metrics::CommandMetrics,
    config::{ConfigProvider, ConfigValue, StaticConfig},
    descriptor::CommandDescriptor,
    error::{BoxError, CommandResult, CommandStatus, CoreError, Diagnostics, TimeoutMillis},
    fallback_gate::{FallbackGate, FallbackRejected},
    group_key::GroupKey,
    interceptor::{Command, CommandFactory},
    invoker::{BoxFuture, CommandBody, CommandInvoker, FallbackBody, OnFailure, TimeoutArg},
    registry::{BulkheadKind, CommandGroupResources, Registry},
    rolling_counter::{EventKind, RollingCounter},
    telemetry::{emit_best_effort, LogSink, MemorySink, NullSink, PolicyEvent, TelemetrySink},
};

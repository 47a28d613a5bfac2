use std::borrow::Cow;
use std::fmt;

/// One emitted telemetry line: a stable `service` string, a `status` label,
/// and the numeric payload (elapsed milliseconds, a gauge value, or a count),
/// mirroring spec.md §6's `(service, status, elapsedOrValue)` triple.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyEvent {
    pub service: Cow<'static, str>,
    pub status: &'static str,
    pub value: f64,
}

impl PolicyEvent {
    pub fn new(service: impl Into<Cow<'static, str>>, status: &'static str, value: f64) -> Self {
        Self { service: service.into(), status, value }
    }

    /// `mjolnir command <name> execute`, status from `CommandStatus`,
    /// value = elapsed milliseconds.
    pub fn command_execute(name: &str, status: &'static str, elapsed_millis: u64) -> Self {
        Self::new(format!("mjolnir command {name} execute"), status, elapsed_millis as f64)
    }

    /// `mjolnir breaker <key> IsAllowing`, status `"true"`/`"false"`.
    pub fn breaker_is_allowing(key: &str, allowed: bool) -> Self {
        Self::new(
            format!("mjolnir breaker {key} IsAllowing"),
            if allowed { "true" } else { "false" },
            if allowed { 1.0 } else { 0.0 },
        )
    }

    /// `mjolnir breaker <key> total`, value = operations in the window.
    pub fn breaker_total(key: &str, total: u64) -> Self {
        Self::new(format!("mjolnir breaker {key} total"), "gauge", total as f64)
    }

    /// `mjolnir breaker <key> error`, value = error percent in the window.
    pub fn breaker_error_percent(key: &str, error_percent: u8) -> Self {
        Self::new(format!("mjolnir breaker {key} error"), "gauge", error_percent as f64)
    }

    /// `mjolnir pool <key> activeThreads`, value = in-flight count.
    pub fn pool_active_threads(key: &str, active: usize) -> Self {
        Self::new(format!("mjolnir pool {key} activeThreads"), "gauge", active as f64)
    }
}

impl fmt::Display for PolicyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} status={} value={}", self.service, self.status, self.value)
    }
}

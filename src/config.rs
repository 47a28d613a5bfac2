//! The key -> typed-value configuration surface the core consumes.
//!
//! The core never parses config files or talks to a config service; it only
//! needs a [`ConfigProvider`] to read the keys listed in spec.md §6. Real
//! providers (env, file, remote) are external collaborators.

use std::collections::HashMap;
use std::sync::RwLock;

/// Read-side contract for configuration. Implementations may be backed by
/// anything; the core only ever reads, never writes.
pub trait ConfigProvider: Send + Sync {
    fn get_bool(&self, key: &str) -> Option<bool>;
    fn get_int(&self, key: &str) -> Option<i64>;

    fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    fn get_int_or(&self, key: &str, default: i64) -> i64 {
        self.get_int(key).unwrap_or(default)
    }
}

/// A single config value as stored by [`StaticConfig`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
}

/// An in-memory provider, typically built once at process start and then
/// mutated in place (via [`StaticConfig::set`]) as change events arrive from
/// an external provider. Every read takes the lock fresh, so no invoke ever
/// observes a value older than the last `set` that happened-before it.
#[derive(Debug, Default)]
pub struct StaticConfig {
    values: RwLock<HashMap<String, ConfigValue>>,
}

impl StaticConfig {
    pub fn new() -> Self {
        Self { values: RwLock::new(HashMap::new()) }
    }

    pub fn set(&self, key: impl Into<String>, value: ConfigValue) {
        self.values.write().expect("config lock poisoned").insert(key.into(), value);
    }

    pub fn set_bool(&self, key: impl Into<String>, value: bool) {
        self.set(key, ConfigValue::Bool(value));
    }

    pub fn set_int(&self, key: impl Into<String>, value: i64) {
        self.set(key, ConfigValue::Int(value));
    }

    pub fn remove(&self, key: &str) {
        self.values.write().expect("config lock poisoned").remove(key);
    }
}

impl ConfigProvider for StaticConfig {
    fn get_bool(&self, key: &str) -> Option<bool> {
        match self.values.read().expect("config lock poisoned").get(key) {
            Some(ConfigValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    fn get_int(&self, key: &str) -> Option<i64> {
        match self.values.read().expect("config lock poisoned").get(key) {
            Some(ConfigValue::Int(n)) => Some(*n),
            _ => None,
        }
    }
}

/// Well-known configuration keys from spec.md §6, as key-builder helpers so
/// call sites don't hand-format strings.
pub mod keys {
    pub const USE_CIRCUIT_BREAKERS: &str = "mjolnir.useCircuitBreakers";
    pub const IGNORE_TIMEOUTS: &str = "mjolnir.ignoreTimeouts";
    pub const GAUGE_INTERVAL_MILLIS: &str = "mjolnir.gaugeIntervalMillis";

    pub fn command_timeout(name: &str) -> String {
        format!("command.{name}.Timeout")
    }

    pub fn breaker_minimum_operations(key: &str) -> String {
        format!("mjolnir.breaker.{key}.minimumOperations")
    }

    pub fn breaker_threshold_percent(key: &str) -> String {
        format!("mjolnir.breaker.{key}.thresholdPercent")
    }

    pub fn breaker_tripped_duration_millis(key: &str) -> String {
        format!("mjolnir.breaker.{key}.trippedDurationMillis")
    }

    pub fn breaker_force_tripped(key: &str) -> String {
        format!("mjolnir.breaker.{key}.forceTripped")
    }

    pub fn breaker_force_fixed(key: &str) -> String {
        format!("mjolnir.breaker.{key}.forceFixed")
    }

    pub fn pool_thread_count(key: &str) -> String {
        format!("mjolnir.pools.{key}.threadCount")
    }

    pub fn pool_queue_length(key: &str) -> String {
        format!("mjolnir.pools.{key}.queueLength")
    }

    pub fn fallback_max_concurrent(key: &str) -> String {
        format!("mjolnir.fallback.{key}.maxConcurrent")
    }
}

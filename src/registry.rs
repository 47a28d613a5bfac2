//! Process-wide (or explicit-instance) lookup from a [`GroupKey`] to the
//! circuit breaker, bulkhead, and fallback gate guarding that dependency
//! group. Entries are created lazily on first use and then live for the
//! registry's lifetime; there is no eviction.

use crate::bulkhead::{Bulkhead, DEFAULT_MAX_CONCURRENT as DEFAULT_BULKHEAD_CONCURRENT};
use crate::circuit_breaker::{BreakerConfig, CircuitBreaker};
use crate::clock::Clock;
use crate::config::{keys, ConfigProvider};
use crate::fallback_gate::FallbackGate;
use crate::group_key::GroupKey;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// The three admission-control primitives guarding one dependency group.
///
/// `bulkhead` is `ArcSwap`-wrapped, not a bare `Bulkhead`: per spec.md §4.4,
/// a `maxConcurrent`/`queueLength` change must create a new underlying
/// bulkhead atomically, with in-flight operations on the old one running to
/// completion rather than being disturbed. `breaker`'s thresholds, by
/// contrast, hot-reload in place via its own internal `ArcSwap<BreakerConfig>`
/// (see `circuit_breaker.rs`), since swapping a whole new `CircuitBreaker`
/// would also discard its state machine and rolling metrics.
pub struct CommandGroupResources {
    pub breaker: CircuitBreaker,
    pub bulkhead: ArcSwap<Bulkhead>,
    pub fallback_gate: FallbackGate,
}

/// Which [`Bulkhead`] variant new entries should be built with. The registry
/// itself is agnostic; callers pick per deployment (caller-thread bodies use
/// [`BulkheadKind::Semaphore`], owned-executor bodies use [`BulkheadKind::Queued`]).
#[derive(Debug, Clone, Copy)]
pub enum BulkheadKind {
    Semaphore,
    Queued { worker_count: usize },
}

pub struct Registry {
    entries: RwLock<HashMap<GroupKey, Arc<CommandGroupResources>>>,
    clock: Arc<dyn Clock>,
    config: Arc<dyn ConfigProvider>,
    bulkhead_kind: BulkheadKind,
}

impl Registry {
    pub fn new(clock: Arc<dyn Clock>, config: Arc<dyn ConfigProvider>) -> Self {
        Self::with_bulkhead_kind(clock, config, BulkheadKind::Semaphore)
    }

    pub fn with_bulkhead_kind(
        clock: Arc<dyn Clock>,
        config: Arc<dyn ConfigProvider>,
        bulkhead_kind: BulkheadKind,
    ) -> Self {
        Self { entries: RwLock::new(HashMap::new()), clock, config, bulkhead_kind }
    }

    /// Returns the resources for `key`, creating them from current config on
    /// first access. On every subsequent access this also reapplies current
    /// config — breaker thresholds in place, and the bulkhead via an atomic
    /// swap if its configured capacity changed — so admission checks never
    /// run against a stale snapshot frozen at first use (spec.md §4.3/§4.4).
    pub fn resources_for(&self, key: &GroupKey) -> Arc<CommandGroupResources> {
        if let Some(existing) = self.entries.read().expect("registry lock poisoned").get(key) {
            let existing = existing.clone();
            self.refresh_breaker_config(key);
            self.refresh_bulkhead_config(key);
            return existing;
        }

        let mut guard = self.entries.write().expect("registry lock poisoned");
        // Re-check: another writer may have raced us between the read-lock
        // release above and acquiring the write lock here.
        if let Some(existing) = guard.get(key) {
            return existing.clone();
        }
        let created = Arc::new(self.build_resources(key));
        guard.insert(key.clone(), created.clone());
        created
    }

    /// All known (key, resources) pairs, for periodic gauge publishing.
    pub fn snapshot(&self) -> Vec<(GroupKey, Arc<CommandGroupResources>)> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn read_breaker_config(&self, key: &GroupKey) -> BreakerConfig {
        BreakerConfig {
            minimum_operations: self
                .config
                .get_int_or(&keys::breaker_minimum_operations(key.as_str()), 10)
                .max(0) as u32,
            threshold_percent: self
                .config
                .get_int_or(&keys::breaker_threshold_percent(key.as_str()), 50)
                .clamp(0, 100) as u8,
            tripped_duration: Duration::from_millis(
                self.config
                    .get_int_or(&keys::breaker_tripped_duration_millis(key.as_str()), 10_000)
                    .max(0) as u64,
            ),
            force_tripped: self.config.get_bool_or(&keys::breaker_force_tripped(key.as_str()), false),
            force_fixed: self.config.get_bool_or(&keys::breaker_force_fixed(key.as_str()), false),
        }
    }

    /// The bulkhead capacity this key's config currently calls for, without
    /// building one. Cheap: used to decide whether a rebuild is warranted at
    /// all before paying for one (rebuilding a `Queued` bulkhead spawns fresh
    /// worker tasks, so doing it unconditionally on every lookup would churn
    /// tasks on every single invocation).
    fn desired_bulkhead_capacity(&self, key: &GroupKey) -> usize {
        match self.bulkhead_kind {
            BulkheadKind::Semaphore => self
                .config
                .get_int_or(&keys::pool_thread_count(key.as_str()), DEFAULT_BULKHEAD_CONCURRENT as i64)
                .max(1) as usize,
            BulkheadKind::Queued { worker_count } => {
                let queue_length = self
                    .config
                    .get_int_or(&keys::pool_queue_length(key.as_str()), worker_count as i64)
                    .max(1) as usize;
                worker_count.max(1) + queue_length
            }
        }
    }

    fn build_bulkhead(&self, key: &GroupKey) -> Bulkhead {
        match self.bulkhead_kind {
            BulkheadKind::Semaphore => {
                let max_concurrent = self
                    .config
                    .get_int_or(&keys::pool_thread_count(key.as_str()), DEFAULT_BULKHEAD_CONCURRENT as i64)
                    .max(1) as usize;
                Bulkhead::semaphore(max_concurrent)
            }
            BulkheadKind::Queued { worker_count } => {
                let queue_length = self
                    .config
                    .get_int_or(&keys::pool_queue_length(key.as_str()), worker_count as i64)
                    .max(1) as usize;
                Bulkhead::queued(worker_count, queue_length)
            }
        }
    }

    fn build_resources(&self, key: &GroupKey) -> CommandGroupResources {
        let breaker = CircuitBreaker::with_config(self.read_breaker_config(key), self.clock.clone());
        let bulkhead = ArcSwap::from_pointee(self.build_bulkhead(key));

        let fallback_max = self
            .config
            .get_int_or(&keys::fallback_max_concurrent(key.as_str()), crate::fallback_gate::DEFAULT_MAX_CONCURRENT as i64)
            .max(1) as usize;
        let fallback_gate = FallbackGate::new(fallback_max);

        CommandGroupResources { breaker, bulkhead, fallback_gate }
    }

    /// Reapplies current config to an already-created breaker's threshold
    /// settings without disturbing its state machine. No-op if `key` has no
    /// entry yet.
    pub fn refresh_breaker_config(&self, key: &GroupKey) {
        let entry = match self.entries.read().expect("registry lock poisoned").get(key) {
            Some(e) => e.clone(),
            None => return,
        };
        entry.breaker.update_config(self.read_breaker_config(key));
    }

    /// Atomically swaps in a freshly built bulkhead if the configured
    /// capacity for `key` has changed since the last build. In-flight
    /// operations already holding a permit from the old bulkhead are
    /// unaffected and run to completion; only calls admitted after the swap
    /// see the new capacity. No-op if `key` has no entry yet or its capacity
    /// is unchanged.
    pub fn refresh_bulkhead_config(&self, key: &GroupKey) {
        let entry = match self.entries.read().expect("registry lock poisoned").get(key) {
            Some(e) => e.clone(),
            None => return,
        };
        let desired = self.desired_bulkhead_capacity(key);
        if entry.bulkhead.load().max_concurrent() != desired {
            entry.bulkhead.store(Arc::new(self.build_bulkhead(key)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::BreakerState;
    use crate::clock::MonotonicClock;
    use crate::config::StaticConfig;

    fn registry() -> Registry {
        Registry::new(Arc::new(MonotonicClock::default()), Arc::new(StaticConfig::new()))
    }

    #[test]
    fn same_key_returns_same_resources() {
        let registry = registry();
        let key = GroupKey::from("orders-db");
        let a = registry.resources_for(&key);
        let b = registry.resources_for(&key);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn distinct_keys_get_distinct_resources() {
        let registry = registry();
        let a = registry.resources_for(&GroupKey::from("orders-db"));
        let b = registry.resources_for(&GroupKey::from("inventory-db"));
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn honors_config_at_creation_time() {
        let config = Arc::new(StaticConfig::new());
        config.set_int(keys::breaker_threshold_percent("orders-db"), 90);
        let registry = Registry::new(Arc::new(MonotonicClock::default()), config);
        let resources = registry.resources_for(&GroupKey::from("orders-db"));
        assert_eq!(resources.breaker.config().threshold_percent, 90);
    }

    #[test]
    fn refresh_applies_new_config_without_resetting_state() {
        let config = Arc::new(StaticConfig::new());
        let registry = Registry::new(Arc::new(MonotonicClock::default()), config.clone());
        let key = GroupKey::from("orders-db");
        let resources = registry.resources_for(&key);
        for _ in 0..10 {
            resources.breaker.metrics().mark_failure();
            resources.breaker.on_failure_observed();
        }
        assert_eq!(resources.breaker.state(), BreakerState::Open);

        config.set_int(keys::breaker_threshold_percent("orders-db"), 99);
        registry.refresh_breaker_config(&key);
        assert_eq!(resources.breaker.config().threshold_percent, 99);
        assert_eq!(resources.breaker.state(), BreakerState::Open);
    }

    #[test]
    fn queued_bulkhead_kind_uses_queue_length_config() {
        let config = Arc::new(StaticConfig::new());
        config.set_int(keys::pool_queue_length("batch"), 5);
        let registry = Registry::with_bulkhead_kind(
            Arc::new(MonotonicClock::default()),
            config,
            BulkheadKind::Queued { worker_count: 2 },
        );
        let resources = registry.resources_for(&GroupKey::from("batch"));
        assert!(matches!(**resources.bulkhead.load(), Bulkhead::Queued(_)));
    }

    #[test]
    fn resources_for_atomically_rebuilds_bulkhead_on_capacity_change() {
        let config = Arc::new(StaticConfig::new());
        config.set_int(keys::pool_thread_count("orders-db"), 4);
        let registry = Registry::new(Arc::new(MonotonicClock::default()), config.clone());
        let key = GroupKey::from("orders-db");

        let first = registry.resources_for(&key);
        assert_eq!(first.bulkhead.load().max_concurrent(), 4);

        config.set_int(keys::pool_thread_count("orders-db"), 8);
        let second = registry.resources_for(&key);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.bulkhead.load().max_concurrent(), 8);
    }

    #[test]
    fn resources_for_does_not_rebuild_bulkhead_when_capacity_is_unchanged() {
        let config = Arc::new(StaticConfig::new());
        config.set_int(keys::pool_thread_count("orders-db"), 4);
        let registry = Registry::new(Arc::new(MonotonicClock::default()), config);
        let key = GroupKey::from("orders-db");

        let resources = registry.resources_for(&key);
        let before = Arc::as_ptr(&resources.bulkhead.load());
        registry.resources_for(&key);
        let after = Arc::as_ptr(&resources.bulkhead.load());
        assert_eq!(before, after);
    }
}

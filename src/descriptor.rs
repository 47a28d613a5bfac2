//! Immutable per-invocation metadata: the command's name, which group/breaker/
//! bulkhead it belongs to, and its default timeout.

use crate::group_key::GroupKey;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Metadata constructed once per command instance and consumed by exactly one
/// [`crate::invoker::CommandInvoker::invoke_async`] call.
#[derive(Debug)]
pub struct CommandDescriptor {
    name: String,
    group: GroupKey,
    breaker_key: GroupKey,
    bulkhead_key: GroupKey,
    default_timeout: Duration,
    has_invoked: AtomicBool,
}

impl CommandDescriptor {
    /// Derives the name as `"<group-with-dots-replaced-by-dashes>.<type_name>"`,
    /// per spec.md §3. `type_name` stands in for the source's runtime class
    /// name: Rust has no equivalent reflection at this layer, so callers pass
    /// a `&'static str` (typically `std::any::type_name::<T>()`'s last
    /// segment, or a literal) alongside the body they construct.
    pub fn derive(group: GroupKey, type_name: &str) -> CommandDescriptor {
        let sanitized_group = group.as_str().replace('.', "-");
        let name = format!("{sanitized_group}.{type_name}");
        Self::with_name(name, group)
    }

    /// Builds a descriptor with an explicitly supplied name, bypassing
    /// derivation. `breaker_key` and `bulkhead_key` default to `group`;
    /// use [`Self::with_keys`] to separate them.
    pub fn with_name(name: impl Into<String>, group: GroupKey) -> CommandDescriptor {
        let breaker_key = group.clone();
        let bulkhead_key = group.clone();
        Self::with_keys(name, group, breaker_key, bulkhead_key, Duration::from_millis(1000))
    }

    pub fn with_keys(
        name: impl Into<String>,
        group: GroupKey,
        breaker_key: GroupKey,
        bulkhead_key: GroupKey,
        default_timeout: Duration,
    ) -> CommandDescriptor {
        Self {
            name: name.into(),
            group,
            breaker_key,
            bulkhead_key,
            default_timeout,
            has_invoked: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> &GroupKey {
        &self.group
    }

    pub fn breaker_key(&self) -> &GroupKey {
        &self.breaker_key
    }

    pub fn bulkhead_key(&self) -> &GroupKey {
        &self.bulkhead_key
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Atomically flips the single-use guard from false to true. Returns
    /// `true` the first time it is called on a given descriptor, `false`
    /// every time after — the invoker treats the latter as a programming
    /// error regardless of `onFailure`.
    pub fn try_mark_invoked(&self) -> bool {
        self.has_invoked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_name_replacing_group_dots_with_dashes() {
        let descriptor = CommandDescriptor::derive(GroupKey::from("orders.db"), "FetchOrder");
        assert_eq!(descriptor.name(), "orders-db.FetchOrder");
    }

    #[test]
    fn first_invoke_succeeds_second_fails() {
        let descriptor = CommandDescriptor::with_name("test.NoOp", GroupKey::from("test"));
        assert!(descriptor.try_mark_invoked());
        assert!(!descriptor.try_mark_invoked());
        assert!(!descriptor.try_mark_invoked());
    }

    #[test]
    fn with_name_defaults_breaker_and_bulkhead_keys_to_group() {
        let descriptor = CommandDescriptor::with_name("test.NoOp", GroupKey::from("test"));
        assert_eq!(descriptor.breaker_key(), descriptor.group());
        assert_eq!(descriptor.bulkhead_key(), descriptor.group());
    }

    #[test]
    fn with_keys_allows_distinct_breaker_and_bulkhead_keys() {
        let descriptor = CommandDescriptor::with_keys(
            "test.NoOp",
            GroupKey::from("orders"),
            GroupKey::from("orders-breaker"),
            GroupKey::from("orders-pool"),
            Duration::from_millis(500),
        );
        assert_eq!(descriptor.breaker_key().as_str(), "orders-breaker");
        assert_eq!(descriptor.bulkhead_key().as_str(), "orders-pool");
        assert_eq!(descriptor.default_timeout(), Duration::from_millis(500));
    }
}

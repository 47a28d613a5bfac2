//! Thin facade over a [`RollingCounter`] exposing the breaker's health view:
//! total operations and error percentage over the window.

use crate::clock::Clock;
use crate::rolling_counter::{EventKind, RollingCounter};
use std::sync::Arc;

/// Event kinds that count as errors for breaker purposes, per spec.md §4.2.
const ERROR_KINDS: [EventKind; 4] = [
    EventKind::Failure,
    EventKind::TimedOut,
    EventKind::ThreadPoolRejected,
    EventKind::BulkheadRejected,
];

pub struct CommandMetrics {
    counter: RollingCounter,
    clock: Arc<dyn Clock>,
}

impl CommandMetrics {
    pub fn new(counter: RollingCounter, clock: Arc<dyn Clock>) -> Self {
        Self { counter, clock }
    }

    fn now(&self) -> u64 {
        self.clock.now_millis()
    }

    /// Total operations (every kind) within the window.
    pub fn total(&self) -> u64 {
        self.counter.get_total(self.now())
    }

    /// Errors as a percentage of `total`, rounded to the nearest integer;
    /// `0` when `total == 0`.
    pub fn error_percent(&self) -> u8 {
        let now = self.now();
        let total = self.counter.get_total(now);
        if total == 0 {
            return 0;
        }
        let errors: u64 = ERROR_KINDS.iter().map(|k| self.counter.get_count(*k, now)).sum();
        (((errors * 100) + total / 2) / total) as u8
    }

    pub fn mark_success(&self) {
        self.counter.increment(EventKind::Success, self.now());
    }

    pub fn mark_failure(&self) {
        self.counter.increment(EventKind::Failure, self.now());
    }

    pub fn mark_short_circuited(&self) {
        self.counter.increment(EventKind::ShortCircuited, self.now());
    }

    pub fn mark_timeout(&self) {
        self.counter.increment(EventKind::TimedOut, self.now());
    }

    pub fn mark_thread_pool_rejected(&self) {
        self.counter.increment(EventKind::ThreadPoolRejected, self.now());
    }

    pub fn mark_bulkhead_rejected(&self) {
        self.counter.increment(EventKind::BulkheadRejected, self.now());
    }

    pub fn mark_bad_request(&self) {
        self.counter.increment(EventKind::BadRequest, self.now());
    }

    pub fn reset(&self) {
        self.counter.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MonotonicClock;

    fn metrics() -> CommandMetrics {
        CommandMetrics::new(RollingCounter::new(10, 10_000), Arc::new(MonotonicClock::default()))
    }

    #[test]
    fn empty_window_has_zero_percent_and_zero_total() {
        let m = metrics();
        assert_eq!(m.total(), 0);
        assert_eq!(m.error_percent(), 0);
    }

    #[test]
    fn error_percent_rounds_to_nearest() {
        let m = metrics();
        m.mark_success();
        m.mark_success();
        m.mark_failure();
        // 1/3 -> 33.33% rounds to 33
        assert_eq!(m.total(), 3);
        assert_eq!(m.error_percent(), 33);
    }

    #[test]
    fn rejections_count_as_errors_not_successes() {
        let m = metrics();
        m.mark_success();
        m.mark_bulkhead_rejected();
        assert_eq!(m.total(), 2);
        assert_eq!(m.error_percent(), 50);
    }

    #[test]
    fn reset_zeroes_the_window() {
        let m = metrics();
        m.mark_failure();
        m.mark_failure();
        assert_eq!(m.total(), 2);
        m.reset();
        assert_eq!(m.total(), 0);
        assert_eq!(m.error_percent(), 0);
    }
}

//! Time-bucketed event counter backing the circuit breaker's health metrics.
//!
//! A logical ring of `N` buckets covers a window of `W` milliseconds. Writes
//! are amortized O(1); reads are O(N) and never block a concurrent writer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

pub const DEFAULT_BUCKET_COUNT: usize = 10;
pub const DEFAULT_WINDOW_MILLIS: u64 = 10_000;

/// Discrete event kinds tracked per bucket, in fixed array order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Success,
    Failure,
    ShortCircuited,
    TimedOut,
    ThreadPoolRejected,
    BulkheadRejected,
    BadRequest,
}

const KIND_COUNT: usize = 7;

impl EventKind {
    fn index(self) -> usize {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::ShortCircuited => 2,
            Self::TimedOut => 3,
            Self::ThreadPoolRejected => 4,
            Self::BulkheadRejected => 5,
            Self::BadRequest => 6,
        }
    }

    pub const ALL: [EventKind; KIND_COUNT] = [
        Self::Success,
        Self::Failure,
        Self::ShortCircuited,
        Self::TimedOut,
        Self::ThreadPoolRejected,
        Self::BulkheadRejected,
        Self::BadRequest,
    ];
}

struct Bucket {
    /// Millisecond stamp of this bucket's start, or `u64::MAX` before first use.
    start_millis: AtomicU64,
    counts: [AtomicU64; KIND_COUNT],
}

impl Bucket {
    fn empty() -> Self {
        Self {
            start_millis: AtomicU64::new(u64::MAX),
            counts: Default::default(),
        }
    }
}

/// A time-bucketed ring counter over a fixed window.
pub struct RollingCounter {
    buckets: Vec<Mutex<()>>,
    cells: Vec<Bucket>,
    bucket_count: u64,
    bucket_width_millis: u64,
    window_millis: u64,
}

impl RollingCounter {
    pub fn new(bucket_count: usize, window_millis: u64) -> Self {
        assert!(bucket_count > 0, "bucket_count must be positive");
        assert!(window_millis > 0, "window_millis must be positive");
        let mut cells = Vec::with_capacity(bucket_count);
        let mut buckets = Vec::with_capacity(bucket_count);
        for _ in 0..bucket_count {
            cells.push(Bucket::empty());
            buckets.push(Mutex::new(()));
        }
        Self {
            buckets,
            cells,
            bucket_count: bucket_count as u64,
            bucket_width_millis: (window_millis / bucket_count as u64).max(1),
            window_millis,
        }
    }

    /// Record one event of the given kind at `now_millis`.
    pub fn increment(&self, kind: EventKind, now_millis: u64) {
        let slot = (now_millis / self.bucket_width_millis) % self.bucket_count;
        let bucket_start = (now_millis / self.bucket_width_millis) * self.bucket_width_millis;
        let cell = &self.cells[slot as usize];

        // Fast path: bucket is current, just bump the atomic.
        if cell.start_millis.load(Ordering::Acquire) == bucket_start {
            cell.counts[kind.index()].fetch_add(1, Ordering::AcqRel);
            return;
        }

        // Slow path: the slot may be stale (or fresh). Reinitialize under the
        // per-slot lock so concurrent writers to the same slot don't race on
        // the reset-then-increment sequence.
        let _guard = self.buckets[slot as usize].lock().expect("rolling counter lock poisoned");
        if cell.start_millis.load(Ordering::Acquire) != bucket_start {
            for c in &cell.counts {
                c.store(0, Ordering::Release);
            }
            cell.start_millis.store(bucket_start, Ordering::Release);
        }
        cell.counts[kind.index()].fetch_add(1, Ordering::AcqRel);
    }

    /// Sum of `kind` events across all buckets whose start lies within
    /// `[now_millis - window_millis, now_millis]`.
    pub fn get_count(&self, kind: EventKind, now_millis: u64) -> u64 {
        let window_start = now_millis.saturating_sub(self.window_millis);
        self.cells
            .iter()
            .filter(|cell| {
                let start = cell.start_millis.load(Ordering::Acquire);
                start != u64::MAX && start >= window_start && start <= now_millis
            })
            .map(|cell| cell.counts[kind.index()].load(Ordering::Acquire))
            .sum()
    }

    /// Total events of every kind within the window.
    pub fn get_total(&self, now_millis: u64) -> u64 {
        EventKind::ALL.iter().map(|k| self.get_count(*k, now_millis)).sum()
    }

    /// Zero every bucket. Used when a breaker transitions Open -> Closed.
    pub fn reset(&self) {
        for (idx, cell) in self.cells.iter().enumerate() {
            let _guard = self.buckets[idx].lock().expect("rolling counter lock poisoned");
            for c in &cell.counts {
                c.store(0, Ordering::Release);
            }
            cell.start_millis.store(u64::MAX, Ordering::Release);
        }
    }
}

impl Default for RollingCounter {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET_COUNT, DEFAULT_WINDOW_MILLIS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_within_window_are_summed() {
        let counter = RollingCounter::new(10, 10_000);
        counter.increment(EventKind::Success, 0);
        counter.increment(EventKind::Success, 100);
        counter.increment(EventKind::Failure, 200);
        assert_eq!(counter.get_count(EventKind::Success, 9_999), 2);
        assert_eq!(counter.get_count(EventKind::Failure, 9_999), 1);
    }

    #[test]
    fn buckets_outside_window_are_excluded() {
        let counter = RollingCounter::new(10, 10_000);
        counter.increment(EventKind::Success, 0);
        // far enough in the future that bucket 0's stamp (0ms) is outside the window
        assert_eq!(counter.get_count(EventKind::Success, 25_000), 0);
    }

    #[test]
    fn stale_bucket_is_reinitialized_not_accumulated() {
        let counter = RollingCounter::new(10, 10_000); // bucket width 1000ms
        counter.increment(EventKind::Success, 0); // bucket 0, stamp 0
        counter.increment(EventKind::Success, 10_000); // same slot (0 % 10), stamp 10000, stale vs stamp 0
        // old event has rolled out of the window relative to now=10_000
        assert_eq!(counter.get_count(EventKind::Success, 10_000), 1);
    }

    #[test]
    fn reset_zeroes_all_buckets() {
        let counter = RollingCounter::new(10, 10_000);
        for ms in 0..10 {
            counter.increment(EventKind::Failure, ms * 100);
        }
        assert!(counter.get_total(900) > 0);
        counter.reset();
        assert_eq!(counter.get_total(900), 0);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        use std::sync::Arc;
        use std::thread;

        let counter = Arc::new(RollingCounter::new(10, 10_000));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let counter = counter.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    counter.increment(EventKind::Success, 500);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.get_count(EventKind::Success, 500), 8000);
    }
}

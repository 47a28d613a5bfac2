//! A small semaphore limiting how many fallback bodies may run concurrently
//! per command group, so a fallback storm can't itself become an outage.
//!
//! Architecturally identical to [`SemaphoreBulkhead`](crate::bulkhead::SemaphoreBulkhead);
//! newtyped so its rejection carries fallback-specific semantics.

use crate::bulkhead::{BulkheadRejected, Permit, SemaphoreBulkhead};

pub const DEFAULT_MAX_CONCURRENT: usize = 10;

#[derive(Clone)]
pub struct FallbackGate {
    inner: SemaphoreBulkhead,
}

impl FallbackGate {
    pub fn new(max_concurrent: usize) -> Self {
        Self { inner: SemaphoreBulkhead::new(max_concurrent) }
    }

    pub fn max_concurrent(&self) -> usize {
        self.inner.max_concurrent()
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight()
    }

    /// Acquire a fallback slot or fail immediately; never blocks.
    pub fn try_acquire(&self) -> Result<Permit, FallbackRejected> {
        self.inner.try_acquire().map_err(FallbackRejected::from)
    }
}

impl Default for FallbackGate {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackRejected {
    pub in_flight: usize,
    pub max: usize,
}

impl From<BulkheadRejected> for FallbackRejected {
    fn from(r: BulkheadRejected) -> Self {
        Self { in_flight: r.in_flight, max: r.max }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_capacity_then_rejects() {
        let gate = FallbackGate::new(1);
        let _permit = gate.try_acquire().unwrap();
        assert!(gate.try_acquire().is_err());
    }

    #[test]
    fn releases_on_drop() {
        let gate = FallbackGate::new(1);
        {
            let _permit = gate.try_acquire().unwrap();
            assert_eq!(gate.in_flight(), 1);
        }
        assert_eq!(gate.in_flight(), 0);
    }

    #[test]
    fn default_capacity_is_ten() {
        let gate = FallbackGate::default();
        assert_eq!(gate.max_concurrent(), 10);
    }
}

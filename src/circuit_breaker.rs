//! Circuit breaker: a three-state gate driven by [`CommandMetrics`] that
//! admits or short-circuits calls to a dependency.
//!
//! Lock-free state transitions via CAS, an atomics-first circuit breaker
//! driven by a rolling error-rate window instead of a raw
//! consecutive-failure count.

use crate::clock::Clock;
use crate::command_metrics::CommandMetrics;
use crate::rolling_counter::RollingCounter;
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

const STATE_CLOSED: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_HALF_OPEN_PROBE: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpenProbe,
}

impl From<u8> for BreakerState {
    fn from(v: u8) -> Self {
        match v {
            STATE_CLOSED => Self::Closed,
            STATE_OPEN => Self::Open,
            STATE_HALF_OPEN_PROBE => Self::HalfOpenProbe,
            _ => unreachable!("invalid breaker state byte"),
        }
    }
}

/// Hot-reloadable breaker configuration, per breaker key.
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub minimum_operations: u32,
    pub threshold_percent: u8,
    pub tripped_duration: Duration,
    pub force_tripped: bool,
    pub force_fixed: bool,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            minimum_operations: 10,
            threshold_percent: 50,
            tripped_duration: Duration::from_millis(10_000),
            force_tripped: false,
            force_fixed: false,
        }
    }
}

pub struct CircuitBreaker {
    state: AtomicU8,
    opened_at_millis: AtomicU64,
    config: ArcSwap<BreakerConfig>,
    metrics: CommandMetrics,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_config(BreakerConfig::default(), clock)
    }

    pub fn with_config(config: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        let metrics = CommandMetrics::new(RollingCounter::default(), clock.clone());
        Self {
            state: AtomicU8::new(STATE_CLOSED),
            opened_at_millis: AtomicU64::new(0),
            config: ArcSwap::from_pointee(config),
            metrics,
            clock,
        }
    }

    /// Swap the hot-reloadable configuration in place. Does not reset state.
    pub fn update_config(&self, config: BreakerConfig) {
        self.config.store(Arc::new(config));
    }

    pub fn config(&self) -> BreakerConfig {
        *self.config.load_full()
    }

    pub fn metrics(&self) -> &CommandMetrics {
        &self.metrics
    }

    pub fn state(&self) -> BreakerState {
        self.state.load(Ordering::Acquire).into()
    }

    fn now(&self) -> u64 {
        self.clock.now_millis()
    }

    /// Returns true iff the caller may proceed. Never mutates metrics; may
    /// mutate breaker state on Open -> HalfOpenProbe transitions.
    pub fn is_allowing(&self) -> bool {
        let config = self.config.load();
        if config.force_fixed {
            return true;
        }
        if config.force_tripped {
            return false;
        }

        match self.state.load(Ordering::Acquire).into() {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let opened_at = self.opened_at_millis.load(Ordering::Acquire);
                let elapsed = self.now().saturating_sub(opened_at);
                if elapsed < config.tripped_duration.as_millis() as u64 {
                    return false;
                }
                match self.state.compare_exchange(
                    STATE_OPEN,
                    STATE_HALF_OPEN_PROBE,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => {
                        tracing::info!("circuit breaker -> half-open probe");
                        true
                    }
                    Err(_) => false,
                }
            }
            BreakerState::HalfOpenProbe => false,
        }
    }

    /// Call after a successful body execution. Promotes HalfOpenProbe ->
    /// Closed and resets the rolling window.
    pub fn mark_success(&self) {
        self.metrics.mark_success();
        if self.state.load(Ordering::Acquire) == STATE_HALF_OPEN_PROBE
            && self
                .state
                .compare_exchange(
                    STATE_HALF_OPEN_PROBE,
                    STATE_CLOSED,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
        {
            self.metrics.reset();
            tracing::info!("circuit breaker -> closed");
        }
    }

    /// Call after a breaker-counted failure (Faulted or TimedOut; never for
    /// Canceled or admission rejections, which are not breaker failures).
    /// The caller is responsible for having already marked the specific
    /// event kind on `metrics()`.
    pub fn on_failure_observed(&self) {
        let current = self.state.load(Ordering::Acquire);
        match current {
            STATE_HALF_OPEN_PROBE => {
                if self
                    .state
                    .compare_exchange(
                        STATE_HALF_OPEN_PROBE,
                        STATE_OPEN,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok()
                {
                    self.opened_at_millis.store(self.now(), Ordering::Release);
                    tracing::warn!("circuit breaker: probe failed -> open");
                }
            }
            STATE_CLOSED => self.maybe_trip(),
            _ => {}
        }
    }

    fn maybe_trip(&self) {
        let config = self.config.load();
        let total = self.metrics.total();
        if total < config.minimum_operations as u64 {
            return;
        }
        if self.metrics.error_percent() < config.threshold_percent {
            return;
        }
        if self
            .state
            .compare_exchange(STATE_CLOSED, STATE_OPEN, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.opened_at_millis.store(self.now(), Ordering::Release);
            tracing::error!(
                total,
                error_percent = self.metrics.error_percent(),
                "circuit breaker -> open"
            );
        }
    }
}

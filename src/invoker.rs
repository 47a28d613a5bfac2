//! The command invoker: the orchestrator tying together timeouts,
//! cancellation, breaker/bulkhead admission, outcome classification,
//! diagnostics, and fallback execution. See spec.md §4.6 for the numbered
//! algorithm this module implements step by step.

use crate::cancellation::{CancelCause, Cancelable, CancellationToken};
use crate::circuit_breaker::BreakerState;
use crate::config::{keys, ConfigProvider};
use crate::descriptor::CommandDescriptor;
use crate::error::{BoxError, CommandResult, CommandStatus, CoreError, Diagnostics, TimeoutMillis};
use crate::registry::Registry;
use crate::telemetry::{emit_best_effort, PolicyEvent, TelemetrySink};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, BoxError>> + Send>>;

/// A command body: given the composed cancellation token, runs to either a
/// value or an application error.
pub type CommandBody<T> = Box<dyn FnOnce(CancellationToken) -> BoxFuture<T> + Send>;

/// A fallback body: no token, just an alternate path to a value.
pub type FallbackBody<T> = Box<dyn FnOnce() -> BoxFuture<T> + Send>;

/// Whether a non-success outcome is raised as an error or returned as data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnFailure {
    Throw,
    Return,
}

/// The caller's timeout argument, per spec.md §4.6: an explicit millisecond
/// count, a caller-owned token, or "use the command's configured default".
pub enum TimeoutArg {
    Millis(u64),
    Token(CancellationToken),
    Default,
}

pub struct CommandInvoker<S> {
    registry: Arc<Registry>,
    config: Arc<dyn ConfigProvider>,
    sink: S,
}

struct ResolvedTimeout {
    diagnostic: TimeoutMillis,
    millis: Option<u64>,
    caller_token: Option<CancellationToken>,
}

impl<S> CommandInvoker<S>
where
    S: TelemetrySink,
    S::Future: Send + 'static,
{
    pub fn new(registry: Arc<Registry>, config: Arc<dyn ConfigProvider>, sink: S) -> Self {
        Self { registry, config, sink }
    }

    fn resolve_timeout(&self, descriptor: &CommandDescriptor, arg: TimeoutArg) -> ResolvedTimeout {
        let ignore_timeouts = self.config.get_bool_or(keys::IGNORE_TIMEOUTS, false);
        if ignore_timeouts {
            return ResolvedTimeout { diagnostic: TimeoutMillis::Ignored, millis: None, caller_token: None };
        }
        match arg {
            TimeoutArg::Millis(ms) => {
                ResolvedTimeout { diagnostic: TimeoutMillis::Millis(ms), millis: Some(ms), caller_token: None }
            }
            TimeoutArg::Token(token) => {
                ResolvedTimeout { diagnostic: TimeoutMillis::Token, millis: None, caller_token: Some(token) }
            }
            TimeoutArg::Default => {
                let configured = self.config.get_int(&keys::command_timeout(descriptor.name()));
                let ms = configured
                    .map(|v| v.max(0) as u64)
                    .unwrap_or_else(|| descriptor.default_timeout().as_millis() as u64);
                ResolvedTimeout { diagnostic: TimeoutMillis::Millis(ms), millis: Some(ms), caller_token: None }
            }
        }
    }

    fn diagnostics(
        &self,
        descriptor: &CommandDescriptor,
        status: CommandStatus,
        timeout_millis: TimeoutMillis,
        elapsed: Duration,
    ) -> Diagnostics {
        Diagnostics {
            command: descriptor.name().to_string(),
            status,
            breaker_key: descriptor.breaker_key().clone(),
            bulkhead_key: descriptor.bulkhead_key().clone(),
            timeout_millis,
            elapsed_millis: elapsed.as_millis() as u64,
        }
    }

    async fn emit(&self, event: PolicyEvent) {
        emit_best_effort(self.sink.clone(), event).await;
    }

    /// The canonical asynchronous entry point. Returns `Err` only when
    /// `on_failure == Throw` and the outcome is not `RanToCompletion`;
    /// otherwise always `Ok`, with the outcome carried in the result's
    /// `status`/`exception` fields.
    pub async fn invoke_async<T: Send + 'static>(
        &self,
        descriptor: &CommandDescriptor,
        on_failure: OnFailure,
        timeout_arg: TimeoutArg,
        body: CommandBody<T>,
        fallback: Option<FallbackBody<T>>,
    ) -> Result<CommandResult<T>, CoreError> {
        // Step 1: single-shot guard. The sole failure that ignores `on_failure`.
        if !descriptor.try_mark_invoked() {
            let err = CoreError::CommandReused { command: descriptor.name().to_string() };
            return Err(err);
        }

        let start = Instant::now();
        let resources = self.registry.resources_for(descriptor.breaker_key());

        // Step 2: effective timeout.
        let resolved = self.resolve_timeout(descriptor, timeout_arg);

        // Step 3: cancellation composition, including the pre-expired fast path.
        let pre_expired = match (resolved.millis, &resolved.caller_token) {
            (Some(0), _) => Some(CommandStatus::TimedOut),
            (_, Some(token)) if token.is_canceled() => Some(CommandStatus::Canceled),
            _ => None,
        };

        let primary: Result<T, CoreError> = if let Some(status) = pre_expired {
            let diagnostics = self.diagnostics(descriptor, status, resolved.diagnostic.clone(), Duration::ZERO);
            if status == CommandStatus::TimedOut {
                resources.breaker.metrics().mark_timeout();
                resources.breaker.on_failure_observed();
                Err(CoreError::TimedOut { diagnostics })
            } else {
                Err(CoreError::Canceled { diagnostics })
            }
        } else {
            // Step 4: admission.
            let breakers_enabled = self.config.get_bool_or(keys::USE_CIRCUIT_BREAKERS, true);
            if breakers_enabled && !resources.breaker.is_allowing() {
                let diagnostics =
                    self.diagnostics(descriptor, CommandStatus::Rejected, resolved.diagnostic.clone(), start.elapsed());
                self.emit(PolicyEvent::breaker_is_allowing(descriptor.breaker_key().as_str(), false)).await;
                Err(CoreError::BreakerRejected { diagnostics })
            } else {
                // `is_allowing` may have just performed the Open -> HalfOpenProbe
                // CAS, granting this call the single outstanding probe. If
                // anything downstream of this point rejects or cuts the call
                // short without a mark_success/on_failure_observed pair, that
                // probe is never released and the breaker is stuck in
                // HalfOpenProbe forever (it has no time-based escape). Track
                // whether this call holds the probe so every such exit path
                // can release it.
                let holds_probe = breakers_enabled && resources.breaker.state() == BreakerState::HalfOpenProbe;
                match resources.bulkhead.load().try_acquire() {
                    Err(rejected) => {
                        if holds_probe {
                            resources.breaker.on_failure_observed();
                        }
                        let diagnostics = self.diagnostics(
                            descriptor,
                            CommandStatus::Rejected,
                            resolved.diagnostic.clone(),
                            start.elapsed(),
                        );
                        self.emit(PolicyEvent::pool_active_threads(
                            descriptor.bulkhead_key().as_str(),
                            rejected.in_flight,
                        ))
                        .await;
                        Err(CoreError::BulkheadRejected { diagnostics })
                    }
                    Ok(permit) => {
                        // Step 5: execution under the composed token. `composed`
                        // is handed to the body itself so cooperative bodies can
                        // observe either source firing, not just the timeout or
                        // caller token Cancelable races independently below.
                        let composed = CancellationToken::new();
                        let watcher = composed.clone();
                        let watcher_sleep_ms = resolved.millis;
                        let watcher_caller = resolved.caller_token.clone();
                        tokio::spawn(async move {
                            match (watcher_sleep_ms, watcher_caller) {
                                (Some(ms), Some(caller)) => {
                                    tokio::select! {
                                        _ = tokio::time::sleep(Duration::from_millis(ms)) => {}
                                        _ = caller.cancelled() => {}
                                    }
                                }
                                (Some(ms), None) => tokio::time::sleep(Duration::from_millis(ms)).await,
                                (None, Some(caller)) => caller.cancelled().await,
                                (None, None) => return,
                            }
                            watcher.cancel();
                        });

                        let sleep = resolved.millis.map(|ms| tokio::time::sleep(Duration::from_millis(ms)));
                        let racer_token = resolved.caller_token.clone();
                        let body_future = body(composed);
                        let outcome = Cancelable::new(body_future, sleep, racer_token).await;
                        drop(permit);

                        // Step 6: classification.
                        match outcome {
                            Ok(Ok(value)) => {
                                resources.breaker.mark_success();
                                Ok(value)
                            }
                            Ok(Err(app_err)) => {
                                resources.breaker.metrics().mark_failure();
                                resources.breaker.on_failure_observed();
                                let diagnostics = self.diagnostics(
                                    descriptor,
                                    CommandStatus::Faulted,
                                    resolved.diagnostic.clone(),
                                    start.elapsed(),
                                );
                                Err(CoreError::Faulted { diagnostics, source: app_err })
                            }
                            Err(CancelCause::Timeout) => {
                                resources.breaker.metrics().mark_timeout();
                                resources.breaker.on_failure_observed();
                                let diagnostics = self.diagnostics(
                                    descriptor,
                                    CommandStatus::TimedOut,
                                    resolved.diagnostic.clone(),
                                    start.elapsed(),
                                );
                                Err(CoreError::TimedOut { diagnostics })
                            }
                            Err(CancelCause::Caller) => {
                                // Caller cancellation is never counted as a
                                // metrics failure, but a held probe still
                                // must be released: `on_failure_observed`
                                // only performs the HalfOpenProbe -> Open
                                // state transition here (it does not touch
                                // `metrics()`), so this does not affect the
                                // error-rate accounting.
                                if holds_probe {
                                    resources.breaker.on_failure_observed();
                                }
                                let diagnostics = self.diagnostics(
                                    descriptor,
                                    CommandStatus::Canceled,
                                    resolved.diagnostic.clone(),
                                    start.elapsed(),
                                );
                                Err(CoreError::Canceled { diagnostics })
                            }
                        }
                    }
                }
            }
        };

        self.emit(PolicyEvent::command_execute(
            descriptor.name(),
            match &primary {
                Ok(_) => "RanToCompletion",
                Err(e) => status_label(e.status()),
            },
            start.elapsed().as_millis() as u64,
        ))
        .await;

        // Step 8: fallback. Skipped for RanToCompletion.
        let resolved_primary = match primary {
            Ok(value) => Ok(value),
            Err(original) => match fallback {
                None => Err(original),
                Some(fallback_body) => {
                    match resources.fallback_gate.try_acquire() {
                        Err(_rejected) => {
                            let diagnostics = self.diagnostics(
                                descriptor,
                                original.status(),
                                resolved.diagnostic.clone(),
                                start.elapsed(),
                            );
                            Err(CoreError::FallbackRejected { diagnostics, original: Box::new(original) })
                        }
                        Ok(permit) => {
                            let fallback_result = fallback_body().await;
                            drop(permit);
                            match fallback_result {
                                Ok(value) => Ok(value),
                                Err(fallback_err) => {
                                    let diagnostics = self.diagnostics(
                                        descriptor,
                                        original.status(),
                                        resolved.diagnostic.clone(),
                                        start.elapsed(),
                                    );
                                    Err(CoreError::FallbackFailed {
                                        diagnostics,
                                        source: fallback_err,
                                        original: Box::new(original),
                                    })
                                }
                            }
                        }
                    }
                }
            },
        };

        // Step 9: surface.
        match (on_failure, resolved_primary) {
            (_, Ok(value)) => Ok(CommandResult::success(value)),
            (OnFailure::Throw, Err(err)) => Err(err),
            (OnFailure::Return, Err(err)) => Ok(CommandResult::failure(err)),
        }
    }

    /// Blocking adapter over [`Self::invoke_async`] for synchronous callers,
    /// per spec.md §9's "sync-over-async" note.
    pub fn invoke<T: Send + 'static>(
        &self,
        descriptor: &CommandDescriptor,
        on_failure: OnFailure,
        timeout_arg: TimeoutArg,
        body: CommandBody<T>,
        fallback: Option<FallbackBody<T>>,
    ) -> Result<CommandResult<T>, CoreError> {
        Handle::current().block_on(self.invoke_async(descriptor, on_failure, timeout_arg, body, fallback))
    }

    /// Spawns a background task publishing `breaker_total`/
    /// `breaker_error_percent` gauges for every known breaker key, once per
    /// `mjolnir.gaugeIntervalMillis` (default 60s). The interval is read
    /// fresh every iteration, so changing the config value takes effect on
    /// the next tick without restarting the task. Dropping the returned
    /// handle does not stop the task; call `.abort()` on it to stop
    /// publishing.
    pub fn spawn_gauge_publisher(&self) -> JoinHandle<()> {
        let registry = self.registry.clone();
        let config = self.config.clone();
        let sink = self.sink.clone();
        tokio::spawn(async move {
            loop {
                let interval_ms = config.get_int_or(keys::GAUGE_INTERVAL_MILLIS, 60_000).max(1) as u64;
                tokio::time::sleep(Duration::from_millis(interval_ms)).await;

                for (key, resources) in registry.snapshot() {
                    let metrics = resources.breaker.metrics();
                    emit_best_effort(sink.clone(), PolicyEvent::breaker_total(key.as_str(), metrics.total())).await;
                    emit_best_effort(
                        sink.clone(),
                        PolicyEvent::breaker_error_percent(key.as_str(), metrics.error_percent()),
                    )
                    .await;
                }
            }
        })
    }
}

fn status_label(status: CommandStatus) -> &'static str {
    match status {
        CommandStatus::RanToCompletion => "RanToCompletion",
        CommandStatus::Faulted => "Faulted",
        CommandStatus::Canceled => "Canceled",
        CommandStatus::TimedOut => "TimedOut",
        CommandStatus::Rejected => "Rejected",
    }
}

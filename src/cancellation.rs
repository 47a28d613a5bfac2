//! A minimal cancellation token and a future wrapper that composes a
//! caller-supplied token with a per-invocation timeout.
//!
//! No cancellation-token crate is pulled in; this follows the same
//! atomics-plus-`Notify` idiom used throughout `circuit_breaker.rs`, combined
//! with `pin-project` for the composition future. Racing against a timeout
//! alone never allocates; when a caller token is present, [`Cancelable`]
//! boxes the token's `cancelled()` wait exactly once (on first need) so that
//! wait survives across polls instead of being recreated — and dropped —
//! every time `poll` is called.

use pin_project::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::Notify;
use tokio::time::Sleep;

struct Inner {
    canceled: AtomicBool,
    notify: Notify,
}

/// A cheaply cloneable, edge-triggered cancellation signal.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self { inner: Arc::new(Inner { canceled: AtomicBool::new(false), notify: Notify::new() }) }
    }

    /// A token that is already canceled, for the "pre-expired" fast path.
    pub fn already_canceled() -> Self {
        let token = Self::new();
        token.cancel();
        token
    }

    pub fn is_canceled(&self) -> bool {
        self.inner.canceled.load(Ordering::Acquire)
    }

    /// Cancels the token. A no-op on a token already canceled: cancellation
    /// is edge-triggered, fired exactly once.
    pub fn cancel(&self) {
        if self
            .inner
            .canceled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.inner.notify.notify_waiters();
        }
    }

    /// Resolves once the token is canceled. Check-then-wait, following the
    /// pattern `tokio::sync::Notify` documents to avoid the lost-wakeup race
    /// between observing "not yet canceled" and registering as a waiter.
    pub async fn cancelled(&self) {
        if self.is_canceled() {
            return;
        }
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        if self.is_canceled() {
            return;
        }
        notified.await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Which side of the composition fired, for classifying a cut-short
/// invocation as `TimedOut` vs `Canceled` per spec.md §4.6 step 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    Timeout,
    Caller,
}

/// Races a body future against an optional timeout and an optional caller
/// token, whichever fires first. `None` for either side means that source
/// never fires (used when the global "ignore timeouts" flag is set, or when
/// the caller supplied no token).
#[pin_project]
pub struct Cancelable<F> {
    #[pin]
    inner: F,
    #[pin]
    sleep: Option<Sleep>,
    token: Option<CancellationToken>,
    /// The token's `cancelled()` wait, boxed so it can be registered once and
    /// then re-polled across multiple calls to `Cancelable::poll` instead of
    /// being rebuilt (and its waiter registration dropped) every time.
    waiting: Option<Pin<Box<dyn Future<Output = ()> + Send>>>,
}

impl<F> Cancelable<F> {
    pub fn new(inner: F, sleep: Option<Sleep>, token: Option<CancellationToken>) -> Self {
        Self { inner, sleep, token, waiting: None }
    }
}

impl<F: Future> Future for Cancelable<F> {
    type Output = Result<F::Output, CancelCause>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();

        if let Some(token) = this.token.as_ref() {
            if token.is_canceled() {
                return Poll::Ready(Err(CancelCause::Caller));
            }
        }

        if let Some(sleep) = this.sleep.as_mut().as_pin_mut() {
            if sleep.poll(cx).is_ready() {
                return Poll::Ready(Err(CancelCause::Timeout));
            }
        }

        if let Poll::Ready(output) = this.inner.poll(cx) {
            return Poll::Ready(Ok(output));
        }

        // Poll the same boxed `cancelled()` future every time so this task
        // stays registered as a waiter between polls; a fresh `notified()`
        // each poll would be dropped (and thus unregistered) before the next
        // `cancel()` could wake it.
        if let Some(token) = this.token.as_ref() {
            let waiting = this.waiting.get_or_insert_with(|| {
                let token = token.clone();
                Box::pin(async move { token.cancelled().await })
            });
            if waiting.as_mut().poll(cx).is_ready() {
                return Poll::Ready(Err(CancelCause::Caller));
            }
        }

        Poll::Pending
    }
}

//! Fixed-capacity admission control isolating a dependency group from
//! over-subscription. Two variants, per spec.md §4.4:
//!
//! - [`SemaphoreBulkhead`] (Variant A): non-blocking `try_acquire` over a
//!   `tokio::sync::Semaphore`. Default for synchronous/caller-thread bodies.
//! - [`QueuedBulkhead`] (Variant B): a fixed worker pool draining a bounded
//!   channel; a full channel rejects immediately. Used when the body runs on
//!   an owned executor rather than the caller's task.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};

pub const DEFAULT_MAX_CONCURRENT: usize = 10;
pub const DEFAULT_QUEUE_LENGTH: usize = 10;

/// Held for the lifetime of one admitted call; dropping it releases the slot.
pub enum Permit {
    Semaphore(OwnedSemaphorePermit),
    Queued(QueuedPermit),
}

/// A permit for the queued variant decrements the in-flight counter on drop.
pub struct QueuedPermit {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for QueuedPermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Non-blocking semaphore bulkhead (Variant A).
#[derive(Clone)]
pub struct SemaphoreBulkhead {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl SemaphoreBulkhead {
    pub fn new(max_concurrent: usize) -> Self {
        Self { semaphore: Arc::new(Semaphore::new(max_concurrent)), max_concurrent }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn in_flight(&self) -> usize {
        self.max_concurrent.saturating_sub(self.semaphore.available_permits())
    }

    /// Acquire a permit or fail immediately; never blocks.
    pub fn try_acquire(&self) -> Result<Permit, BulkheadRejected> {
        self.semaphore
            .clone()
            .try_acquire_owned()
            .map(Permit::Semaphore)
            .map_err(|_| BulkheadRejected { in_flight: self.in_flight(), max: self.max_concurrent })
    }
}

type BoxedJob = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Queued bulkhead (Variant B): a fixed worker pool reading from a bounded
/// channel. A full channel is an immediate rejection, never a block.
///
/// Two admission surfaces are exposed: [`Self::try_acquire`], for callers
/// (the command invoker among them) that await the body inline and just need
/// a bounded-capacity permit, and [`Self::try_submit`], for callers that hand
/// a job off to run on the bulkhead's own worker pool. Both share the same
/// capacity accounting (`worker_count + queue_length`), but are otherwise
/// independent admission paths.
#[derive(Clone)]
pub struct QueuedBulkhead {
    sender: mpsc::Sender<BoxedJob>,
    in_flight: Arc<AtomicUsize>,
    admission: SemaphoreBulkhead,
    max_concurrent: usize,
}

impl QueuedBulkhead {
    /// Spawns `worker_count` tasks sharing a channel of depth `queue_length`.
    /// Each worker pulls one job at a time, so a full channel genuinely means
    /// `worker_count` jobs running plus `queue_length` waiting, not merely a
    /// dispatcher backlog.
    pub fn new(worker_count: usize, queue_length: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<BoxedJob>(queue_length.max(1));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        for _ in 0..worker_count.max(1) {
            let receiver = receiver.clone();
            tokio::spawn(async move {
                loop {
                    let job = {
                        let mut guard = receiver.lock().await;
                        guard.recv().await
                    };
                    match job {
                        Some(job) => job.await,
                        None => break,
                    }
                }
            });
        }

        let admission = SemaphoreBulkhead::new(worker_count.max(1) + queue_length.max(1));
        Self { sender, in_flight, admission, max_concurrent: worker_count }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Total admitted slots: `worker_count + queue_length`.
    pub fn max_concurrent(&self) -> usize {
        self.admission.max_concurrent()
    }

    /// Reserves one of `worker_count + queue_length` slots for a body the
    /// caller will await inline, mirroring [`SemaphoreBulkhead::try_acquire`].
    pub fn try_acquire(&self) -> Result<Permit, BulkheadRejected> {
        self.admission.try_acquire()
    }

    /// Hand the job off to the queue, or fail immediately if the queue is
    /// full. Unlike [`SemaphoreBulkhead`], admission does not by itself bound
    /// concurrency (the dispatcher does that); it bounds how much queued work
    /// may pile up waiting for a worker.
    pub fn try_submit<F>(&self, job: F) -> Result<(), BulkheadRejected>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let in_flight = self.in_flight.clone();
        let wrapped: BoxedJob = Box::pin(async move {
            job.await;
            in_flight.fetch_sub(1, Ordering::AcqRel);
        });
        self.sender.try_send(wrapped).map_err(|_| {
            self.in_flight.fetch_sub(1, Ordering::AcqRel);
            BulkheadRejected { in_flight: self.in_flight(), max: self.max_concurrent }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkheadRejected {
    pub in_flight: usize,
    pub max: usize,
}

/// Either admission-control variant, selected per registry entry.
#[derive(Clone)]
pub enum Bulkhead {
    Semaphore(SemaphoreBulkhead),
    Queued(QueuedBulkhead),
}

impl Bulkhead {
    pub fn semaphore(max_concurrent: usize) -> Self {
        Self::Semaphore(SemaphoreBulkhead::new(max_concurrent))
    }

    pub fn queued(worker_count: usize, queue_length: usize) -> Self {
        Self::Queued(QueuedBulkhead::new(worker_count, queue_length))
    }

    pub fn in_flight(&self) -> usize {
        match self {
            Self::Semaphore(b) => b.in_flight(),
            Self::Queued(b) => b.in_flight(),
        }
    }

    /// Total admitted slots, regardless of variant.
    pub fn max_concurrent(&self) -> usize {
        match self {
            Self::Semaphore(b) => b.max_concurrent(),
            Self::Queued(b) => b.max_concurrent(),
        }
    }

    /// Reserves a slot for a body the caller awaits inline, regardless of
    /// variant. This is the admission path the command invoker uses.
    pub fn try_acquire(&self) -> Result<Permit, BulkheadRejected> {
        match self {
            Self::Semaphore(b) => b.try_acquire(),
            Self::Queued(b) => b.try_acquire(),
        }
    }
}

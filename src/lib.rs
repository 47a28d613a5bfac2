#![forbid(unsafe_code)]

//! # mjolnir-core
//!
//! Invocation core for a client-side latency and fault isolation library:
//! a command invoker that composes circuit breakers, bulkheads, timeouts,
//! cancellation, and a fallback path around an arbitrary async body.
//!
//! ## Components
//!
//! - [`circuit_breaker`] — lock-free three-state breaker driven by a
//!   rolling error-rate window.
//! - [`bulkhead`] — non-blocking admission control, semaphore- or
//!   worker-pool-backed.
//! - [`fallback_gate`] — a small semaphore bounding fallback concurrency.
//! - [`registry`] — lazy per-group lookup of breaker/bulkhead/fallback
//!   resources.
//! - [`cancellation`] — a minimal cancellation token plus a future wrapper
//!   composing a body against a timeout and a caller token, allocating at
//!   most once per invocation (only when a caller token is present).
//! - [`descriptor`] — immutable per-invocation metadata and the single-use
//!   guard.
//! - [`invoker`] — [`invoker::CommandInvoker`], the orchestrator tying the
//!   above together.
//! - [`interceptor`] — a declarative, trait-based alternative to building
//!   `CommandBody` closures by hand.
//! - [`telemetry`] — `PolicyEvent`s and the sinks that consume them.
//! - [`config`] — the `ConfigProvider` key-value surface read at every
//!   admission and timeout-resolution step.
//! - [`error`] — the `CoreError` taxonomy, `Diagnostics`, and `CommandResult`.
//!
//! ## Quick Start
//!
//! ```
//! use mjolnir_core::clock::MonotonicClock;
//! use mjolnir_core::config::StaticConfig;
//! use mjolnir_core::descriptor::CommandDescriptor;
//! use mjolnir_core::group_key::GroupKey;
//! use mjolnir_core::invoker::{CommandInvoker, OnFailure, TimeoutArg};
//! use mjolnir_core::registry::Registry;
//! use mjolnir_core::telemetry::NullSink;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(Registry::new(Arc::new(MonotonicClock::default()), Arc::new(StaticConfig::new())));
//! let invoker = CommandInvoker::new(registry, Arc::new(StaticConfig::new()), NullSink);
//! let descriptor = CommandDescriptor::with_name("orders.FetchOrder", GroupKey::from("orders"));
//!
//! let result = invoker
//!     .invoke_async(
//!         &descriptor,
//!         OnFailure::Return,
//!         TimeoutArg::Millis(500),
//!         Box::new(|_token| Box::pin(async { Ok(42u32) })),
//!         None,
//!     )
//!     .await?;
//! assert_eq!(result.value, Some(42));
//! # Ok(())
//! # }
//! ```

pub mod bulkhead;
pub mod cancellation;
pub mod circuit_breaker;
pub mod clock;
pub mod command_metrics;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod fallback_gate;
pub mod group_key;
pub mod interceptor;
pub mod invoker;
pub mod registry;
pub mod rolling_counter;
pub mod telemetry;

pub mod prelude;

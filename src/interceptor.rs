//! Contract-only surface standing in for the source ecosystem's
//! annotation-driven command interceptor, per spec.md §4.7/§9: Rust has no
//! attribute-macro proxy layer here, so the "decorated interface method"
//! becomes a trait a command type implements directly, and the
//! `(group, bulkhead, defaultTimeoutMs)` triple that a proxy would normally
//! read off an annotation becomes a trait method a command type overrides.
//!
//! No codegen, no macro, no dynamic proxy: [`CommandInvoker::invoke_async`]
//! never needs to know about this trait at all, since it already accepts a
//! plain [`CommandBody`](crate::invoker::CommandBody) closure. This module
//! exists purely so callers who want a declarative, type-per-command style
//! (closer to the source ecosystem's annotated-interface idiom) have one
//! without inventing their own each time.
//!
//! ```
//! use mjolnir_core::cancellation::CancellationToken;
//! use mjolnir_core::group_key::GroupKey;
//! use mjolnir_core::interceptor::{Command, CommandFactory};
//! use mjolnir_core::invoker::BoxFuture;
//!
//! struct FetchOrder { order_id: u64 }
//!
//! impl Command for FetchOrder {
//!     type Output = String;
//!
//!     fn run(self, _token: CancellationToken) -> BoxFuture<Self::Output> {
//!         Box::pin(async move { Ok(format!("order-{}", self.order_id)) })
//!     }
//!
//!     fn type_name() -> &'static str {
//!         "FetchOrder"
//!     }
//! }
//!
//! impl CommandFactory for FetchOrder {
//!     fn group() -> GroupKey {
//!         GroupKey::from("orders.db")
//!     }
//! }
//!
//! let descriptor = FetchOrder::descriptor();
//! assert_eq!(descriptor.name(), "orders-db.FetchOrder");
//! ```

use crate::descriptor::CommandDescriptor;
use crate::group_key::GroupKey;
use crate::invoker::BoxFuture;
use crate::cancellation::CancellationToken;
use std::time::Duration;

/// One command's body: the async boundary a proxy would otherwise wrap,
/// taking the invoker's composed cancellation token and producing a value
/// or an application error.
pub trait Command: Send + 'static {
    type Output: Send + 'static;

    fn run(self, token: CancellationToken) -> BoxFuture<Self::Output>;

    /// Stands in for runtime reflection of the command's type name (see
    /// [`CommandDescriptor::derive`]); implementations typically return a
    /// string literal matching the type's own name.
    fn type_name() -> &'static str;
}

/// Maps a command type to the `(group, bulkhead, defaultTimeoutMs)` triple
/// spec.md §4.7 describes an annotation or proxy config supplying. Override
/// [`Self::bulkhead_key`] only when the command shares a breaker group but
/// needs isolation in a different bulkhead.
pub trait CommandFactory: Command {
    fn group() -> GroupKey;

    fn bulkhead_key() -> GroupKey {
        Self::group()
    }

    fn default_timeout() -> Duration {
        Duration::from_millis(1000)
    }

    /// Builds the descriptor this command type would be invoked with. Name
    /// derivation follows [`CommandDescriptor::derive`] exactly, so a type
    /// implementing this trait never needs to format its own name.
    fn descriptor() -> CommandDescriptor {
        let group = Self::group();
        CommandDescriptor::with_keys(
            format!("{}.{}", group.as_str().replace('.', "-"), Self::type_name()),
            group.clone(),
            group,
            Self::bulkhead_key(),
            Self::default_timeout(),
        )
    }
}

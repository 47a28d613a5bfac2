//! Hand-written adapter from the declarative [`Command`]/[`CommandFactory`]
//! contract to [`CommandInvoker::invoke_async`]. Nothing here is generated;
//! it is the shape a caller writes once per command type wanting the
//! declarative style instead of building a `CommandBody` closure directly.

use mjolnir_core::cancellation::CancellationToken;
use mjolnir_core::clock::MonotonicClock;
use mjolnir_core::config::StaticConfig;
use mjolnir_core::error::BoxError;
use mjolnir_core::group_key::GroupKey;
use mjolnir_core::interceptor::{Command, CommandFactory};
use mjolnir_core::invoker::{BoxFuture, CommandInvoker, OnFailure, TimeoutArg};
use mjolnir_core::registry::Registry;
use mjolnir_core::telemetry::LogSink;
use std::sync::Arc;
use std::time::Duration;

struct FetchOrder {
    order_id: u64,
}

impl Command for FetchOrder {
    type Output = String;

    fn run(self, _token: CancellationToken) -> BoxFuture<Self::Output> {
        Box::pin(async move {
            if self.order_id == 0 {
                let err: BoxError = "order 0 does not exist".into();
                return Err(err);
            }
            Ok(format!("order-{}", self.order_id))
        })
    }

    fn type_name() -> &'static str {
        "FetchOrder"
    }
}

impl CommandFactory for FetchOrder {
    fn group() -> GroupKey {
        GroupKey::from("orders.db")
    }

    fn default_timeout() -> Duration {
        Duration::from_millis(250)
    }
}

/// Runs one `FetchOrder` through the invoker, bridging its `Command::run`
/// into the closure shape `invoke_async` expects.
async fn fetch_order(
    invoker: &CommandInvoker<LogSink>,
    order_id: u64,
) -> Result<String, mjolnir_core::error::CoreError> {
    let descriptor = FetchOrder::descriptor();
    let command = FetchOrder { order_id };
    let result = invoker
        .invoke_async(
            &descriptor,
            OnFailure::Return,
            TimeoutArg::Default,
            Box::new(move |token| command.run(token)),
            None,
        )
        .await?;
    Ok(result.value.unwrap_or_default())
}

#[tokio::main]
async fn main() {
    let registry = Arc::new(Registry::new(Arc::new(MonotonicClock::default()), Arc::new(StaticConfig::new())));
    let invoker = CommandInvoker::new(registry, Arc::new(StaticConfig::new()), LogSink);

    match fetch_order(&invoker, 42).await {
        Ok(order) => println!("fetched {order}"),
        Err(err) => eprintln!("fetch failed: {err}"),
    }
}

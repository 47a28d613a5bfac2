//! Integration tests exercising `CommandInvoker` through its public API,
//! covering admission under real concurrency (not just unit-level
//! short-circuits) per spec.md §8.

use mjolnir_core::cancellation::CancellationToken;
use mjolnir_core::clock::MonotonicClock;
use mjolnir_core::config::{keys, StaticConfig};
use mjolnir_core::descriptor::CommandDescriptor;
use mjolnir_core::error::{BoxError, CommandStatus, CoreError};
use mjolnir_core::group_key::GroupKey;
use mjolnir_core::invoker::{CommandInvoker, OnFailure, TimeoutArg};
use mjolnir_core::registry::{BulkheadKind, Registry};
use mjolnir_core::telemetry::MemorySink;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn invoker_with(config: Arc<StaticConfig>) -> (CommandInvoker<MemorySink>, MemorySink) {
    let sink = MemorySink::new();
    let registry = Arc::new(Registry::new(Arc::new(MonotonicClock::default()), config.clone()));
    (CommandInvoker::new(registry, config, sink.clone()), sink)
}

#[tokio::test]
async fn bulkhead_rejects_second_concurrent_call_when_capacity_is_one() {
    let config = Arc::new(StaticConfig::new());
    config.set_int(keys::pool_thread_count("concurrency"), 1);
    let (invoker, _sink) = invoker_with(config);

    let d1 = CommandDescriptor::with_name("test.Slow1", GroupKey::from("concurrency"));
    let d2 = CommandDescriptor::with_name("test.Slow2", GroupKey::from("concurrency"));

    let slow = invoker.invoke_async(
        &d1,
        OnFailure::Return,
        TimeoutArg::Millis(1000),
        Box::new(|_token| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(1u32)
            })
        }),
        None,
    );
    let fast = invoker.invoke_async(
        &d2,
        OnFailure::Return,
        TimeoutArg::Millis(1000),
        Box::new(|_token| Box::pin(async { Ok(2u32) })),
        None,
    );

    let (slow_result, fast_result) = tokio::join!(slow, fast);
    assert_eq!(slow_result.unwrap().status, CommandStatus::RanToCompletion);
    assert_eq!(fast_result.unwrap().status, CommandStatus::Rejected);
}

#[tokio::test]
async fn force_tripped_breaker_rejects_without_running_the_body() {
    let config = Arc::new(StaticConfig::new());
    config.set_bool(keys::breaker_force_tripped("forced"), true);
    let (invoker, _sink) = invoker_with(config);
    let descriptor = CommandDescriptor::with_name("test.Forced", GroupKey::from("forced"));

    let body_ran = Arc::new(AtomicBool::new(false));
    let body_ran_clone = body_ran.clone();
    let result = invoker
        .invoke_async(
            &descriptor,
            OnFailure::Return,
            TimeoutArg::Millis(1000),
            Box::new(move |_token| {
                body_ran_clone.store(true, Ordering::SeqCst);
                Box::pin(async { Ok(()) })
            }),
            None,
        )
        .await
        .unwrap();

    assert_eq!(result.status, CommandStatus::Rejected);
    assert!(!body_ran.load(Ordering::SeqCst));
}

fn failing_body() -> mjolnir_core::invoker::CommandBody<u32> {
    Box::new(|_token| {
        Box::pin(async {
            let err: BoxError = "boom".into();
            Err(err)
        })
    })
}

#[tokio::test]
async fn fallback_rejected_when_gate_is_saturated() {
    let config = Arc::new(StaticConfig::new());
    config.set_int(keys::fallback_max_concurrent("fb"), 1);
    let (invoker, _sink) = invoker_with(config);

    let d1 = CommandDescriptor::with_name("test.Fail1", GroupKey::from("fb"));
    let d2 = CommandDescriptor::with_name("test.Fail2", GroupKey::from("fb"));

    let first = invoker.invoke_async(
        &d1,
        OnFailure::Return,
        TimeoutArg::Millis(1000),
        failing_body(),
        Some(Box::new(|| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(1u32)
            })
        })),
    );
    let second = invoker.invoke_async(
        &d2,
        OnFailure::Return,
        TimeoutArg::Millis(1000),
        failing_body(),
        Some(Box::new(|| Box::pin(async { Ok(2u32) }))),
    );

    let (first_result, second_result) = tokio::join!(first, second);
    let first_result = first_result.unwrap();
    let second_result = second_result.unwrap();

    assert_eq!(first_result.value, Some(1));
    assert!(matches!(second_result.exception, Some(CoreError::FallbackRejected { .. })));
}

#[tokio::test]
async fn caller_cancellation_mid_flight_is_classified_as_canceled() {
    let config = Arc::new(StaticConfig::new());
    let (invoker, _sink) = invoker_with(config);
    let descriptor = CommandDescriptor::with_name("test.Cancelable", GroupKey::from("cancel-group"));

    let token = CancellationToken::new();
    let token_clone = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        token_clone.cancel();
    });

    let result = invoker
        .invoke_async(
            &descriptor,
            OnFailure::Return,
            TimeoutArg::Token(token),
            Box::new(|_token| {
                Box::pin(async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(())
                })
            }),
            None,
        )
        .await
        .unwrap();

    assert_eq!(result.status, CommandStatus::Canceled);
}

#[tokio::test]
async fn bulkhead_rejection_of_a_granted_probe_releases_it_back_to_open() {
    use mjolnir_core::circuit_breaker::BreakerState;

    let config = Arc::new(StaticConfig::new());
    let key = GroupKey::from("probe-group");
    config.set_int(keys::pool_thread_count("probe-group"), 1);
    config.set_int(keys::breaker_tripped_duration_millis("probe-group"), 20);

    let registry = Arc::new(Registry::with_bulkhead_kind(
        Arc::new(MonotonicClock::default()),
        config.clone(),
        BulkheadKind::Semaphore,
    ));
    let sink = MemorySink::new();
    let invoker = CommandInvoker::new(registry.clone(), config, sink);

    for i in 0..10 {
        let descriptor = CommandDescriptor::with_name(format!("test.Probe{i}"), key.clone());
        let result = invoker.invoke_async(&descriptor, OnFailure::Return, TimeoutArg::Millis(1000), failing_body(), None).await.unwrap();
        assert_eq!(result.status, CommandStatus::Faulted);
    }

    let resources = registry.resources_for(&key);
    assert_eq!(resources.breaker.state(), BreakerState::Open);

    // let the cooldown elapse so the next admission attempt wins the probe
    tokio::time::sleep(Duration::from_millis(30)).await;

    // saturate the bulkhead (capacity 1) before the probe reaches it
    let held_permit = resources.bulkhead.load().try_acquire().unwrap();

    let descriptor = CommandDescriptor::with_name("test.ProbeRejected", key.clone());
    let rejected = invoker
        .invoke_async(&descriptor, OnFailure::Return, TimeoutArg::Millis(1000), failing_body(), None)
        .await
        .unwrap();
    assert_eq!(rejected.status, CommandStatus::Rejected);

    // the probe must have been released back to Open, not stuck in HalfOpenProbe forever
    assert_eq!(resources.breaker.state(), BreakerState::Open);

    drop(held_permit);
    tokio::time::sleep(Duration::from_millis(30)).await;

    let descriptor = CommandDescriptor::with_name("test.ProbeRetried", key);
    let retried = invoker
        .invoke_async(&descriptor, OnFailure::Return, TimeoutArg::Millis(1000), failing_body(), None)
        .await
        .unwrap();
    // the breaker admitted another probe attempt rather than rejecting forever
    assert_ne!(retried.status, CommandStatus::Rejected);
}

#[tokio::test]
async fn reused_descriptor_fails_even_with_on_failure_throw() {
    let config = Arc::new(StaticConfig::new());
    let (invoker, _sink) = invoker_with(config);
    let descriptor = CommandDescriptor::with_name("test.NoOp", GroupKey::from("reuse"));

    let _ = invoker
        .invoke_async(
            &descriptor,
            OnFailure::Throw,
            TimeoutArg::Millis(1000),
            Box::new(|_token| Box::pin(async { Ok(1u32) })),
            None,
        )
        .await;

    let second = invoker
        .invoke_async(
            &descriptor,
            OnFailure::Throw,
            TimeoutArg::Millis(1000),
            Box::new(|_token| Box::pin(async { Ok(2u32) })),
            None,
        )
        .await;

    assert!(matches!(second, Err(CoreError::CommandReused { .. })));
}

//! Mutation executor gate ordering and failure handling

mod support;

use std::time::Duration;

use serde_json::json;
use storesync_common::{Clock, RateLimiter};
use storesync_core::{IdempotencyGuard, MutationSettings, TaskOutcome};
use storesync_domain::{
    Driver, EventLevel, EventType, FailureContext, MutationTask, PriceUpdate, SkipReason,
    StockUpdate, StoreSyncError,
};
use support::Harness;

fn price_task(price: i64) -> MutationTask {
    MutationTask::UpdatePrice(PriceUpdate {
        variant_id: "sv1".into(),
        price,
        discount_price: None,
        has_raw_price: None,
        run_id: "run-1".into(),
        source_variant_id: Some("v1".into()),
    })
}

fn stock_task(stock: i64) -> MutationTask {
    MutationTask::UpdateStock(StockUpdate {
        variant_id: "sv1".into(),
        stock,
        is_relative: false,
        run_id: "run-1".into(),
        source_variant_id: Some("v1".into()),
    })
}

#[tokio::test]
async fn successful_price_update_records_event_and_carries_idempotency_key() {
    let harness = Harness::new();
    let executor = harness.executor(MutationSettings::default());
    let task = price_task(1000);

    let outcome = executor.execute(&task).await.unwrap();
    assert_eq!(outcome, TaskOutcome::Completed);

    let calls = harness.downstream.calls_to("update_price");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].body, json!({ "price": 1000 }));
    assert_eq!(calls[0].ctx.idempotency_key.as_deref(), Some(IdempotencyGuard::key_for(&task).as_str()));
    assert_eq!(calls[0].ctx.run_id.as_deref(), Some("run-1"));

    let updated = harness.events.of_type(EventType::VariantPriceUpdated);
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].level, EventLevel::Info);
    assert_eq!(updated[0].ref_id.as_deref(), Some("sv1"));
    assert_eq!(updated[0].payload["source_variant_id"], "v1");
}

#[tokio::test]
async fn redelivered_task_is_skipped_as_idempotent_hit() {
    let harness = Harness::new();
    let executor = harness.executor(MutationSettings::default());
    let task = price_task(1000);

    assert_eq!(executor.execute(&task).await.unwrap(), TaskOutcome::Completed);
    let second = executor.execute(&task).await.unwrap();

    assert_eq!(second, TaskOutcome::Skipped(SkipReason::IdempotentHit));
    assert_eq!(harness.downstream.calls().len(), 1);

    let skipped = harness.events.skipped("idempotent-hit");
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].level, EventLevel::Info);

    assert_eq!(harness.audit.successes_for(&IdempotencyGuard::key_for(&task)), 1);
}

#[tokio::test]
async fn different_price_is_not_an_idempotent_hit() {
    let harness = Harness::new();
    let executor = harness.executor(MutationSettings::default());

    executor.execute(&price_task(1000)).await.unwrap();
    let outcome = executor.execute(&price_task(1200)).await.unwrap();

    assert_eq!(outcome, TaskOutcome::Completed);
    assert_eq!(harness.downstream.calls_to("update_price").len(), 2);
}

#[tokio::test]
async fn disabled_downstream_skips_without_any_call() {
    let harness = Harness::new();
    let executor =
        harness.executor(MutationSettings { enabled: false, ..MutationSettings::default() });

    let outcome = executor.execute(&stock_task(4)).await.unwrap();

    assert_eq!(outcome, TaskOutcome::Skipped(SkipReason::DownstreamDisabled));
    assert!(harness.downstream.calls().is_empty());
    let skipped = harness.events.skipped("downstream-disabled");
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].level, EventLevel::Warning);
}

#[tokio::test]
async fn open_circuit_defers_the_task() {
    let harness = Harness::new();
    let breaker = harness.breaker();
    for _ in 0..breaker.config().failure_threshold {
        breaker.record_failure("downstream").await.unwrap();
    }
    let executor = harness.executor(MutationSettings::default());

    let outcome = executor.execute(&price_task(1000)).await.unwrap();

    assert_eq!(outcome, TaskOutcome::Deferred(Duration::from_secs(30)));
    assert!(harness.downstream.calls().is_empty());
    assert_eq!(harness.events.skipped("circuit-open").len(), 1);
}

#[tokio::test]
async fn exhausted_minute_budget_defers_and_records_rate_limited() {
    let harness = Harness::new();
    let executor = harness.executor(MutationSettings {
        rate_limit_per_minute: 1,
        ..MutationSettings::default()
    });

    assert_eq!(executor.execute(&price_task(1000)).await.unwrap(), TaskOutcome::Completed);
    let outcome = executor.execute(&stock_task(3)).await.unwrap();

    assert_eq!(outcome, TaskOutcome::Deferred(Duration::from_secs(10)));
    assert_eq!(harness.events.of_type(EventType::RateLimited).len(), 1);
    assert!(harness.downstream.calls_to("update_stock").is_empty());

    // The next calendar minute has a fresh bucket.
    harness.clock.advance_secs(60);
    assert_eq!(executor.execute(&stock_task(3)).await.unwrap(), TaskOutcome::Completed);
}

#[tokio::test]
async fn idempotent_hits_do_not_consume_rate_budget() {
    let harness = Harness::new();
    let executor = harness.executor(MutationSettings::default());
    let limiter = RateLimiter::with_clock(harness.kv_store(), harness.clock.clone());
    let bucket = limiter.minute_bucket("downstream");

    executor.execute(&price_task(1)).await.unwrap();
    executor.execute(&price_task(1)).await.unwrap();

    assert_eq!(limiter.remaining(&bucket, 240).await.unwrap(), 239);
}

#[tokio::test]
async fn validation_rejection_persists_failure_and_records_validation_failed() {
    let harness = Harness::new();
    harness.downstream.respond_with(Err(StoreSyncError::remote(
        422,
        "accounting/update-price/sv1",
        Some(r#"{"detail":"price below floor"}"#.into()),
    )));
    let executor = harness.executor(MutationSettings::default());
    let task = price_task(1000);

    let outcome = executor.execute(&task).await.unwrap();
    assert_eq!(outcome, TaskOutcome::Rejected { status: 422 });
    assert!(!outcome.is_retryable());

    let failure = harness
        .failure_store()
        .find(FailureContext::DownstreamUpdatePrice, Some("sv1"))
        .await
        .unwrap()
        .expect("failure row");
    assert_eq!(failure.attempts, 1);
    assert_eq!(failure.payload["price"], 1000);
    assert_eq!(failure.payload["run_id"], "run-1");
    assert_eq!(failure.payload["status"], 422);
    assert_eq!(failure.payload["response"]["detail"], "price below floor");
    assert!(MutationTask::from_replay(failure.context, &failure.payload).is_some());

    let validation = harness.events.of_type(EventType::ValidationFailed);
    assert_eq!(validation.len(), 1);
    assert_eq!(validation[0].level, EventLevel::Error);
    assert_eq!(validation[0].payload["status"], 422);

    let update_events = harness.events.of_type(EventType::VariantPriceUpdated);
    assert_eq!(update_events[0].level, EventLevel::Error);
    assert_eq!(update_events[0].payload["status"], 422);
}

#[tokio::test]
async fn repeated_rejection_upserts_the_same_failure_row() {
    let harness = Harness::new();
    for _ in 0..2 {
        harness
            .downstream
            .respond_with(Err(StoreSyncError::remote(422, "accounting/update-stock/sv1", None)));
    }
    let executor = harness.executor(MutationSettings::default());

    executor.execute(&stock_task(5)).await.unwrap();
    executor.execute(&stock_task(5)).await.unwrap();

    let rows = harness.failures.all();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].attempts, 2);
    assert_eq!(rows[0].context, FailureContext::DownstreamUpdateStock);
}

#[tokio::test]
async fn transient_failure_is_persisted_and_retryable() {
    let harness = Harness::new();
    harness
        .downstream
        .respond_with(Err(StoreSyncError::remote(503, "accounting/update-stock/sv1", None)));
    let executor = harness.executor(MutationSettings::default());

    let outcome = executor.execute(&stock_task(5)).await.unwrap();

    assert!(outcome.is_retryable(), "{outcome:?}");
    assert_eq!(harness.failures.all().len(), 1);
    assert!(harness.events.of_type(EventType::ValidationFailed).is_empty());
}

#[tokio::test]
async fn conflict_answer_counts_as_applied() {
    let harness = Harness::new();
    // Adapters hand a 409 back as a normal body.
    harness.downstream.respond_with(Ok(json!({ "detail": "already applied" })));
    let executor = harness.executor(MutationSettings::default());

    let outcome = executor.execute(&price_task(1000)).await.unwrap();

    assert_eq!(outcome, TaskOutcome::Completed);
    assert!(harness.failures.all().is_empty());
}

#[tokio::test]
async fn circuit_opened_by_transport_defers_instead_of_failing() {
    let harness = Harness::new();
    harness.downstream.respond_with(Err(StoreSyncError::CircuitOpen("downstream".into())));
    let executor = harness.executor(MutationSettings::default());

    let outcome = executor.execute(&price_task(1000)).await.unwrap();

    assert_eq!(outcome, TaskOutcome::Deferred(Duration::from_secs(30)));
    assert!(harness.failures.all().is_empty());
}

#[tokio::test]
async fn local_errors_propagate_without_a_failure_row() {
    let harness = Harness::new();
    harness
        .downstream
        .respond_with(Err(StoreSyncError::InvalidInput("variant id must not be empty".into())));
    let executor = harness.executor(MutationSettings::default());

    let err = executor.execute(&price_task(1000)).await.unwrap_err();

    assert!(matches!(err, StoreSyncError::InvalidInput(_)));
    assert!(harness.failures.all().is_empty());

    let updated = harness.events.of_type(EventType::VariantPriceUpdated);
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].level, EventLevel::Error);
    assert_eq!(updated[0].ref_id.as_deref(), Some("sv1"));
    assert!(updated[0].payload["error"].as_str().unwrap().contains("variant id must not be empty"));
}

#[tokio::test]
async fn early_transient_delivery_is_not_persisted() {
    let harness = Harness::new();
    for _ in 0..2 {
        harness
            .downstream
            .respond_with(Err(StoreSyncError::remote(503, "accounting/update-stock/sv1", None)));
    }
    let executor = harness.executor(MutationSettings::default());

    let outcome = executor.execute_delivery(&stock_task(5), false).await.unwrap();
    assert!(outcome.is_retryable(), "{outcome:?}");
    assert!(harness.failures.all().is_empty());
    assert_eq!(harness.events.of_type(EventType::VariantStockUpdated)[0].level, EventLevel::Error);

    executor.execute_delivery(&stock_task(5), true).await.unwrap();
    let rows = harness.failures.all();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].attempts, 1);
}

#[tokio::test]
async fn seeded_audit_success_blocks_the_call() {
    let harness = Harness::new();
    let task = stock_task(9);
    let key = IdempotencyGuard::key_for(&task);
    harness.audit.seed_success(Driver::Downstream, &key, harness.clock.now());
    let executor = harness.executor(MutationSettings::default());

    let outcome = executor.execute(&task).await.unwrap();

    assert_eq!(outcome, TaskOutcome::Skipped(SkipReason::IdempotentHit));
    assert!(harness.downstream.calls().is_empty());
}

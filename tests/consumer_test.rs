mod common;

use common::{
    fast_consumer_config, sample_order, sample_payload, wait_until, ConsumerHarness,
    FailingDeadLetterSink, ServiceHarness,
};
use order_stream::config::{ConsumerConfig, InvalidMessagePolicy};
use order_stream::messaging::{
    channel_source, MessageEnvelope, MessageSource, MessagingError, OrderConsumer,
    ProcessingOutcome,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_test::{assert_err, assert_ok};

fn order_envelope(uid: &str) -> MessageEnvelope {
    MessageEnvelope::new("orders", sample_payload(uid))
        .with_header("trace-id", "3f2a")
        .with_header("producer", vec![0xff, 0x00, 0x01])
}

async fn subscribed(harness: &ConsumerHarness) {
    assert_ok!(harness.source.subscribe("orders").await);
}

#[tokio::test]
async fn test_retry_recovers_on_third_attempt() {
    let mut harness = ConsumerHarness::new();
    harness.services.repository.fail_next_creates(2);
    let (_stop_tx, mut stop) = watch::channel(false);

    let envelope = order_envelope("order0001");
    let outcome = harness.consumer.handle(envelope.clone(), &mut stop).await;

    assert_eq!(outcome, ProcessingOutcome::Acknowledged { attempts: 3 });
    assert_eq!(harness.services.repository.calls().create, 3);
    assert!(harness.services.cache.get("order0001").is_some());
    assert!(harness.drain_dead_letters().is_empty());
    assert_eq!(harness.source.acknowledged(), vec![envelope.id]);

    let metrics = harness.services.metrics.snapshot();
    assert_eq!(metrics.retries_total, 2);
    assert_eq!(metrics.orders_processed_total, 1);
    assert_eq!(metrics.dead_lettered_total, 0);
}

#[tokio::test]
async fn test_exhausted_retries_dead_letter_original_bytes_once() {
    let mut harness = ConsumerHarness::new();
    harness.services.repository.fail_next_creates(3);
    let (_stop_tx, mut stop) = watch::channel(false);

    let envelope = order_envelope("order0001");
    let outcome = harness.consumer.handle(envelope.clone(), &mut stop).await;

    assert!(matches!(outcome, ProcessingOutcome::DeadLettered { .. }));
    assert_eq!(harness.services.repository.calls().create, 3);
    assert_eq!(harness.services.cache.size(), 0);

    let records = harness.drain_dead_letters();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].payload, envelope.payload);
    assert_eq!(records[0].headers, envelope.headers);

    assert_eq!(harness.source.acknowledged(), vec![envelope.id]);
    assert_eq!(harness.services.metrics.snapshot().dead_lettered_total, 1);
}

#[tokio::test]
async fn test_empty_payload_is_skipped() {
    let mut harness = ConsumerHarness::new();
    let (_stop_tx, mut stop) = watch::channel(false);

    let envelope = MessageEnvelope::new("orders", Vec::new());
    let outcome = harness.consumer.handle(envelope.clone(), &mut stop).await;

    assert_eq!(outcome, ProcessingOutcome::Skipped);
    assert_eq!(harness.services.repository.calls().total(), 0);
    assert!(harness.drain_dead_letters().is_empty());
    assert_eq!(harness.source.acknowledged(), vec![envelope.id]);
    assert_eq!(harness.services.metrics.snapshot().messages_skipped_total, 1);
}

#[tokio::test]
async fn test_malformed_payload_dead_lettered_without_retry() {
    let mut harness = ConsumerHarness::new();
    let (_stop_tx, mut stop) = watch::channel(false);

    let envelope = MessageEnvelope::new("orders", b"{not json".to_vec());
    let outcome = harness.consumer.handle(envelope.clone(), &mut stop).await;

    match outcome {
        ProcessingOutcome::DeadLettered { reason } => assert!(reason.contains("Decode")),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(harness.services.repository.calls().total(), 0);
    assert_eq!(harness.services.metrics.snapshot().retries_total, 0);

    let records = harness.drain_dead_letters();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].payload, b"{not json");
}

#[tokio::test]
async fn test_invalid_order_dead_lettered_without_persistence() {
    let mut harness = ConsumerHarness::new();
    let (_stop_tx, mut stop) = watch::channel(false);

    let mut order = sample_order("order0001");
    order.items.clear();
    let envelope = MessageEnvelope::new("orders", serde_json::to_vec(&order).unwrap());
    let outcome = harness.consumer.handle(envelope, &mut stop).await;

    match outcome {
        ProcessingOutcome::DeadLettered { reason } => {
            assert!(reason.contains("at least one item"))
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(harness.services.repository.calls().create, 0);
    assert_eq!(harness.drain_dead_letters().len(), 1);
}

#[tokio::test]
async fn test_drop_policy_acknowledges_invalid_messages() {
    let mut harness = ConsumerHarness::with_policy(InvalidMessagePolicy::Drop);
    let (_stop_tx, mut stop) = watch::channel(false);

    let envelope = MessageEnvelope::new("orders", b"[]".to_vec());
    let outcome = harness.consumer.handle(envelope.clone(), &mut stop).await;

    assert!(matches!(outcome, ProcessingOutcome::Dropped { .. }));
    assert!(harness.drain_dead_letters().is_empty());
    assert_eq!(harness.source.acknowledged(), vec![envelope.id]);
}

#[tokio::test]
async fn test_failed_dead_letter_hop_is_logged_and_dropped() {
    let services = ServiceHarness::new();
    services.repository.fail_next_creates(3);
    let (_publisher, source) = channel_source("orders", 4);
    let source = Arc::new(source);
    let sink = Arc::new(FailingDeadLetterSink::default());
    let consumer = OrderConsumer::new(
        source.clone(),
        services.service.clone(),
        &fast_consumer_config(),
    )
    .with_dead_letter(sink.clone());
    let (_stop_tx, mut stop) = watch::channel(false);

    let envelope = order_envelope("order0001");
    let outcome = consumer.handle(envelope.clone(), &mut stop).await;

    assert!(matches!(outcome, ProcessingOutcome::Dropped { .. }));
    assert_eq!(sink.attempts(), 1);
    assert_eq!(source.acknowledged(), vec![envelope.id]);

    let metrics = services.metrics.snapshot();
    assert_eq!(metrics.dead_letter_failures_total, 1);
    assert_eq!(metrics.dead_lettered_total, 0);
}

#[tokio::test]
async fn test_running_consumer_processes_in_arrival_order() {
    let harness = ConsumerHarness::new();
    let ConsumerHarness {
        services,
        publisher,
        source,
        consumer,
        ..
    } = harness;

    let handle = consumer.start();
    let mut ids = Vec::new();
    for uid in ["order0001", "order0002", "order0003"] {
        ids.push(publisher.publish(sample_payload(uid)).await.unwrap());
    }

    let repository = services.repository.clone();
    assert!(wait_until(Duration::from_secs(5), || repository.len() == 3).await);

    assert_ok!(handle.stop().await);
    assert_eq!(source.acknowledged(), ids);
    assert_eq!(services.cache.size(), 3);
    assert_eq!(services.metrics.snapshot().messages_received_total, 3);
}

#[tokio::test]
async fn test_idle_consumer_stops_promptly() {
    let harness = ConsumerHarness::with_config(ConsumerConfig {
        poll_timeout_ms: 50,
        ..fast_consumer_config()
    });

    let handle = harness.consumer.start();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let stopped = assert_ok!(tokio::time::timeout(Duration::from_secs(1), handle.stop()).await);
    assert_ok!(stopped);
}

#[tokio::test]
async fn test_stop_during_backoff_leaves_message_unacknowledged() {
    let harness = ConsumerHarness::with_config(ConsumerConfig {
        base_backoff_ms: 60_000,
        ..fast_consumer_config()
    });
    let ConsumerHarness {
        services,
        publisher,
        source,
        mut dead_letters,
        consumer,
    } = harness;
    services.repository.fail_next_creates(3);

    let handle = consumer.start();
    publisher.publish(sample_payload("order0001")).await.unwrap();

    let repository = services.repository.clone();
    assert!(wait_until(Duration::from_secs(5), || repository.calls().create == 1).await);

    let stopped = assert_ok!(tokio::time::timeout(Duration::from_secs(1), handle.stop()).await);
    assert_ok!(stopped);

    assert!(source.acknowledged().is_empty());
    assert!(dead_letters.try_recv().is_err());
    assert_eq!(services.cache.size(), 0);
    assert_eq!(repository.calls().create, 1);
}

#[tokio::test]
async fn test_subscription_is_required_before_polling() {
    let harness = ConsumerHarness::new();
    let err = assert_err!(harness.source.poll_once(Duration::from_millis(1)).await);
    assert_eq!(err, MessagingError::NotSubscribed);

    subscribed(&harness).await;
    let polled = assert_ok!(harness.source.poll_once(Duration::from_millis(1)).await);
    assert!(polled.is_none());
}

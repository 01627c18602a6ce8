#![allow(dead_code)] // Each integration test binary uses a different subset

pub mod strategies;

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use order_stream::cache::{CacheHandle, InMemoryCache, LruOrderCache, OrderCache, StatsCache};
use order_stream::config::{ConsumerConfig, InvalidMessagePolicy};
use order_stream::messaging::{
    channel_source, ChannelDeadLetterSink, ChannelMessageSource, ChannelPublisher,
    DeadLetterRecord, DeadLetterSink, MessageHeader, MessagingError, MessagingResult,
    OrderConsumer,
};
use order_stream::services::{OrderMetrics, OrderService};
use order_stream::test_helpers::InMemoryOrderRepository;

pub use order_stream::test_helpers::{sample_order, sample_order_created, sample_payload};

/// Unbounded cache wrapped in the stats decorator
pub fn stats_cache() -> CacheHandle {
    let cache = Arc::new(StatsCache::new(Arc::new(InMemoryCache::new())));
    CacheHandle {
        cache: cache.clone(),
        stats: Some(cache),
    }
}

pub fn lru_cache(capacity: usize) -> CacheHandle {
    CacheHandle {
        cache: Arc::new(LruOrderCache::new(capacity).unwrap()) as Arc<dyn OrderCache>,
        stats: None,
    }
}

pub struct ServiceHarness {
    pub repository: Arc<InMemoryOrderRepository>,
    pub cache: Arc<dyn OrderCache>,
    pub metrics: Arc<OrderMetrics>,
    pub service: OrderService,
}

impl ServiceHarness {
    pub fn new() -> Self {
        Self::with_cache(stats_cache())
    }

    pub fn with_cache(handle: CacheHandle) -> Self {
        let repository = Arc::new(InMemoryOrderRepository::new());
        let metrics = Arc::new(OrderMetrics::new());
        let cache = handle.cache.clone();
        let service = OrderService::new(repository.clone(), handle, metrics.clone());
        Self {
            repository,
            cache,
            metrics,
            service,
        }
    }
}

/// Fast timings so retry paths finish in milliseconds
pub fn fast_consumer_config() -> ConsumerConfig {
    ConsumerConfig {
        poll_timeout_ms: 5,
        base_backoff_ms: 1,
        max_retries: 3,
        ..ConsumerConfig::default()
    }
}

pub struct ConsumerHarness {
    pub services: ServiceHarness,
    pub publisher: ChannelPublisher,
    pub source: Arc<ChannelMessageSource>,
    pub dead_letters: mpsc::UnboundedReceiver<DeadLetterRecord>,
    pub consumer: OrderConsumer,
}

impl ConsumerHarness {
    pub fn new() -> Self {
        Self::with_config(fast_consumer_config())
    }

    pub fn with_policy(policy: InvalidMessagePolicy) -> Self {
        Self::with_config(ConsumerConfig {
            invalid_message_policy: policy,
            ..fast_consumer_config()
        })
    }

    pub fn with_config(config: ConsumerConfig) -> Self {
        let services = ServiceHarness::new();
        let (publisher, source) = channel_source(config.topic.clone(), 16);
        let source = Arc::new(source);
        let (sink, dead_letters) = ChannelDeadLetterSink::new("orders_dlq");
        let consumer = OrderConsumer::new(source.clone(), services.service.clone(), &config)
            .with_dead_letter(Arc::new(sink));
        Self {
            services,
            publisher,
            source,
            dead_letters,
            consumer,
        }
    }

    /// Collect every dead-letter record currently queued
    pub fn drain_dead_letters(&mut self) -> Vec<DeadLetterRecord> {
        let mut records = Vec::new();
        while let Ok(record) = self.dead_letters.try_recv() {
            records.push(record);
        }
        records
    }
}

/// Dead-letter sink that always fails, counting attempts
#[derive(Debug, Default)]
pub struct FailingDeadLetterSink {
    attempts: Mutex<usize>,
}

impl FailingDeadLetterSink {
    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }
}

#[async_trait]
impl DeadLetterSink for FailingDeadLetterSink {
    async fn send(&self, _payload: &[u8], _headers: &[MessageHeader]) -> MessagingResult<()> {
        *self.attempts.lock() += 1;
        Err(MessagingError::channel_closed("orders_dlq"))
    }

    async fn flush(&self) -> MessagingResult<()> {
        Ok(())
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

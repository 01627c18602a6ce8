//! # Order Consumer
//!
//! Runs the ingestion consumer against pgmq queues until Ctrl-C.
//!
//! Configuration comes from `config/order-stream.toml` (or the file named by
//! `ORDER_STREAM_CONFIG`), `ORDER_STREAM_*` environment overrides and
//! `DATABASE_URL`.

use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};

use order_stream::cache::build_cache;
use order_stream::config::ConfigLoader;
use order_stream::logging::init_structured_logging;
use order_stream::messaging::{OrderConsumer, PgmqDeadLetterSink, PgmqMessageSource};
use order_stream::repository::PostgresOrderRepository;
use order_stream::services::{OrderMetrics, OrderService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let config = ConfigLoader::load().context("failed to load configuration")?;

    let repository = PostgresOrderRepository::connect(&config.database)
        .await
        .context("failed to connect to the order database")?;
    let pool = repository.pool().clone();

    let cache = build_cache(&config.cache).context("failed to build the order cache")?;
    let metrics = Arc::new(OrderMetrics::new());
    let service = OrderService::new(Arc::new(repository), cache, metrics.clone());

    match service.warmup_cache().await {
        Ok(loaded) => info!(loaded = loaded, "Cache warmup complete"),
        Err(err) => warn!(error = %err, "Cache warmup failed, starting with an empty cache"),
    }

    let source = PgmqMessageSource::new(pool.clone(), config.consumer.visibility_timeout_seconds);
    let mut consumer = OrderConsumer::new(Arc::new(source), service.clone(), &config.consumer);

    if config.dead_letter.enabled {
        let sink = PgmqDeadLetterSink::connect(pool.clone(), &config.dead_letter.topic)
            .await
            .context("failed to prepare the dead-letter queue")?;
        consumer = consumer.with_dead_letter(Arc::new(sink));
    }

    let handle = consumer.start();
    info!(
        topic = %config.consumer.topic,
        dead_letter_enabled = config.dead_letter.enabled,
        "Order consumer running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    handle.stop().await.context("consumer exited with an error")?;

    let snapshot = metrics.snapshot();
    let stats = service.cache_stats();
    info!(
        orders_processed = snapshot.orders_processed_total,
        dead_lettered = snapshot.dead_lettered_total,
        retries = snapshot.retries_total,
        cache_size = stats.size,
        cache_hit_rate = stats.hit_rate,
        "Order consumer stopped"
    );

    pool.close().await;
    Ok(())
}

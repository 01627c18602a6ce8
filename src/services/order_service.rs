//! # Order Service
//!
//! Coordinates validation, persistence and the order cache.
//!
//! Writes go to the repository first and are mirrored into the cache only
//! after the repository reports success, so a failed or interrupted write
//! never leaves a cached order that was not committed. Reads are served from
//! the cache and fall back to the repository, backfilling on the way out.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use order_stream::cache::build_cache;
//! use order_stream::config::CacheConfig;
//! use order_stream::services::{OrderMetrics, OrderService};
//! use order_stream::test_helpers::{sample_order, InMemoryOrderRepository};
//!
//! # tokio_test::block_on(async {
//! let cache = build_cache(&CacheConfig::default()).unwrap();
//! let service = OrderService::new(
//!     Arc::new(InMemoryOrderRepository::new()),
//!     cache,
//!     Arc::new(OrderMetrics::new()),
//! );
//!
//! service.process_order(sample_order("order0001")).await.unwrap();
//! let order = service.get_by_uid("order0001").await.unwrap();
//! assert_eq!(order.order_uid, "order0001");
//! # });
//! ```

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::metrics::OrderMetrics;
use crate::cache::{CacheHandle, CacheStats, CacheStatsProvider, OrderCache};
use crate::error::{OrderError, Result};
use crate::logging::log_order_operation;
use crate::models::Order;
use crate::repository::OrderRepository;
use crate::validation::validate_order;

#[derive(Debug, Clone)]
pub struct OrderService {
    repository: Arc<dyn OrderRepository>,
    cache: Arc<dyn OrderCache>,
    /// Present only when the configured cache reports hit/miss statistics
    stats: Option<Arc<dyn CacheStatsProvider>>,
    metrics: Arc<OrderMetrics>,
}

impl OrderService {
    pub fn new(
        repository: Arc<dyn OrderRepository>,
        cache: CacheHandle,
        metrics: Arc<OrderMetrics>,
    ) -> Self {
        Self {
            repository,
            cache: cache.cache,
            stats: cache.stats,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<OrderMetrics> {
        &self.metrics
    }

    pub fn cache(&self) -> &Arc<dyn OrderCache> {
        &self.cache
    }

    /// Validate, persist and cache an order.
    ///
    /// Re-processing an existing `order_uid` replaces the stored aggregate.
    /// Returns the order as persisted, with `date_created` filled in.
    #[instrument(skip(self, order), fields(order_uid = %order.order_uid))]
    pub async fn process_order(&self, mut order: Order) -> Result<Order> {
        let start = Instant::now();

        if let Err(err) = validate_order(&order) {
            self.metrics.record_process_error(err.kind());
            return Err(err);
        }

        order.ensure_date_created();

        if let Err(err) = self.repository.create(&order).await {
            self.metrics.record_process_error(err.kind());
            warn!(error = %err, "Order persistence failed");
            return Err(err);
        }

        self.cache.set(&order.order_uid, order.clone());

        let elapsed = start.elapsed();
        self.metrics.record_order_processed(elapsed);
        log_order_operation(
            "process_order",
            Some(&order.order_uid),
            "success",
            Some(elapsed.as_millis() as u64),
            None,
        );

        Ok(order)
    }

    /// Cache first, then the repository; a repository hit is cached.
    ///
    /// A `delete_order` racing with the backfill can leave the deleted order
    /// cached until the next write, delete or warmup for that uid.
    #[instrument(skip(self))]
    pub async fn get_by_uid(&self, order_uid: &str) -> Result<Order> {
        if let Some(order) = self.cache.get(order_uid) {
            debug!("Order served from cache");
            return Ok(order);
        }

        match self.repository.get_by_uid(order_uid).await? {
            Some(order) => {
                self.cache.set(order_uid, order.clone());
                debug!("Order loaded from repository and cached");
                Ok(order)
            }
            None => Err(OrderError::not_found(order_uid)),
        }
    }

    /// Every stored order, newest first; each one is also cached
    #[instrument(skip(self))]
    pub async fn get_all(&self) -> Result<Vec<Order>> {
        let orders = self.repository.list_all().await?;
        for order in &orders {
            self.cache.set(&order.order_uid, order.clone());
        }
        Ok(orders)
    }

    #[instrument(skip(self, order), fields(order_uid = %order.order_uid))]
    pub async fn update_order(&self, mut order: Order) -> Result<Order> {
        validate_order(&order)?;
        order.ensure_date_created();

        self.repository.update(&order).await?;
        self.cache.set(&order.order_uid, order.clone());

        log_order_operation("update_order", Some(&order.order_uid), "success", None, None);
        Ok(order)
    }

    #[instrument(skip(self))]
    pub async fn delete_order(&self, order_uid: &str) -> Result<()> {
        self.repository.delete(order_uid).await?;
        self.cache.delete(order_uid);

        log_order_operation("delete_order", Some(order_uid), "success", None, None);
        Ok(())
    }

    /// Replace the cache contents with every order the repository holds.
    ///
    /// The repository is read before the cache is cleared, so a failed load
    /// leaves the previous contents in place. Returns the number of orders loaded.
    #[instrument(skip(self))]
    pub async fn warmup_cache(&self) -> Result<usize> {
        let start = Instant::now();
        let orders = self.repository.list_all().await?;

        self.cache.clear();
        for order in orders {
            let order_uid = order.order_uid.clone();
            self.cache.set(&order_uid, order);
        }

        let loaded = self.cache.size();
        info!(
            loaded = loaded,
            duration_ms = start.elapsed().as_millis() as u64,
            "Order cache warmed up"
        );
        Ok(loaded)
    }

    /// Hit/miss statistics, or an all-zero snapshot when the cache keeps none
    pub fn cache_stats(&self) -> CacheStats {
        self.stats
            .as_ref()
            .map(|provider| provider.stats())
            .unwrap_or_default()
    }
}

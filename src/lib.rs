#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Order Stream
//!
//! Order ingestion from a message queue into PostgreSQL, fronted by an
//! in-process order cache.
//!
//! ## Overview
//!
//! Producers publish order aggregates (order, delivery, payment, line items)
//! as JSON. The [`messaging::OrderConsumer`] polls them one at a time and hands
//! each to the [`services::OrderService`], which validates it, persists it in
//! one transaction and only then writes it to the cache. Reads go through the
//! same service: cache first, repository on a miss, backfilling the cache.
//!
//! Persistence failures are retried with linear backoff. Messages that still
//! fail, or that cannot be decoded or validated, are forwarded unchanged to a
//! dead-letter sink.
//!
//! ## Module Organization
//!
//! - [`cache`] - `OrderCache` trait, unbounded and LRU backends, hit/miss stats
//! - [`config`] - Layered configuration loading and validation
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured `tracing` setup
//! - [`messaging`] - Message sources, dead-letter sinks and the consumer
//! - [`models`] - The order aggregate
//! - [`repository`] - Persistence contract and the PostgreSQL backend
//! - [`services`] - Order service and metrics collector
//! - [`validation`] - Aggregate invariants
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use order_stream::cache::build_cache;
//! use order_stream::config::ConfigLoader;
//! use order_stream::repository::PostgresOrderRepository;
//! use order_stream::services::{OrderMetrics, OrderService};
//! use std::sync::Arc;
//!
//! # async fn example() -> order_stream::Result<()> {
//! let config = ConfigLoader::load()?;
//! let repository = Arc::new(PostgresOrderRepository::connect(&config.database).await?);
//! let cache = build_cache(&config.cache)?;
//! let service = OrderService::new(repository, cache, Arc::new(OrderMetrics::new()));
//!
//! service.warmup_cache().await?;
//! let order = service.get_by_uid("b563feb7b2b84b6test").await?;
//! println!("{} items", order.items.len());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod repository;
pub mod services;
pub mod test_helpers;
pub mod validation;

pub use config::OrderStreamConfig;
pub use error::{OrderError, Result};
pub use models::Order;

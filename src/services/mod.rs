//! # Services
//!
//! The order service and the metrics collector it shares with the
//! ingestion consumer.

pub mod metrics;
pub mod order_service;

pub use metrics::{OrderMetrics, OrderMetricsSnapshot};
pub use order_service::OrderService;

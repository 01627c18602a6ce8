//! # Order Metrics
//!
//! Counters for the order service and the ingestion consumer. One collector
//! is built at startup and shared by `Arc`; nothing here is process-global.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Serialisable point-in-time copy of every counter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderMetricsSnapshot {
    pub uptime_seconds: u64,

    // Order service
    pub orders_processed_total: u64,
    pub orders_process_errors_total: u64,
    /// Failures by `OrderError::kind`
    pub error_counts: HashMap<String, u64>,

    // Ingestion
    pub messages_received_total: u64,
    pub messages_skipped_total: u64,
    pub retries_total: u64,
    pub dead_lettered_total: u64,
    pub dead_letter_failures_total: u64,

    // Processing duration of successful `process_order` calls
    pub processing_duration_count: u64,
    pub processing_duration_sum_ms: f64,
    pub processing_duration_max_ms: f64,
}

impl OrderMetricsSnapshot {
    /// Mean successful processing time, 0.0 before the first order
    pub fn avg_processing_time_ms(&self) -> f64 {
        if self.processing_duration_count == 0 {
            0.0
        } else {
            self.processing_duration_sum_ms / self.processing_duration_count as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    orders_processed: u64,
    orders_process_errors: u64,
    error_counts: HashMap<String, u64>,
    messages_received: u64,
    messages_skipped: u64,
    retries: u64,
    dead_lettered: u64,
    dead_letter_failures: u64,
    duration_count: u64,
    duration_sum_ms: f64,
    duration_max_ms: f64,
}

/// Metrics collector injected into `OrderService` and `OrderConsumer`
#[derive(Debug)]
pub struct OrderMetrics {
    started_at: Instant,
    counters: Mutex<Counters>,
}

impl Default for OrderMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            counters: Mutex::new(Counters::default()),
        }
    }

    /// Record a successfully persisted and cached order
    pub fn record_order_processed(&self, duration: Duration) {
        let duration_ms = duration.as_secs_f64() * 1000.0;
        let mut counters = self.counters.lock();
        counters.orders_processed += 1;
        counters.duration_count += 1;
        counters.duration_sum_ms += duration_ms;
        if duration_ms > counters.duration_max_ms {
            counters.duration_max_ms = duration_ms;
        }
    }

    /// Record a failed `process_order`, keyed by error kind
    pub fn record_process_error(&self, kind: &str) {
        let mut counters = self.counters.lock();
        counters.orders_process_errors += 1;
        *counters.error_counts.entry(kind.to_string()).or_insert(0) += 1;
    }

    pub fn record_message_received(&self) {
        self.counters.lock().messages_received += 1;
    }

    pub fn record_message_skipped(&self) {
        self.counters.lock().messages_skipped += 1;
    }

    pub fn record_retry(&self) {
        self.counters.lock().retries += 1;
    }

    pub fn record_dead_lettered(&self) {
        self.counters.lock().dead_lettered += 1;
    }

    pub fn record_dead_letter_failure(&self) {
        self.counters.lock().dead_letter_failures += 1;
    }

    pub fn snapshot(&self) -> OrderMetricsSnapshot {
        let counters = self.counters.lock();
        OrderMetricsSnapshot {
            uptime_seconds: self.started_at.elapsed().as_secs(),
            orders_processed_total: counters.orders_processed,
            orders_process_errors_total: counters.orders_process_errors,
            error_counts: counters.error_counts.clone(),
            messages_received_total: counters.messages_received,
            messages_skipped_total: counters.messages_skipped,
            retries_total: counters.retries,
            dead_lettered_total: counters.dead_lettered,
            dead_letter_failures_total: counters.dead_letter_failures,
            processing_duration_count: counters.duration_count,
            processing_duration_sum_ms: counters.duration_sum_ms,
            processing_duration_max_ms: counters.duration_max_ms,
        }
    }

    /// Zero every counter; uptime keeps running
    pub fn reset(&self) {
        *self.counters.lock() = Counters::default();
    }
}

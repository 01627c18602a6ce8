//! Hit/miss accounting decorator for any [`OrderCache`].

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::OrderCache;
use crate::models::Order;

/// Point-in-time view of cache effectiveness
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Entries currently held by the wrapped cache
    pub size: usize,
    /// hits / (hits + misses), 0.0 before the first read
    pub hit_rate: f64,
    /// misses / (hits + misses), 0.0 before the first read
    pub miss_rate: f64,
    pub total_hits: u64,
    pub total_misses: u64,
    /// Time since the stats wrapper was created
    pub uptime: Duration,
}

/// Anything that can report [`CacheStats`]
pub trait CacheStatsProvider: Send + Sync + std::fmt::Debug {
    fn stats(&self) -> CacheStats;
}

#[derive(Debug, Default, Clone, Copy)]
struct ReadCounters {
    hits: u64,
    misses: u64,
}

impl ReadCounters {
    fn rates(&self) -> (f64, f64) {
        let total = self.hits + self.misses;
        if total == 0 {
            return (0.0, 0.0);
        }
        let total = total as f64;
        (self.hits as f64 / total, self.misses as f64 / total)
    }
}

/// Decorator counting hits and misses on `get`; every other call is forwarded.
#[derive(Debug)]
pub struct StatsCache {
    inner: Arc<dyn OrderCache>,
    counters: Mutex<ReadCounters>,
    started_at: Instant,
}

impl StatsCache {
    pub fn new(inner: Arc<dyn OrderCache>) -> Self {
        Self {
            inner,
            counters: Mutex::new(ReadCounters::default()),
            started_at: Instant::now(),
        }
    }
}

impl OrderCache for StatsCache {
    fn set(&self, order_uid: &str, order: Order) {
        self.inner.set(order_uid, order);
    }

    fn get(&self, order_uid: &str) -> Option<Order> {
        let found = self.inner.get(order_uid);

        let mut counters = self.counters.lock();
        if found.is_some() {
            counters.hits += 1;
        } else {
            counters.misses += 1;
        }
        drop(counters);

        found
    }

    fn delete(&self, order_uid: &str) {
        self.inner.delete(order_uid);
    }

    fn get_all(&self) -> HashMap<String, Order> {
        self.inner.get_all()
    }

    fn clear(&self) {
        self.inner.clear();
    }

    fn size(&self) -> usize {
        self.inner.size()
    }
}

impl CacheStatsProvider for StatsCache {
    fn stats(&self) -> CacheStats {
        let counters = *self.counters.lock();
        let (hit_rate, miss_rate) = counters.rates();

        CacheStats {
            size: self.inner.size(),
            hit_rate,
            miss_rate,
            total_hits: counters.hits,
            total_misses: counters.misses,
            uptime: self.started_at.elapsed(),
        }
    }
}

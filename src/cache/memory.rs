//! Unbounded map-backed cache.

use parking_lot::RwLock;
use std::collections::HashMap;

use super::OrderCache;
use crate::models::Order;

/// Unbounded cache: grows with the number of distinct order ids.
///
/// Reads share the lock; writes hold it exclusively.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    items: RwLock<HashMap<String, Order>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OrderCache for InMemoryCache {
    fn set(&self, order_uid: &str, order: Order) {
        self.items.write().insert(order_uid.to_string(), order);
    }

    fn get(&self, order_uid: &str) -> Option<Order> {
        self.items.read().get(order_uid).cloned()
    }

    fn delete(&self, order_uid: &str) {
        self.items.write().remove(order_uid);
    }

    fn get_all(&self) -> HashMap<String, Order> {
        self.items.read().clone()
    }

    fn clear(&self) {
        self.items.write().clear();
    }

    fn size(&self) -> usize {
        self.items.read().len()
    }
}

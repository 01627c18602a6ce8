//! Bounded least-recently-used cache.

use ::lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use tracing::debug;

use super::OrderCache;
use crate::error::{OrderError, Result};
use crate::models::Order;

/// Fixed-capacity cache that evicts the least recently touched entry.
///
/// Both `get` and `set` count as a touch. A lookup promotes the entry, so
/// every operation takes the mutex exclusively; promotion and value read
/// happen under the same guard.
#[derive(Debug)]
pub struct LruOrderCache {
    capacity: NonZeroUsize,
    items: Mutex<LruCache<String, Order>>,
}

impl LruOrderCache {
    /// Create a cache holding at most `capacity` orders. Zero is rejected.
    pub fn new(capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            OrderError::configuration("LRU cache capacity must be greater than zero")
        })?;

        Ok(Self {
            capacity,
            items: Mutex::new(LruCache::new(capacity)),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }
}

impl OrderCache for LruOrderCache {
    fn set(&self, order_uid: &str, order: Order) {
        // push returns the old pair on overwrite, or the evicted pair when full
        let displaced = self.items.lock().push(order_uid.to_string(), order);
        if let Some((evicted_uid, _)) = displaced {
            if evicted_uid != order_uid {
                debug!(order_uid = %evicted_uid, "Evicted least recently used order");
            }
        }
    }

    fn get(&self, order_uid: &str) -> Option<Order> {
        self.items.lock().get(order_uid).cloned()
    }

    fn delete(&self, order_uid: &str) {
        self.items.lock().pop(order_uid);
    }

    fn get_all(&self) -> HashMap<String, Order> {
        // iter() does not promote entries
        self.items
            .lock()
            .iter()
            .map(|(uid, order)| (uid.clone(), order.clone()))
            .collect()
    }

    fn clear(&self) {
        self.items.lock().clear();
    }

    fn size(&self) -> usize {
        self.items.lock().len()
    }
}

//! # Order Cache
//!
//! In-process cache of order snapshots keyed by `order_uid`.
//!
//! ## Backends
//!
//! - [`InMemoryCache`]: unbounded map, no eviction
//! - [`LruOrderCache`]: fixed capacity, evicts the least recently touched entry
//!
//! Either backend can be wrapped by [`StatsCache`], which counts hits and
//! misses on `get` and forwards every other operation untouched.
//!
//! ## Concurrency
//!
//! All backends are `Send + Sync` and are shared between the ingestion
//! consumer and request-serving tasks behind an `Arc`. Values are returned
//! by clone, so callers never alias cached state.
//!
//! ```rust
//! use order_stream::cache::{LruOrderCache, OrderCache, StatsCache, CacheStatsProvider};
//! use std::sync::Arc;
//!
//! # fn main() -> order_stream::Result<()> {
//! let stats = StatsCache::new(Arc::new(LruOrderCache::new(2)?));
//! assert!(stats.get("missing").is_none());
//! assert_eq!(stats.stats().total_misses, 1);
//! # Ok(())
//! # }
//! ```

pub mod lru;
pub mod memory;
pub mod stats;

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::info;

use crate::config::{CacheConfig, CacheType};
use crate::error::Result;
use crate::models::Order;

pub use self::lru::LruOrderCache;
pub use memory::InMemoryCache;
pub use stats::{CacheStats, CacheStatsProvider, StatsCache};

/// Capability set shared by every cache backend and decorator
pub trait OrderCache: Send + Sync + Debug {
    /// Insert or overwrite the snapshot stored under `order_uid`
    fn set(&self, order_uid: &str, order: Order);

    /// Return a copy of the snapshot stored under `order_uid`, if any
    fn get(&self, order_uid: &str) -> Option<Order>;

    /// Remove the entry for `order_uid`; absent keys are ignored
    fn delete(&self, order_uid: &str);

    /// Independent copy of every entry currently cached
    fn get_all(&self) -> HashMap<String, Order>;

    /// Drop every entry
    fn clear(&self);

    /// Number of entries currently cached
    fn size(&self) -> usize;
}

/// The cache selected at startup, plus its stats view when one was configured
#[derive(Debug, Clone)]
pub struct CacheHandle {
    pub cache: Arc<dyn OrderCache>,
    pub stats: Option<Arc<dyn CacheStatsProvider>>,
}

/// Build the cache backend described by `config`
pub fn build_cache(config: &CacheConfig) -> Result<CacheHandle> {
    let backend: Arc<dyn OrderCache> = match config.cache_type {
        CacheType::Memory => Arc::new(InMemoryCache::new()),
        CacheType::Lru => Arc::new(LruOrderCache::new(config.lru_capacity)?),
    };

    info!(
        cache_type = ?config.cache_type,
        lru_capacity = config.lru_capacity,
        stats_enabled = config.stats_enabled,
        "Order cache initialized"
    );

    if config.stats_enabled {
        let stats_cache = Arc::new(StatsCache::new(backend));
        Ok(CacheHandle {
            cache: stats_cache.clone(),
            stats: Some(stats_cache),
        })
    } else {
        Ok(CacheHandle {
            cache: backend,
            stats: None,
        })
    }
}

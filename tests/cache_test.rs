mod common;

use common::strategies::*;
use common::{sample_order, stats_cache};
use order_stream::cache::{
    CacheStatsProvider, InMemoryCache, LruOrderCache, OrderCache, StatsCache,
};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

fn backends() -> Vec<Arc<dyn OrderCache>> {
    vec![
        Arc::new(InMemoryCache::new()),
        Arc::new(LruOrderCache::new(8).unwrap()),
        Arc::new(StatsCache::new(Arc::new(InMemoryCache::new()))),
    ]
}

#[test]
fn test_lru_get_protects_from_eviction() {
    let cache = LruOrderCache::new(2).unwrap();
    cache.set("A", sample_order("A"));
    cache.set("B", sample_order("B"));
    assert!(cache.get("A").is_some());
    cache.set("C", sample_order("C"));

    assert!(cache.get("B").is_none());
    assert!(cache.get("A").is_some());
    assert!(cache.get("C").is_some());
    assert_eq!(cache.size(), 2);
}

#[test]
fn test_lru_rejects_zero_capacity() {
    assert!(LruOrderCache::new(0).is_err());
}

#[test]
fn test_stats_two_hits_one_miss() {
    let handle = stats_cache();
    handle.cache.set("A", sample_order("A"));
    handle.cache.set("B", sample_order("B"));

    assert!(handle.cache.get("A").is_some());
    assert!(handle.cache.get("B").is_some());
    assert!(handle.cache.get("Z").is_none());

    let stats = handle.stats.unwrap().stats();
    assert_eq!(stats.total_hits, 2);
    assert_eq!(stats.total_misses, 1);
    assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-9);
    assert!((stats.miss_rate - 1.0 / 3.0).abs() < 1e-9);
    assert_eq!(stats.size, 2);
}

#[test]
fn test_get_all_is_independent_of_every_backend() {
    for cache in backends() {
        cache.set("order0001", sample_order("order0001"));
        cache.set("order0002", sample_order("order0002"));

        let mut snapshot = cache.get_all();
        snapshot.remove("order0001");
        snapshot.insert("order0099".to_string(), sample_order("order0099"));
        if let Some(order) = snapshot.get_mut("order0002") {
            order.track_number = "MUTATED".to_string();
        }

        assert_eq!(cache.size(), 2, "{cache:?}");
        assert!(cache.get("order0001").is_some());
        assert!(cache.get("order0099").is_none());
        assert_eq!(
            cache.get("order0002").map(|order| order.track_number),
            Some("WBILMTESTTRACK".to_string())
        );
    }
}

#[test]
fn test_clear_and_delete_on_every_backend() {
    for cache in backends() {
        cache.set("order0001", sample_order("order0001"));
        cache.set("order0002", sample_order("order0002"));

        cache.delete("order0001");
        cache.delete("absent00");
        assert_eq!(cache.size(), 1);

        cache.clear();
        assert_eq!(cache.size(), 0);
        assert!(cache.get_all().is_empty());
    }
}

#[tokio::test]
async fn test_concurrent_writers_and_readers_share_a_cache() {
    let cache: Arc<dyn OrderCache> = Arc::new(StatsCache::new(Arc::new(InMemoryCache::new())));

    let mut tasks = Vec::new();
    for worker in 0..8 {
        let cache = cache.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..50 {
                let uid = format!("w{worker}o{i}");
                cache.set(&uid, sample_order(&uid));
                assert!(cache.get(&uid).is_some());
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(cache.size(), 400);
}

proptest! {
    /// Property: hit and miss rates always match the observed counts
    #[test]
    fn test_stats_rates_match_counts(lookups in prop::collection::vec(any::<bool>(), 0..64)) {
        let stats_cache = StatsCache::new(Arc::new(InMemoryCache::new()));
        stats_cache.set("present0", sample_order("present0"));

        for hit in &lookups {
            stats_cache.get(if *hit { "present0" } else { "absent00" });
        }

        let stats = stats_cache.stats();
        let hits = lookups.iter().filter(|hit| **hit).count() as u64;
        let total = lookups.len() as u64;
        prop_assert_eq!(stats.total_hits, hits);
        prop_assert_eq!(stats.total_misses, total - hits);

        if total == 0 {
            prop_assert_eq!(stats.hit_rate, 0.0);
            prop_assert_eq!(stats.miss_rate, 0.0);
        } else {
            prop_assert!((stats.hit_rate - hits as f64 / total as f64).abs() < 1e-9);
            prop_assert!((stats.hit_rate + stats.miss_rate - 1.0).abs() < 1e-9);
        }
    }

    /// Property: the LRU backend evicts exactly what a recency list would
    #[test]
    fn test_lru_matches_recency_model(capacity in 1usize..5, ops in cache_ops_strategy(64)) {
        let cache = LruOrderCache::new(capacity).unwrap();
        let mut model: Vec<String> = Vec::new();

        for op in ops {
            match op {
                CacheOp::Set(key) => {
                    cache.set(&key, sample_order(&key));
                    if let Some(pos) = model.iter().position(|k| *k == key) {
                        model.remove(pos);
                    } else if model.len() == capacity {
                        model.remove(0);
                    }
                    model.push(key);
                }
                CacheOp::Get(key) => {
                    let found = cache.get(&key).is_some();
                    let pos = model.iter().position(|k| *k == key);
                    prop_assert_eq!(found, pos.is_some());
                    if let Some(pos) = pos {
                        let key = model.remove(pos);
                        model.push(key);
                    }
                }
                CacheOp::Delete(key) => {
                    cache.delete(&key);
                    model.retain(|k| *k != key);
                }
            }

            prop_assert!(cache.size() <= capacity);
            prop_assert_eq!(cache.size(), model.len());
            let cached: HashSet<String> = cache.get_all().into_keys().collect();
            let expected: HashSet<String> = model.iter().cloned().collect();
            prop_assert_eq!(cached, expected);
        }
    }
}

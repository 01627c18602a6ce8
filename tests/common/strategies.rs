//! Proptest strategies for cache property tests

use proptest::prelude::*;

/// Cache operation drawn from a small key space so keys collide often
#[derive(Debug, Clone)]
pub enum CacheOp {
    Set(String),
    Get(String),
    Delete(String),
}

pub fn cache_key_strategy() -> impl Strategy<Value = String> {
    "[a-e]".prop_map(|key| format!("order{key}"))
}

pub fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        3 => cache_key_strategy().prop_map(CacheOp::Set),
        3 => cache_key_strategy().prop_map(CacheOp::Get),
        1 => cache_key_strategy().prop_map(CacheOp::Delete),
    ]
}

pub fn cache_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<CacheOp>> {
    prop::collection::vec(cache_op_strategy(), 0..max_len)
}

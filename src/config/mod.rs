//! # Order Stream Configuration
//!
//! Typed configuration for the database pool, the order cache, the ingestion
//! consumer and its dead-letter destination.
//!
//! ## Sources (later wins)
//!
//! 1. Built-in defaults ([`OrderStreamConfig::default`])
//! 2. Optional TOML file (`config/order-stream.toml`, or `ORDER_STREAM_CONFIG`)
//! 3. Environment variables prefixed `ORDER_STREAM_` with `__` between
//!    sections, e.g. `ORDER_STREAM_CACHE__CACHE_TYPE=lru`
//! 4. `DATABASE_URL`
//!
//! ```rust,no_run
//! use order_stream::config::ConfigLoader;
//!
//! # fn main() -> order_stream::Result<()> {
//! let config = ConfigLoader::load()?;
//! println!("consuming from {}", config.consumer.topic);
//! # Ok(())
//! # }
//! ```

pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{OrderError, Result};

pub use loader::ConfigLoader;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OrderStreamConfig {
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub consumer: ConsumerConfig,
    pub dead_letter: DeadLetterConfig,
}

/// Database connection pool settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/order_stream_development".to_string(),
            max_connections: 10,
            acquire_timeout_seconds: 5,
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }
}

/// Cache backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheType {
    /// Unbounded map
    #[default]
    Memory,
    /// Bounded least-recently-used store
    Lru,
}

/// Order cache settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub cache_type: CacheType,
    /// Capacity of the LRU backend; ignored for `memory`
    pub lru_capacity: usize,
    /// Wrap the backend in the hit/miss accounting decorator
    pub stats_enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_type: CacheType::Memory,
            lru_capacity: 1000,
            stats_enabled: true,
        }
    }
}

/// What the consumer does with messages that cannot be decoded or validated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidMessagePolicy {
    /// Forward to the dead-letter sink immediately, without retrying
    #[default]
    DeadLetter,
    /// Log and acknowledge
    Drop,
}

/// Ingestion consumer settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsumerConfig {
    pub topic: String,
    pub poll_timeout_ms: u64,
    /// Total processing attempts per message, including the first
    pub max_retries: u32,
    /// Backoff before attempt n+1 is `base_backoff_ms * n`
    pub base_backoff_ms: u64,
    /// How long a polled message stays invisible to other consumers
    pub visibility_timeout_seconds: u32,
    pub invalid_message_policy: InvalidMessagePolicy,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            topic: "orders".to_string(),
            poll_timeout_ms: 100,
            max_retries: 3,
            base_backoff_ms: 200,
            visibility_timeout_seconds: 30,
            invalid_message_policy: InvalidMessagePolicy::DeadLetter,
        }
    }
}

impl ConsumerConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }
}

/// Dead-letter destination settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeadLetterConfig {
    pub enabled: bool,
    pub topic: String,
}

impl Default for DeadLetterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            topic: "orders_dlq".to_string(),
        }
    }
}

impl OrderStreamConfig {
    /// Reject configurations the runtime cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(OrderError::configuration("database.url must not be empty"));
        }

        if self.database.max_connections == 0 {
            return Err(OrderError::configuration(
                "database.max_connections must be greater than 0",
            ));
        }

        if self.cache.cache_type == CacheType::Lru && self.cache.lru_capacity == 0 {
            return Err(OrderError::configuration(
                "cache.lru_capacity must be greater than 0 for the lru cache",
            ));
        }

        if self.consumer.topic.trim().is_empty() {
            return Err(OrderError::configuration("consumer.topic must not be empty"));
        }

        if self.consumer.max_retries == 0 {
            return Err(OrderError::configuration(
                "consumer.max_retries must be at least 1",
            ));
        }

        if self.dead_letter.enabled {
            if self.dead_letter.topic.trim().is_empty() {
                return Err(OrderError::configuration(
                    "dead_letter.topic must not be empty when dead-lettering is enabled",
                ));
            }
            if self.dead_letter.topic == self.consumer.topic {
                return Err(OrderError::configuration(
                    "dead_letter.topic must differ from consumer.topic",
                ));
            }
        }

        Ok(())
    }
}

//! # Order Stream Error Types
//!
//! Structured error handling for the order pipeline using thiserror.
//!
//! Validation and not-found errors are user-facing and never retried.
//! Persistence errors are the only retryable class; the ingestion consumer
//! retries them up to its configured bound before dead-lettering.

use thiserror::Error;

/// Errors surfaced by the cache, service and ingestion layers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrderError {
    #[error("Decode error: {message}")]
    Decode { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Persistence error: {operation}: {message}")]
    Persistence { operation: String, message: String },

    #[error("Order not found: {order_uid}")]
    NotFound { order_uid: String },

    #[error("Dead letter delivery failed: {message}")]
    DeadLetterDelivery { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl OrderError {
    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a persistence error
    pub fn persistence(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Persistence {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(order_uid: impl Into<String>) -> Self {
        Self::NotFound {
            order_uid: order_uid.into(),
        }
    }

    /// Create a dead letter delivery error
    pub fn dead_letter_delivery(message: impl Into<String>) -> Self {
        Self::DeadLetterDelivery {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether the ingestion consumer should retry after this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence { .. })
    }

    /// Short, stable label used in logs and dead-letter reasons
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode { .. } => "decode",
            Self::Validation { .. } => "validation",
            Self::Persistence { .. } => "persistence",
            Self::NotFound { .. } => "not_found",
            Self::DeadLetterDelivery { .. } => "dead_letter_delivery",
            Self::Configuration { .. } => "configuration",
        }
    }
}

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => OrderError::persistence("query", "No rows found"),
            sqlx::Error::Database(db_err) => OrderError::persistence("database", db_err.to_string()),
            sqlx::Error::PoolTimedOut => {
                OrderError::persistence("pool", "Timed out acquiring a connection")
            }
            sqlx::Error::PoolClosed => OrderError::persistence("pool", "Database pool is closed"),
            other => OrderError::persistence("connection", other.to_string()),
        }
    }
}

impl From<serde_json::Error> for OrderError {
    fn from(err: serde_json::Error) -> Self {
        OrderError::decode(err.to_string())
    }
}

impl From<config::ConfigError> for OrderError {
    fn from(err: config::ConfigError) -> Self {
        OrderError::configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OrderError>;

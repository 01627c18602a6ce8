//! # Messaging Error Types
//!
//! Transport-level failures raised by message sources and dead-letter sinks.
//! Processing failures for an individual order use [`crate::OrderError`].

use thiserror::Error;

use crate::error::OrderError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MessagingError {
    #[error("Database query error: {operation}: {message}")]
    DatabaseQuery { operation: String, message: String },

    #[error("Queue operation failed: {queue_name}: {operation}: {message}")]
    QueueOperation {
        queue_name: String,
        operation: String,
        message: String,
    },

    #[error("Source is not subscribed to any topic")]
    NotSubscribed,

    #[error("Channel closed: {queue_name}")]
    ChannelClosed { queue_name: String },

    #[error("Message serialization error: {message}")]
    MessageSerialization { message: String },

    #[error("Network timeout: operation {operation} timed out after {timeout_seconds}s")]
    Timeout {
        operation: String,
        timeout_seconds: u64,
    },

    #[error("Internal messaging error: {message}")]
    Internal { message: String },
}

impl MessagingError {
    /// Create a database query error
    pub fn database_query(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DatabaseQuery {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a queue operation error
    pub fn queue_operation(
        queue_name: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::QueueOperation {
            queue_name: queue_name.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a channel closed error
    pub fn channel_closed(queue_name: impl Into<String>) -> Self {
        Self::ChannelClosed {
            queue_name: queue_name.into(),
        }
    }

    /// Create a message serialization error
    pub fn message_serialization(message: impl Into<String>) -> Self {
        Self::MessageSerialization {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for MessagingError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                MessagingError::database_query("database", db_err.to_string())
            }
            sqlx::Error::PoolTimedOut => MessagingError::Timeout {
                operation: "database_pool".to_string(),
                timeout_seconds: 30,
            },
            other => MessagingError::database_query("connection", other.to_string()),
        }
    }
}

impl From<serde_json::Error> for MessagingError {
    fn from(err: serde_json::Error) -> Self {
        MessagingError::message_serialization(err.to_string())
    }
}

impl From<MessagingError> for OrderError {
    fn from(err: MessagingError) -> Self {
        OrderError::dead_letter_delivery(err.to_string())
    }
}

pub type MessagingResult<T> = Result<T, MessagingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MessagingError::queue_operation("orders", "read", "relation does not exist");
        assert_eq!(
            err.to_string(),
            "Queue operation failed: orders: read: relation does not exist"
        );
        assert_eq!(
            MessagingError::channel_closed("orders_dlq").to_string(),
            "Channel closed: orders_dlq"
        );
    }

    #[test]
    fn test_conversions() {
        let err: MessagingError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, MessagingError::Timeout { .. }));

        let order_err: OrderError = MessagingError::NotSubscribed.into();
        assert!(matches!(order_err, OrderError::DeadLetterDelivery { .. }));
    }
}

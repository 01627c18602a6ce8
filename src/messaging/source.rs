//! Transport contracts consumed by the ingestion consumer.

use async_trait::async_trait;
use std::time::Duration;

use super::errors::MessagingResult;
use super::message::{MessageEnvelope, MessageHeader};

/// Inbound message transport
#[async_trait]
pub trait MessageSource: Send + Sync + std::fmt::Debug {
    /// Start receiving from `topic`
    async fn subscribe(&self, topic: &str) -> MessagingResult<()>;

    /// Wait up to `timeout` for one message; `Ok(None)` when none arrived
    async fn poll_once(&self, timeout: Duration) -> MessagingResult<Option<MessageEnvelope>>;

    /// Mark the message as fully handled so it is not delivered again
    async fn ack(&self, envelope: &MessageEnvelope) -> MessagingResult<()>;
}

/// Destination for messages that could not be processed
#[async_trait]
pub trait DeadLetterSink: Send + Sync + std::fmt::Debug {
    /// Forward the original payload and headers unchanged
    async fn send(&self, payload: &[u8], headers: &[MessageHeader]) -> MessagingResult<()>;

    /// Wait until previously sent messages are durable
    async fn flush(&self) -> MessagingResult<()>;
}

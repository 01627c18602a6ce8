//! # In-process Transports
//!
//! `tokio::sync::mpsc` backed source and dead-letter sink, for embedding the
//! consumer behind another producer and for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use super::errors::{MessagingError, MessagingResult};
use super::message::{MessageEnvelope, MessageHeader};
use super::source::{DeadLetterSink, MessageSource};

/// Producer half of [`channel_source`]
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    topic: String,
    sender: mpsc::Sender<MessageEnvelope>,
}

impl ChannelPublisher {
    /// Publish a payload with no headers; returns the assigned message id
    pub async fn publish(&self, payload: impl Into<Vec<u8>>) -> MessagingResult<String> {
        self.publish_envelope(MessageEnvelope::new(&self.topic, payload))
            .await
    }

    pub async fn publish_envelope(&self, envelope: MessageEnvelope) -> MessagingResult<String> {
        let id = envelope.id.clone();
        self.sender
            .send(envelope)
            .await
            .map_err(|_| MessagingError::channel_closed(&self.topic))?;
        Ok(id)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Consumer half of [`channel_source`]
#[derive(Debug)]
pub struct ChannelMessageSource {
    topic: String,
    receiver: tokio::sync::Mutex<mpsc::Receiver<MessageEnvelope>>,
    subscribed: AtomicBool,
    acknowledged: Mutex<Vec<String>>,
}

/// Bounded in-process topic
pub fn channel_source(
    topic: impl Into<String>,
    capacity: usize,
) -> (ChannelPublisher, ChannelMessageSource) {
    let topic = topic.into();
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (
        ChannelPublisher {
            topic: topic.clone(),
            sender,
        },
        ChannelMessageSource {
            topic,
            receiver: tokio::sync::Mutex::new(receiver),
            subscribed: AtomicBool::new(false),
            acknowledged: Mutex::new(Vec::new()),
        },
    )
}

impl ChannelMessageSource {
    /// Ids of acknowledged messages, in acknowledgement order
    pub fn acknowledged(&self) -> Vec<String> {
        self.acknowledged.lock().clone()
    }
}

#[async_trait]
impl MessageSource for ChannelMessageSource {
    async fn subscribe(&self, topic: &str) -> MessagingResult<()> {
        if topic != self.topic {
            return Err(MessagingError::queue_operation(
                topic,
                "subscribe",
                format!("channel carries topic {}", self.topic),
            ));
        }
        self.subscribed.store(true, Ordering::SeqCst);
        debug!(topic = %topic, "Subscribed to channel source");
        Ok(())
    }

    async fn poll_once(&self, timeout: Duration) -> MessagingResult<Option<MessageEnvelope>> {
        if !self.subscribed.load(Ordering::SeqCst) {
            return Err(MessagingError::NotSubscribed);
        }

        let mut receiver = self.receiver.lock().await;
        match tokio::time::timeout(timeout, receiver.recv()).await {
            Ok(Some(envelope)) => Ok(Some(envelope)),
            Ok(None) => Err(MessagingError::channel_closed(&self.topic)),
            Err(_elapsed) => Ok(None),
        }
    }

    async fn ack(&self, envelope: &MessageEnvelope) -> MessagingResult<()> {
        self.acknowledged.lock().push(envelope.id.clone());
        Ok(())
    }
}

/// A message as received by [`ChannelDeadLetterSink`]
#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetterRecord {
    pub payload: Vec<u8>,
    pub headers: Vec<MessageHeader>,
    pub dead_lettered_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ChannelDeadLetterSink {
    topic: String,
    sender: mpsc::UnboundedSender<DeadLetterRecord>,
}

impl ChannelDeadLetterSink {
    /// Sink plus the receiver that observes every dead-lettered message
    pub fn new(topic: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<DeadLetterRecord>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                topic: topic.into(),
                sender,
            },
            receiver,
        )
    }
}

#[async_trait]
impl DeadLetterSink for ChannelDeadLetterSink {
    async fn send(&self, payload: &[u8], headers: &[MessageHeader]) -> MessagingResult<()> {
        let record = DeadLetterRecord {
            payload: payload.to_vec(),
            headers: headers.to_vec(),
            dead_lettered_at: Utc::now(),
        };
        self.sender
            .send(record)
            .map_err(|_| MessagingError::channel_closed(&self.topic))
    }

    async fn flush(&self) -> MessagingResult<()> {
        Ok(())
    }
}

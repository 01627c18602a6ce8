//! # Message Envelope
//!
//! Transport-neutral wrapper around one inbound message. The payload and
//! headers are kept exactly as delivered so they can be forwarded to the
//! dead-letter sink unmodified.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One key/value header; values are opaque bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    pub key: String,
    pub value: Vec<u8>,
}

impl MessageHeader {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Transport-assigned identifier, used for acknowledgement
    pub id: String,
    pub topic: String,
    pub payload: Vec<u8>,
    /// Headers in delivery order
    pub headers: Vec<MessageHeader>,
    /// How many times the transport has delivered this message, starting at 1
    pub delivery_count: u32,
    pub received_at: DateTime<Utc>,
}

impl MessageEnvelope {
    /// Envelope with a fresh random id and no headers
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            topic: topic.into(),
            payload: payload.into(),
            headers: Vec::new(),
            delivery_count: 1,
            received_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.push(MessageHeader::new(key, value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// First header named `key`
    pub fn header(&self, key: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|header| header.key == key)
            .map(|header| header.value.as_slice())
    }
}

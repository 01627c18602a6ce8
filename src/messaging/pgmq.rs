//! # pgmq Transports
//!
//! Source and dead-letter sink over PostgreSQL message queues, driven through
//! the `pgmq.*` SQL functions. A read message stays invisible for the
//! visibility timeout and reappears if it is not deleted, which is what gives
//! the consumer at-least-once delivery across crashes.
//!
//! Dead-lettered messages are stored as
//! `{"payload": <bytes>, "headers": [{"key", "value": <bytes>}], "dead_lettered_at"}`
//! where each `<bytes>` is `{"encoding": "utf8" | "base64", "data"}`. Valid
//! UTF-8 is kept readable; anything else is base64 so the original bytes
//! survive unchanged.
//!
//! Message headers come from the `headers` column of `pgmq.read`, which
//! requires pgmq 1.5 or newer.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::{debug, info};

use super::errors::{MessagingError, MessagingResult};
use super::message::{MessageEnvelope, MessageHeader};
use super::source::{DeadLetterSink, MessageSource};

/// Lossless JSON form of opaque bytes
fn encode_bytes(bytes: &[u8]) -> serde_json::Value {
    match std::str::from_utf8(bytes) {
        Ok(text) => json!({ "encoding": "utf8", "data": text }),
        Err(_) => json!({ "encoding": "base64", "data": STANDARD.encode(bytes) }),
    }
}

/// Map pgmq's jsonb header object onto envelope headers.
/// String values are taken as their text; other JSON values keep their JSON text.
fn envelope_headers(headers: Option<serde_json::Value>) -> MessagingResult<Vec<MessageHeader>> {
    let headers = match headers {
        None | Some(serde_json::Value::Null) => return Ok(Vec::new()),
        Some(headers) => headers,
    };
    let headers: serde_json::Map<String, serde_json::Value> = serde_json::from_value(headers)?;

    Ok(headers
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(text) => text.into_bytes(),
                other => other.to_string().into_bytes(),
            };
            MessageHeader::new(key, value)
        })
        .collect())
}

async fn create_queue(pool: &PgPool, queue_name: &str) -> MessagingResult<()> {
    sqlx::query("SELECT pgmq.create($1)")
        .bind(queue_name)
        .execute(pool)
        .await
        .map_err(|e| MessagingError::queue_operation(queue_name, "create", e.to_string()))?;
    Ok(())
}

#[derive(Debug)]
pub struct PgmqMessageSource {
    pool: PgPool,
    visibility_timeout_seconds: i32,
    queue_name: Mutex<Option<String>>,
}

impl PgmqMessageSource {
    pub fn new(pool: PgPool, visibility_timeout_seconds: u32) -> Self {
        Self {
            pool,
            visibility_timeout_seconds: i32::try_from(visibility_timeout_seconds)
                .unwrap_or(i32::MAX),
            queue_name: Mutex::new(None),
        }
    }

    fn queue_name(&self) -> MessagingResult<String> {
        self.queue_name
            .lock()
            .clone()
            .ok_or(MessagingError::NotSubscribed)
    }
}

#[async_trait]
impl MessageSource for PgmqMessageSource {
    async fn subscribe(&self, topic: &str) -> MessagingResult<()> {
        create_queue(&self.pool, topic).await?;
        *self.queue_name.lock() = Some(topic.to_string());
        info!(queue = %topic, "Subscribed to pgmq queue");
        Ok(())
    }

    async fn poll_once(&self, timeout: Duration) -> MessagingResult<Option<MessageEnvelope>> {
        let queue_name = self.queue_name()?;

        let row = sqlx::query(
            "SELECT msg_id, read_ct, message::text AS body, headers FROM pgmq.read($1, $2, $3)",
        )
        .bind(&queue_name)
        .bind(self.visibility_timeout_seconds)
        .bind(1_i32)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| MessagingError::queue_operation(&queue_name, "read", e.to_string()))?;

        let Some(row) = row else {
            // pgmq.read does not block; wait out the poll interval here
            tokio::time::sleep(timeout).await;
            return Ok(None);
        };

        let msg_id: i64 = row.try_get("msg_id")?;
        let read_ct: i32 = row.try_get("read_ct")?;
        let body: Option<String> = row.try_get("body")?;
        let headers: Option<serde_json::Value> = row.try_get("headers")?;

        debug!(queue = %queue_name, msg_id = msg_id, read_ct = read_ct, "Read pgmq message");

        let mut envelope = MessageEnvelope::new(&queue_name, body.unwrap_or_default().into_bytes())
            .with_id(msg_id.to_string());
        envelope.headers = envelope_headers(headers)?;
        envelope.delivery_count = u32::try_from(read_ct).unwrap_or(1);
        Ok(Some(envelope))
    }

    async fn ack(&self, envelope: &MessageEnvelope) -> MessagingResult<()> {
        let queue_name = self.queue_name()?;
        let msg_id: i64 = envelope.id.parse().map_err(|_| {
            MessagingError::queue_operation(
                &queue_name,
                "delete",
                format!("invalid message id {}", envelope.id),
            )
        })?;

        sqlx::query("SELECT pgmq.delete($1, $2)")
            .bind(&queue_name)
            .bind(msg_id)
            .execute(&self.pool)
            .await
            .map_err(|e| MessagingError::queue_operation(&queue_name, "delete", e.to_string()))?;

        debug!(queue = %queue_name, msg_id = msg_id, "Acknowledged pgmq message");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PgmqDeadLetterSink {
    pool: PgPool,
    queue_name: String,
}

impl PgmqDeadLetterSink {
    /// Sink for `queue_name`, creating the queue if it does not exist
    pub async fn connect(pool: PgPool, queue_name: impl Into<String>) -> MessagingResult<Self> {
        let queue_name = queue_name.into();
        create_queue(&pool, &queue_name).await?;
        Ok(Self { pool, queue_name })
    }

    fn dead_letter_document(payload: &[u8], headers: &[MessageHeader]) -> serde_json::Value {
        let headers: Vec<serde_json::Value> = headers
            .iter()
            .map(|header| {
                json!({
                    "key": header.key,
                    "value": encode_bytes(&header.value),
                })
            })
            .collect();

        json!({
            "payload": encode_bytes(payload),
            "headers": headers,
            "dead_lettered_at": Utc::now().to_rfc3339(),
        })
    }
}

#[async_trait]
impl DeadLetterSink for PgmqDeadLetterSink {
    async fn send(&self, payload: &[u8], headers: &[MessageHeader]) -> MessagingResult<()> {
        let document = Self::dead_letter_document(payload, headers);

        let row = sqlx::query("SELECT pgmq.send($1, $2) AS msg_id")
            .bind(&self.queue_name)
            .bind(&document)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                MessagingError::queue_operation(&self.queue_name, "send", e.to_string())
            })?;

        let msg_id: i64 = row.try_get("msg_id")?;
        info!(queue = %self.queue_name, msg_id = msg_id, "Message dead-lettered");
        Ok(())
    }

    async fn flush(&self) -> MessagingResult<()> {
        // pgmq.send commits before returning
        Ok(())
    }
}

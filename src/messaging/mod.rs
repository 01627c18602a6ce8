//! # Messaging Module
//!
//! Inbound order messages and the ingestion consumer.
//!
//! Transports sit behind two traits, [`MessageSource`] and [`DeadLetterSink`].
//! In-process channel implementations are always available; the pgmq
//! implementations (PostgreSQL message queues) need the `postgres` feature.

pub mod channel;
pub mod consumer;
pub mod errors;
pub mod message;
#[cfg(feature = "postgres")]
pub mod pgmq;
pub mod retry;
pub mod source;

pub use channel::{
    channel_source, ChannelDeadLetterSink, ChannelMessageSource, ChannelPublisher,
    DeadLetterRecord,
};
pub use consumer::{ConsumerHandle, OrderConsumer, ProcessingOutcome};
pub use errors::{MessagingError, MessagingResult};
pub use message::{MessageEnvelope, MessageHeader};
#[cfg(feature = "postgres")]
pub use pgmq::{PgmqDeadLetterSink, PgmqMessageSource};
pub use retry::RetryPolicy;
pub use source::{DeadLetterSink, MessageSource};

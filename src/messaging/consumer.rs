//! # Order Consumer
//!
//! Background ingestion loop: poll one message, decode it, hand it to the
//! [`OrderService`], retry persistence failures with linear backoff and
//! dead-letter what cannot be processed.
//!
//! Messages are acknowledged only once they reach a final state (cached,
//! skipped, dead-lettered or dropped). A message abandoned because the
//! consumer was stopped mid-retry is left unacknowledged for redelivery.
//!
//! Stopping is cooperative. The stop signal is observed between polls and
//! during backoff sleeps; an in-flight `process_order` call always completes.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::errors::{MessagingError, MessagingResult};
use super::message::MessageEnvelope;
use super::retry::RetryPolicy;
use super::source::{DeadLetterSink, MessageSource};
use crate::config::{ConsumerConfig, InvalidMessagePolicy};
use crate::error::OrderError;
use crate::logging::{log_consumer_event, log_error};
use crate::models::Order;
use crate::services::{OrderMetrics, OrderService};

/// Final state of one polled message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingOutcome {
    /// Persisted and cached after `attempts` tries
    Acknowledged { attempts: u32 },
    /// Empty payload
    Skipped,
    /// Forwarded unchanged to the dead-letter sink
    DeadLettered { reason: String },
    /// Given up on without a dead-letter copy
    Dropped { reason: String },
    /// Stopped mid-retry; left unacknowledged
    Abandoned,
}

impl ProcessingOutcome {
    pub fn should_ack(&self) -> bool {
        !matches!(self, Self::Abandoned)
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Acknowledged { .. } => "acknowledged",
            Self::Skipped => "skipped",
            Self::DeadLettered { .. } => "dead_lettered",
            Self::Dropped { .. } => "dropped",
            Self::Abandoned => "abandoned",
        }
    }
}

#[derive(Debug)]
pub struct OrderConsumer {
    source: Arc<dyn MessageSource>,
    dead_letter: Option<Arc<dyn DeadLetterSink>>,
    service: OrderService,
    metrics: Arc<OrderMetrics>,
    topic: String,
    poll_timeout: Duration,
    retry: RetryPolicy,
    invalid_message_policy: InvalidMessagePolicy,
}

impl OrderConsumer {
    pub fn new(
        source: Arc<dyn MessageSource>,
        service: OrderService,
        config: &ConsumerConfig,
    ) -> Self {
        let metrics = service.metrics().clone();
        Self {
            source,
            dead_letter: None,
            service,
            metrics,
            topic: config.topic.clone(),
            poll_timeout: config.poll_timeout(),
            retry: RetryPolicy::from_config(config),
            invalid_message_policy: config.invalid_message_policy,
        }
    }

    pub fn with_dead_letter(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.dead_letter = Some(sink);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Spawn the consume loop on the current tokio runtime
    pub fn start(self) -> ConsumerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let join = tokio::spawn(async move { self.run(stop_rx).await });
        ConsumerHandle { stop_tx, join }
    }

    /// Subscribe and consume until `stop` turns true or its sender is dropped
    pub async fn run(&self, mut stop: watch::Receiver<bool>) -> MessagingResult<()> {
        self.source.subscribe(&self.topic).await?;
        log_consumer_event("started", &self.topic, None, None, None);

        loop {
            if *stop.borrow() {
                break;
            }

            let polled = tokio::select! {
                biased;
                _ = stopped(&mut stop) => break,
                polled = self.source.poll_once(self.poll_timeout) => polled,
            };

            match polled {
                Ok(Some(envelope)) => {
                    self.handle(envelope, &mut stop).await;
                }
                Ok(None) => {}
                Err(err) => {
                    log_error("consumer", "poll", &err.to_string(), Some(&self.topic));
                    if sleep_or_stop(self.poll_timeout, &mut stop).await {
                        break;
                    }
                }
            }
        }

        if let Some(sink) = &self.dead_letter {
            if let Err(err) = sink.flush().await {
                log_error("consumer", "dead_letter_flush", &err.to_string(), None);
            }
        }

        log_consumer_event("stopped", &self.topic, None, None, None);
        Ok(())
    }

    /// Process one message and acknowledge it if it reached a final state
    pub async fn handle(
        &self,
        envelope: MessageEnvelope,
        stop: &mut watch::Receiver<bool>,
    ) -> ProcessingOutcome {
        let outcome = self.process_message(&envelope, stop).await;

        if outcome.should_ack() {
            if let Err(err) = self.source.ack(&envelope).await {
                log_error("consumer", "ack", &err.to_string(), Some(&envelope.id));
            }
        }

        log_consumer_event(
            outcome.label(),
            &self.topic,
            Some(&envelope.id),
            None,
            match &outcome {
                ProcessingOutcome::DeadLettered { reason }
                | ProcessingOutcome::Dropped { reason } => Some(reason.as_str()),
                _ => None,
            },
        );
        outcome
    }

    /// Drive one message to its final state without acknowledging it
    #[instrument(skip(self, envelope, stop), fields(message_id = %envelope.id))]
    pub async fn process_message(
        &self,
        envelope: &MessageEnvelope,
        stop: &mut watch::Receiver<bool>,
    ) -> ProcessingOutcome {
        self.metrics.record_message_received();

        if envelope.is_empty() {
            debug!("Skipping empty message");
            self.metrics.record_message_skipped();
            return ProcessingOutcome::Skipped;
        }

        let order = match Order::from_slice(&envelope.payload) {
            Ok(order) => order,
            Err(err) => {
                return self
                    .reject_invalid(envelope, OrderError::decode(err.to_string()))
                    .await
            }
        };

        let mut attempt = 1;
        loop {
            match self.service.process_order(order.clone()).await {
                Ok(_) => return ProcessingOutcome::Acknowledged { attempts: attempt },
                Err(err) if !err.is_retryable() => {
                    return self.reject_invalid(envelope, err).await;
                }
                Err(err) => {
                    warn!(
                        order_uid = %order.order_uid,
                        attempt = attempt,
                        max_attempts = self.retry.max_attempts,
                        error = %err,
                        "Order processing attempt failed"
                    );

                    if !self.retry.should_retry(attempt) {
                        let reason = format!(
                            "{} after {attempt} attempts: {err}",
                            err.kind()
                        );
                        return self.dead_letter(envelope, reason).await;
                    }

                    self.metrics.record_retry();
                    if sleep_or_stop(self.retry.delay_for(attempt), stop).await {
                        info!(attempt = attempt, "Consumer stopped during backoff");
                        return ProcessingOutcome::Abandoned;
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn reject_invalid(&self, envelope: &MessageEnvelope, err: OrderError) -> ProcessingOutcome {
        let reason = err.to_string();
        match self.invalid_message_policy {
            InvalidMessagePolicy::DeadLetter => self.dead_letter(envelope, reason).await,
            InvalidMessagePolicy::Drop => {
                warn!(reason = %reason, "Dropping invalid message");
                ProcessingOutcome::Dropped { reason }
            }
        }
    }

    async fn dead_letter(&self, envelope: &MessageEnvelope, reason: String) -> ProcessingOutcome {
        let Some(sink) = &self.dead_letter else {
            warn!(reason = %reason, "No dead-letter sink configured, dropping message");
            return ProcessingOutcome::Dropped { reason };
        };

        match sink.send(&envelope.payload, &envelope.headers).await {
            Ok(()) => {
                self.metrics.record_dead_lettered();
                ProcessingOutcome::DeadLettered { reason }
            }
            Err(err) => {
                self.metrics.record_dead_letter_failure();
                let delivery_error = OrderError::from(err);
                log_error(
                    "consumer",
                    "dead_letter",
                    &delivery_error.to_string(),
                    Some(&envelope.id),
                );
                ProcessingOutcome::Dropped {
                    reason: format!("{reason}; {delivery_error}"),
                }
            }
        }
    }
}

/// Handle to a consumer started with [`OrderConsumer::start`].
///
/// Dropping the handle also stops the consumer.
#[derive(Debug)]
pub struct ConsumerHandle {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<MessagingResult<()>>,
}

impl ConsumerHandle {
    /// Signal the consumer to stop and wait for it to exit
    pub async fn stop(self) -> MessagingResult<()> {
        let _ = self.stop_tx.send(true);
        self.join
            .await
            .map_err(|e| MessagingError::internal(format!("consumer task failed: {e}")))?
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Resolves once `stop` is true or its sender is gone
async fn stopped(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}

/// Sleep for `delay`; returns true if stopped first
async fn sleep_or_stop(delay: Duration, stop: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        biased;
        _ = stopped(stop) => true,
        _ = tokio::time::sleep(delay) => false,
    }
}

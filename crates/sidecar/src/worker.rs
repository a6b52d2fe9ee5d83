//! The sidecar's per-delivery loop (C7, §4.7): poll the broker, call the
//! runtime over the C1 socket for each message, route the response, and
//! ack/nack the original delivery.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{error, info, warn};
use transit_core::{Envelope, ErrorDetails, ErrorEnvelope, ErrorKind, ResponseItem};
use transit_queue::{QueueConsumer, QueueMessage, QueuePublisher};
use transit_router::{RouteTable, RouterDecision};
use transit_terminal::Terminals;

use crate::classify::{connection_failure, disposition, reclassify_oom, timeout_failure, Disposition};
use crate::client::{call_runtime, RuntimeCallError};
use crate::health::Counters;

pub struct Worker {
    pub socket_path: String,
    pub chunk_size: usize,
    pub request_timeout: Duration,
    pub max_delivery_attempts: u32,
    pub route_table: RouteTable,
    pub terminals: Terminals,
    pub consumer: Box<dyn QueueConsumer>,
    pub publisher: Box<dyn QueuePublisher>,
    pub counters: Arc<Counters>,
    /// Where a message goes when the error-terminal itself cannot accept it
    /// (missing `job_id`, unparseable `original_message`) — §4.6 "routed to
    /// the configured dead-letter queue name rather than silently dropped".
    pub dlq_queue: String,
}

impl Worker {
    /// Poll once and process every message in the returned batch. Returns the
    /// number of messages handled, so the caller can back off when the
    /// queue is empty.
    pub async fn run_once(&self, prefetch: u32) -> usize {
        let batch = match self.consumer.poll_batch(prefetch).await {
            Ok(batch) => batch,
            Err(e) => {
                error!(error = %e, "poll_batch failed");
                return 0;
            }
        };

        for msg in &batch {
            self.counters.delivered.fetch_add(1, Ordering::Relaxed);
            let ack = self.process_one(msg).await;
            let outcome = if ack { self.consumer.ack(&msg.receipt_handle).await } else { self.consumer.nack(&msg.receipt_handle).await };
            if let Err(e) = outcome {
                warn!(message_id = %msg.id, error = %e, "failed to ack/nack delivery");
            }
        }

        batch.len()
    }

    /// Returns `true` if the delivery is fully handled and should be acked,
    /// `false` if it should be nacked back onto the queue for retry.
    async fn process_one(&self, msg: &QueueMessage) -> bool {
        let envelope: Envelope = match serde_json::from_str(&msg.body) {
            Ok(e) => e,
            Err(e) => {
                // A malformed queue message carries no recoverable route, so
                // there's nothing to retry against — straight to the
                // error-terminal (§7 msg_parsing_error is fatal).
                let err = ErrorEnvelope {
                    error: ErrorKind::MsgParsingError,
                    details: Some(ErrorDetails {
                        message: e.to_string(),
                        r#type: None,
                        traceback: None,
                    }),
                    original_message: serde_json::from_str::<Value>(&msg.body)
                        .ok()
                        .or_else(|| Some(Value::String(msg.body.clone()))),
                };
                if let Err(e) = self.terminals.error(&err).await {
                    warn!(message_id = %msg.id, error = %e, "error-terminal rejected malformed delivery");
                    self.dead_letter(&msg.body).await;
                }
                self.counters.terminalized.fetch_add(1, Ordering::Relaxed);
                return true;
            }
        };

        let request_body = serde_json::to_vec(&envelope).expect("envelope always serializes");
        let items: Vec<ResponseItem> = match call_runtime(
            &self.socket_path,
            &request_body,
            self.chunk_size,
            self.request_timeout,
        )
        .await
        {
            Ok(items) => reclassify_oom(items),
            Err(RuntimeCallError::Timeout(d)) => vec![ResponseItem::Failure(timeout_failure(&envelope, d))],
            Err(e) => vec![ResponseItem::Failure(connection_failure(&envelope, e.to_string()))],
        };

        // The router always terminalizes a single-error response (§4.5); the
        // severity/retry policy is applied here, before it ever sees one.
        if let [ResponseItem::Failure(err)] = items.as_slice() {
            if disposition(err.error, msg.attempt_count, self.max_delivery_attempts) == Disposition::Requeue {
                self.counters.requeued.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        }

        match self.route_table.decide(&envelope, items) {
            RouterDecision::Advance(publications) => {
                for publication in publications {
                    if publication.queue == self.route_table.happy_terminal_queue {
                        if let Err(e) = self.terminals.happy(&publication.envelope).await {
                            warn!(error = %e, "happy-terminal rejected advanced envelope");
                        }
                        self.counters.terminalized.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                    let body = serde_json::to_vec(&publication.envelope).expect("envelope always serializes");
                    if let Err(e) = self.publisher.publish(&publication.queue, &body).await {
                        error!(queue = %publication.queue, error = %e, "failed to publish to next step");
                        return false;
                    }
                }
                self.counters.succeeded.fetch_add(1, Ordering::Relaxed);
            }
            RouterDecision::HappyTerminal(publication) => {
                if let Err(e) = self.terminals.happy(&publication.envelope).await {
                    warn!(error = %e, "happy-terminal rejected unchanged envelope");
                }
                self.counters.terminalized.fetch_add(1, Ordering::Relaxed);
            }
            RouterDecision::ErrorTerminal(publication) => {
                if let Err(e) = self.terminals.error(&publication.error).await {
                    warn!(error = %e, "error-terminal rejected wrapped envelope");
                    let body = serde_json::to_vec(&publication.error).expect("error envelope always serializes");
                    self.dead_letter(&String::from_utf8_lossy(&body)).await;
                }
                self.counters.terminalized.fetch_add(1, Ordering::Relaxed);
            }
        }

        true
    }

    /// A message neither terminal handler could accept (no `job_id` to key
    /// persistence/notification on) is not silently dropped — it is moved to
    /// the broker-level dead-letter queue (§4.6) so an operator can inspect
    /// and replay it by hand.
    async fn dead_letter(&self, body: &str) {
        if let Err(e) = self.publisher.publish(&self.dlq_queue, body.as_bytes()).await {
            error!(queue = %self.dlq_queue, error = %e, "failed to publish to dead-letter queue");
        }
    }
}

/// The main per-sidecar loop: poll, process, repeat, until a shutdown signal
/// arrives. Idle polls (empty batch) sleep briefly rather than hammering the
/// broker — this mirrors this workspace's worker-runner backoff idiom.
pub async fn run(worker: Worker, prefetch: u32) {
    info!("sidecar entering poll loop");
    loop {
        let handled = worker.run_once(prefetch).await;
        if handled == 0 {
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }
}

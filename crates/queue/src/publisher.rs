//! Outbound publish side of the broker seam, mirroring [`crate::sqs::SqsConsumer`]
//! for the direction the consumer trait doesn't cover: handing a routed
//! envelope to the next step's queue (§4.5 "publication must use ...
//! publisher confirms").
//!
//! `queue` here is taken to be the destination's actual SQS queue URL — the
//! mapping from a step/queue name to that URL is a deployment concern (§1
//! out-of-scope), so callers are expected to configure queue names that are
//! already valid queue URLs.

use async_trait::async_trait;
use tracing::debug;

use crate::error::QueueError;

#[async_trait]
pub trait QueuePublisher: Send + Sync {
    /// Publish `body` to `queue`, returning only once the broker has
    /// confirmed receipt.
    async fn publish(&self, queue: &str, body: &[u8]) -> Result<(), QueueError>;
}

pub struct SqsPublisher {
    client: aws_sdk_sqs::Client,
}

impl SqsPublisher {
    pub fn new(client: aws_sdk_sqs::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QueuePublisher for SqsPublisher {
    async fn publish(&self, queue: &str, body: &[u8]) -> Result<(), QueueError> {
        let message_body = std::str::from_utf8(body)
            .map_err(|e| QueueError::Parse(format!("publish body is not UTF-8: {e}")))?;

        self.client
            .send_message()
            .queue_url(queue)
            .message_body(message_body)
            .send()
            .await
            .map_err(|e| QueueError::Provider(format!("SQS send failed: {e:?}")))?;

        debug!(queue, "published message");
        Ok(())
    }
}

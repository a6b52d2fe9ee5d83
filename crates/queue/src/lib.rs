pub mod config;
pub mod consumer;
pub mod error;
pub mod publisher;
pub mod sqs;

pub use config::{AwsConfig, QueueConfig};
pub use consumer::{QueueConsumer, QueueHealth, QueueMessage};
pub use error::QueueError;
pub use publisher::{QueuePublisher, SqsPublisher};
pub use sqs::SqsConsumer;

//! Broker-side configuration (C9 §6): the AWS/SQS connection details the
//! runtime-agnostic [`crate::error::QueueError`] plumbing needs. Kept local
//! to this crate rather than in `transit-core` since nothing outside the
//! broker seam cares about credentials or queue URLs.

use std::env;

/// Read an env var, falling back to `default` when unset or empty.
fn env_or(key: &str, default: &str) -> String {
    env::var(key).ok().filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

/// Credentials and endpoint for the SQS client itself.
#[derive(Debug, Clone)]
pub struct AwsConfig {
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    /// Explicit endpoint override (LocalStack / MinIO-style SQS emulation).
    pub endpoint_url: Option<String>,
}

impl AwsConfig {
    pub fn from_env() -> Self {
        Self {
            region: env_or("AWS_REGION", "us-east-1"),
            access_key_id: env_opt("AWS_ACCESS_KEY_ID"),
            secret_access_key: env_opt("AWS_SECRET_ACCESS_KEY"),
            session_token: env_opt("AWS_SESSION_TOKEN"),
            endpoint_url: env_opt("QUEUE_AWS_ENDPOINT_URL"),
        }
    }
}

/// Which queues this consumer talks to, and how long a received message
/// stays invisible to other consumers before redelivery.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub queue_url: String,
    pub dlq_url: Option<String>,
    pub visibility_timeout_secs: u32,
}

impl QueueConfig {
    pub fn from_env() -> Result<Self, String> {
        let queue_url = env::var("QUEUE_URL").map_err(|_| "QUEUE_URL is required".to_string())?;
        Ok(Self {
            queue_url,
            dlq_url: env_opt("DLQ_URL"),
            visibility_timeout_secs: env_or("QUEUE_VISIBILITY_TIMEOUT_SECS", "30")
                .parse()
                .map_err(|_| "QUEUE_VISIBILITY_TIMEOUT_SECS must be a u32".to_string())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aws_config_defaults_region_when_unset() {
        env::remove_var("AWS_REGION");
        assert_eq!(AwsConfig::from_env().region, "us-east-1");
    }
}

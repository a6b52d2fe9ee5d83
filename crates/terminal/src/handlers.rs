//! Terminal handlers (C6): happy-terminal and error-terminal (§4.6).

use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;
use transit_core::{Envelope, ErrorEnvelope, TerminalConfig};

use crate::error::TerminalError;
use crate::gateway::GatewayClient;
use crate::key::{last_step, object_key};
use crate::storage::{build_store, put_json, StorageError};

pub struct Terminals {
    config: TerminalConfig,
    store: Option<Box<dyn object_store::ObjectStore>>,
    gateway: Option<GatewayClient>,
}

impl Terminals {
    pub fn new(config: TerminalConfig) -> Result<Self, StorageError> {
        let store = build_store(&config)?;
        let gateway = config.gateway_url.clone().map(GatewayClient::new);
        Ok(Self { config, store, gateway })
    }

    /// Happy-terminal (§4.6): persist the final result and notify the
    /// gateway of success. Always returns an empty response to the sidecar
    /// (fully consumed, no further routing) — modeled here by the `Ok(())`
    /// return carrying no data for the caller to route further.
    pub async fn happy(&self, envelope: &Envelope) -> Result<(), TerminalError> {
        let job_id = envelope.job_id.clone().ok_or(TerminalError::MissingJobId)?;
        let last = last_step(&envelope.route);
        let now = Utc::now();

        let storage_location = self
            .persist(&self.config.s3_results_prefix, &now, &last, &job_id, |_| {
                json!({
                    "job_id": job_id,
                    "route_steps": envelope.route.steps,
                    "last_step": last,
                    "timestamp": now,
                    "status": "succeeded",
                    "result": envelope.payload,
                })
            })
            .await;

        if let Some(gateway) = &self.gateway {
            let body = json!({
                "job_id": job_id,
                "status": "succeeded",
                "progress": 1.0,
                "result": envelope.payload,
                "metadata": storage_location,
                "timestamp": now,
            });
            gateway.notify_final(&job_id, &body).await;
        }

        Ok(())
    }

    /// Error-terminal (§4.6): recover the original message, persist an error
    /// document, and notify the gateway of failure.
    pub async fn error(&self, wrapper: &ErrorEnvelope) -> Result<(), TerminalError> {
        let original = parse_original_message(wrapper.original_message.as_ref())
            .ok_or(TerminalError::MissingOriginalMessage)?;

        let job_id = original
            .get("job_id")
            .and_then(Value::as_str)
            .ok_or(TerminalError::MissingJobId)?
            .to_string();

        let description = wrapper
            .details
            .as_ref()
            .map(|d| d.message.clone())
            .unwrap_or_else(|| "unknown error".to_string());

        let route_steps: Vec<String> = original
            .get("route")
            .and_then(|r| r.get("steps"))
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();
        let current = original
            .get("route")
            .and_then(|r| r.get("current"))
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;
        let route = transit_core::Route { steps: route_steps, current, metadata: None };
        let last = last_step(&route);
        let now = Utc::now();
        let payload = original.get("payload").cloned().unwrap_or(Value::Null);

        let storage_location = self
            .persist(&self.config.s3_errors_prefix, &now, &last, &job_id, |_| {
                json!({
                    "job_id": job_id,
                    "route_steps": route.steps,
                    "last_step": last,
                    "timestamp": now,
                    "status": "failed",
                    "error": description,
                    "payload": payload,
                })
            })
            .await;

        if let Some(gateway) = &self.gateway {
            let body = json!({
                "job_id": job_id,
                "status": "failed",
                "progress": Value::Null,
                "error": description,
                "metadata": storage_location,
                "timestamp": now,
            });
            gateway.notify_final(&job_id, &body).await;
        }

        Ok(())
    }

    async fn persist(
        &self,
        prefix: &str,
        now: &chrono::DateTime<Utc>,
        last: &str,
        job_id: &str,
        build_doc: impl FnOnce(&str) -> Value,
    ) -> Value {
        let Some(store) = &self.store else {
            return json!({});
        };
        let Some(bucket) = &self.config.s3_bucket else {
            return json!({});
        };

        let key = object_key(prefix, *now, last, job_id);
        let doc = build_doc(&key);
        match put_json(store.as_ref(), bucket, &key, &doc).await {
            Ok(()) => json!({
                "s3_bucket": bucket,
                "s3_key": key,
                "s3_uri": format!("s3://{}/{}", bucket, key),
            }),
            Err(e) => {
                warn!(job_id, error = %e, "failed to persist terminal document");
                json!({ "error": e.to_string() })
            }
        }
    }
}

/// Recover the original envelope from an error wrapper's `original_message`,
/// which may be a parsed JSON object or a JSON-encoded string nested inside
/// it (§10 "error-message parsing fallback").
fn parse_original_message(value: Option<&Value>) -> Option<Value> {
    match value {
        Some(Value::String(s)) => serde_json::from_str(s).ok(),
        Some(v @ Value::Object(_)) => Some(v.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_original_message_from_object() {
        let v = json!({"job_id": "job-1", "payload": {}});
        assert_eq!(parse_original_message(Some(&v)), Some(v));
    }

    #[test]
    fn parses_original_message_from_nested_string() {
        let nested = json!({"job_id": "job-2"}).to_string();
        let v = Value::String(nested);
        let parsed = parse_original_message(Some(&v)).unwrap();
        assert_eq!(parsed["job_id"], "job-2");
    }

    #[test]
    fn missing_original_message_is_none() {
        assert_eq!(parse_original_message(None), None);
    }

    #[tokio::test]
    async fn happy_terminal_requires_job_id() {
        let terminals = Terminals::new(TerminalConfig {
            gateway_url: None,
            s3_bucket: None,
            s3_endpoint: None,
            s3_access_key: None,
            s3_secret_key: None,
            s3_region: "us-east-1".into(),
            s3_results_prefix: "asya-results/".into(),
            s3_errors_prefix: "asya-errors/".into(),
        })
        .unwrap();

        let envelope = Envelope {
            payload: Value::Null,
            route: transit_core::Route { steps: vec!["a".into()], current: 0, metadata: None },
            job_id: None,
        };
        let err = terminals.happy(&envelope).await.unwrap_err();
        assert!(matches!(err, TerminalError::MissingJobId));
    }

    #[tokio::test]
    async fn happy_terminal_is_noop_without_configured_clients() {
        let terminals = Terminals::new(TerminalConfig {
            gateway_url: None,
            s3_bucket: None,
            s3_endpoint: None,
            s3_access_key: None,
            s3_secret_key: None,
            s3_region: "us-east-1".into(),
            s3_results_prefix: "asya-results/".into(),
            s3_errors_prefix: "asya-errors/".into(),
        })
        .unwrap();

        let envelope = Envelope {
            payload: json!({"done": true}),
            route: transit_core::Route { steps: vec!["a".into()], current: 0, metadata: None },
            job_id: Some("job-3".into()),
        };
        terminals.happy(&envelope).await.unwrap();
    }
}

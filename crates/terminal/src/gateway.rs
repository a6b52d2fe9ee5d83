//! Gateway notification client (§4.6 step 4, §6): best-effort POST to
//! `<gateway>/jobs/<job_id>/final`, grounded on this workspace's webhook
//! notifier pattern (resolved URL, bounded timeout, never retried here).

use std::time::Duration;

use serde_json::Value;
use tracing::warn;

const GATEWAY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct GatewayClient {
    base_url: String,
    client: reqwest::Client,
}

impl GatewayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::builder()
                .timeout(GATEWAY_TIMEOUT)
                .build()
                .expect("reqwest client builds with static config"),
        }
    }

    /// POST the final-status body. Non-2xx responses and timeouts are
    /// logged and swallowed (§4.6: "report best-effort"); the caller never
    /// sees this as a reason to fail the terminal handler.
    pub async fn notify_final(&self, job_id: &str, body: &Value) -> bool {
        let url = format!("{}/jobs/{}/final", self.base_url.trim_end_matches('/'), job_id);
        match self.client.post(&url).json(body).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!(job_id, status = %resp.status(), "gateway rejected final notification");
                false
            }
            Err(e) => {
                warn!(job_id, error = %e, "gateway notification failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_join_trims_trailing_slash() {
        let client = GatewayClient::new("http://gateway.local/");
        assert_eq!(
            format!("{}/jobs/{}/final", client.base_url.trim_end_matches('/'), "job-1"),
            "http://gateway.local/jobs/job-1/final"
        );
    }
}

//! Minimal observability surface (C10, §9): a `/healthz` liveness probe and a
//! `/metrics` counter snapshot, scoped down from this workspace's ring-buffer
//! metrics exporter to the handful of numbers an operator needs to see a
//! sidecar is alive and making progress.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

#[derive(Default)]
pub struct Counters {
    pub delivered: AtomicU64,
    pub succeeded: AtomicU64,
    pub requeued: AtomicU64,
    pub terminalized: AtomicU64,
}

impl Counters {
    pub fn snapshot(&self) -> serde_json::Value {
        json!({
            "delivered": self.delivered.load(Ordering::Relaxed),
            "succeeded": self.succeeded.load(Ordering::Relaxed),
            "requeued": self.requeued.load(Ordering::Relaxed),
            "terminalized": self.terminalized.load(Ordering::Relaxed),
        })
    }
}

pub fn router(counters: Arc<Counters>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .with_state(counters)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn metrics(State(counters): State<Arc<Counters>>) -> Json<serde_json::Value> {
    Json(counters.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reports_zero_initially() {
        let counters = Counters::default();
        assert_eq!(counters.snapshot()["delivered"], 0);
    }

    #[test]
    fn snapshot_reflects_increments() {
        let counters = Counters::default();
        counters.delivered.fetch_add(5, Ordering::Relaxed);
        counters.succeeded.fetch_add(3, Ordering::Relaxed);
        let snap = counters.snapshot();
        assert_eq!(snap["delivered"], 5);
        assert_eq!(snap["succeeded"], 3);
    }
}

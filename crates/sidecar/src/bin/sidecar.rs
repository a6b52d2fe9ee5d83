//! transit-sidecar — the broker-to-runtime bridge for one pipeline step (C7).
//!
//! Polls its inbound queue, forwards each delivery to the local
//! `transit-runtime` process over its Unix socket, routes the response (C5),
//! and runs the terminal handlers (C6) when a response lands on a terminal
//! queue.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use transit_core::SidecarConfig;
use transit_queue::{AwsConfig, QueueConfig, SqsConsumer, SqsPublisher};
use transit_router::RouteTable;
use transit_runtime::supervision::wait_for_shutdown_signal;
use transit_sidecar::health::{self, Counters};
use transit_sidecar::worker::{run, Worker};
use transit_terminal::Terminals;

#[tokio::main]
async fn main() -> ExitCode {
    transit_core::config::load_dotenv();

    let config = match SidecarConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("transit-sidecar: invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.log_level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(config = %config.redacted_summary(), "transit-sidecar starting");

    let queue_config = match QueueConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("transit-sidecar: invalid queue configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    let aws_config = AwsConfig::from_env();

    let consumer = match SqsConsumer::new(&aws_config, &queue_config).await {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to initialize SQS consumer");
            return ExitCode::FAILURE;
        }
    };
    let publisher = SqsPublisher::new(consumer.client());

    let terminals = match Terminals::new(config.terminal.clone()) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "failed to initialize terminal handlers");
            return ExitCode::FAILURE;
        }
    };

    let route_table = RouteTable {
        happy_terminal_queue: config.happy_terminal_queue.clone(),
        error_terminal_queue: config.error_terminal_queue.clone(),
    };

    let counters = Arc::new(Counters::default());

    let worker = Worker {
        socket_path: config.socket_path.clone(),
        chunk_size: 65536,
        request_timeout: Duration::from_secs(config.request_timeout_secs),
        max_delivery_attempts: config.max_delivery_attempts,
        route_table,
        terminals,
        consumer: Box::new(consumer),
        publisher: Box::new(publisher),
        counters: counters.clone(),
        dlq_queue: config.dlq_name.clone(),
    };

    let health_server = config.metrics_port.map(|port| {
        let app = health::router(counters.clone());
        tokio::spawn(async move {
            let addr = format!("0.0.0.0:{port}");
            match tokio::net::TcpListener::bind(&addr).await {
                Ok(listener) => {
                    info!(%addr, "health/metrics surface listening");
                    if let Err(e) = axum::serve(listener, app).await {
                        error!(error = %e, "health/metrics server exited");
                    }
                }
                Err(e) => error!(%addr, error = %e, "failed to bind health/metrics listener"),
            }
        })
    });

    tokio::select! {
        _ = run(worker, config.prefetch) => {}
        _ = wait_for_shutdown_signal() => {
            info!("shutdown signal received, draining in-flight work");
        }
    }

    if let Some(handle) = health_server {
        handle.abort();
    }

    info!("transit-sidecar exited cleanly");
    ExitCode::SUCCESS
}

//! transit-runtime — the per-step IPC server (C4).
//!
//! Loads one handler from the registry (C3), binds a Unix socket (C8), and
//! serves exactly one request per accepted connection until a shutdown
//! signal arrives.

use std::process::ExitCode;

use tracing::{error, info};
use transit_core::RuntimeConfig;
use transit_runtime::supervision::{bind_socket, unlink_socket, wait_for_shutdown_signal};
use transit_runtime::{Registry, RequestContext};

#[tokio::main]
async fn main() -> ExitCode {
    transit_core::config::load_dotenv();

    let config = match RuntimeConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            // Fatal startup error (§4.3): refuse to start, never open the socket.
            eprintln!("transit-runtime: invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.log_level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(config = %config.redacted_summary(), "transit-runtime starting");

    let registry = Registry::with_builtins();
    let entry = match registry.resolve(&config.handler) {
        Ok(entry) => entry,
        Err(e) => {
            error!(handler = %config.handler, error = %e, "handler not resolvable, refusing to start");
            return ExitCode::FAILURE;
        }
    };

    let listener = match bind_socket(&config.socket_path, config.socket_chmod) {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, "failed to bind socket");
            return ExitCode::FAILURE;
        }
    };

    let ctx = RequestContext {
        entry,
        calling_convention: config.calling_convention(),
        enable_validation: config.enable_validation,
    };

    info!(socket_path = %config.socket_path, "accepting connections");

    let accept_loop = async {
        loop {
            match listener.accept().await {
                Ok((mut stream, _addr)) => {
                    transit_runtime::serve_one(&mut stream, &ctx, config.chunk_size).await;
                }
                Err(e) => {
                    error!(error = %e, "accept failed");
                }
            }
        }
    };

    tokio::select! {
        _ = accept_loop => {}
        _ = wait_for_shutdown_signal() => {
            info!("shutdown signal received, closing listener");
        }
    }

    drop(listener);
    unlink_socket(&config.socket_path);
    info!("transit-runtime exited cleanly");
    ExitCode::SUCCESS
}

//! Supervision (C8): Unix socket lifecycle and signal-driven teardown.
//!
//! Grounded on the reference implementation's `_setup_socket`/`_cleanup`
//! pair and on this workspace's worker-supervision idiom (signal-wait task +
//! graceful-shutdown notify), adapted to a single-listener process instead
//! of a broker-subscribing worker.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::net::UnixListener;
use tracing::{info, warn};

/// Bind the runtime's listening socket, removing any stale file left over
/// from a previous (crashed) run and optionally `chmod`-ing it.
pub fn bind_socket(path: &str, chmod: Option<u32>) -> Result<UnixListener> {
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating socket directory {}", parent.display()))?;
    }
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("removing stale socket file {}", path.display()))?;
    }

    let listener = UnixListener::bind(path)
        .with_context(|| format!("binding unix socket at {}", path.display()))?;

    if let Some(mode) = chmod {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .with_context(|| format!("chmod {:o} on {}", mode, path.display()))?;
    }

    info!(path = %path.display(), chmod = ?chmod, "runtime socket bound");
    Ok(listener)
}

/// Remove the socket file on teardown. Best-effort: a missing file is not
/// an error (another signal handler or a restart may have already cleaned
/// it up).
pub fn unlink_socket(path: &str) {
    let path = PathBuf::from(path);
    match std::fs::remove_file(&path) {
        Ok(()) => info!(path = %path.display(), "runtime socket unlinked"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to unlink socket"),
    }
}

/// Wait for SIGINT or SIGTERM (falling back to `ctrl_c` on non-Unix targets).
/// Resolves once a shutdown signal arrives; the caller is then responsible
/// for closing the listener and unlinking the socket.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt()).expect("installing SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("installing SIGTERM handler");

    tokio::select! {
        _ = sigint.recv() => info!("received SIGINT"),
        _ = sigterm.recv() => info!("received SIGTERM"),
    }
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("received ctrl-c");
}

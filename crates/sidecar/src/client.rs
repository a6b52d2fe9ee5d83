//! Client side of the C1 framing protocol: dial the runtime's Unix socket,
//! send one framed request, read one framed response, tearing the
//! connection down afterwards (the runtime only ever serves one request per
//! accepted connection, so the sidecar opens a fresh one per delivery).

use std::time::Duration;

use thiserror::Error;
use tokio::net::UnixStream;
use transit_codec::{read_frame, write_frame, FrameError};
use transit_core::ResponseItem;

#[derive(Debug, Error)]
pub enum RuntimeCallError {
    #[error("connecting to runtime socket at {path}: {source}")]
    Connect { path: String, source: std::io::Error },
    #[error("framing error talking to runtime: {0}")]
    Frame(#[from] FrameError),
    #[error("runtime response was not valid JSON: {0}")]
    Decode(String),
    #[error("runtime did not respond within {0:?}")]
    Timeout(Duration),
}

/// Send one request envelope to the runtime at `socket_path` and return its
/// decoded response array. Bounded by `timeout` (§4.7): a runtime that never
/// replies — stuck handler, deadlocked process — is reported distinctly from
/// an I/O-level connection failure so the caller can synthesize a
/// `timeout_error` rather than a `connection_error`.
pub async fn call_runtime(
    socket_path: &str,
    request_body: &[u8],
    chunk_size: usize,
    timeout: Duration,
) -> Result<Vec<ResponseItem>, RuntimeCallError> {
    tokio::time::timeout(timeout, call_runtime_inner(socket_path, request_body, chunk_size))
        .await
        .map_err(|_| RuntimeCallError::Timeout(timeout))?
}

async fn call_runtime_inner(
    socket_path: &str,
    request_body: &[u8],
    chunk_size: usize,
) -> Result<Vec<ResponseItem>, RuntimeCallError> {
    let mut stream =
        UnixStream::connect(socket_path).await.map_err(|source| RuntimeCallError::Connect {
            path: socket_path.to_string(),
            source,
        })?;

    write_frame(&mut stream, request_body).await?;
    let response_body = read_frame(&mut stream, chunk_size).await?;

    serde_json::from_slice(&response_body).map_err(|e| RuntimeCallError::Decode(e.to_string()))
}

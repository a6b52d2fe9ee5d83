//! Length-prefixed frame codec (C1): `uint32_be length || body_bytes` over
//! any async byte stream. Used for both the runtime's Unix socket and, in
//! tests, an in-memory duplex pipe.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum frame body length: the wire format's 4-byte length prefix caps a
/// single frame at `u32::MAX` bytes (§3, §4.1).
pub const MAX_FRAME_LEN: u32 = u32::MAX;

/// Default chunked-read size (§4.1); overridden by `CHUNK_SIZE` at the
/// runtime-config layer.
pub const DEFAULT_CHUNK_SIZE: usize = 65536;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("connection closed while reading frame")]
    ConnectionClosed,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame body exceeds {MAX_FRAME_LEN} bytes")]
    TooLarge,
}

/// Write one frame: big-endian `u32` length prefix followed by `body`.
///
/// A single `write_all` call per field keeps the two writes adjacent on the
/// wire; callers needing atomicity under concurrent writers must serialise
/// access to the stream themselves (the runtime server only ever has one
/// connection at a time, so this is not contended in practice).
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    body: &[u8],
) -> Result<(), FrameError> {
    if body.len() as u64 > MAX_FRAME_LEN as u64 {
        return Err(FrameError::TooLarge);
    }
    let len = body.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame: 4-byte big-endian length, then exactly that many bytes,
/// read in bounded chunks up to `chunk_size`.
///
/// Any short read (stream closed mid-frame) is reported as
/// [`FrameError::ConnectionClosed`], which the caller maps to the wire
/// `connection_error` kind (§7).
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    chunk_size: usize,
) -> Result<Vec<u8>, FrameError> {
    let mut len_buf = [0u8; 4];
    read_exact_or_closed(reader, &mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;

    let mut body = vec![0u8; len];
    let mut read = 0;
    while read < len {
        let end = (read + chunk_size).min(len);
        read_exact_or_closed(reader, &mut body[read..end]).await?;
        read = end;
    }
    Ok(body)
}

async fn read_exact_or_closed<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
) -> Result<(), FrameError> {
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(FrameError::ConnectionClosed)
        }
        Err(e) => Err(FrameError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn round_trip_small_body() {
        let (mut a, mut b) = duplex(1024);
        write_frame(&mut a, b"hello").await.unwrap();
        let body = read_frame(&mut b, DEFAULT_CHUNK_SIZE).await.unwrap();
        assert_eq!(body, b"hello");
    }

    #[tokio::test]
    async fn round_trip_empty_body() {
        let (mut a, mut b) = duplex(1024);
        write_frame(&mut a, b"").await.unwrap();
        let body = read_frame(&mut b, DEFAULT_CHUNK_SIZE).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn round_trip_across_small_chunk_boundaries() {
        let (mut a, mut b) = duplex(4096);
        let payload = vec![7u8; 10_000];
        write_frame(&mut a, &payload).await.unwrap();
        let body = read_frame(&mut b, 97).await.unwrap();
        assert_eq!(body, payload);
    }

    #[tokio::test]
    async fn closed_stream_mid_frame_is_connection_error() {
        let (a, mut b) = duplex(1024);
        drop(a);
        let err = read_frame(&mut b, DEFAULT_CHUNK_SIZE).await.unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[tokio::test]
    async fn partial_frame_then_close_is_connection_error() {
        let (mut a, mut b) = duplex(1024);
        // Write only the length prefix, then drop the writer before the body arrives.
        a.write_all(&10u32.to_be_bytes()).await.unwrap();
        drop(a);
        let err = read_frame(&mut b, DEFAULT_CHUNK_SIZE).await.unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }
}

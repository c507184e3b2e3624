//! Point-to-point transport between the coordinator and workers
//!
//! A [`Channel`] carries exactly two kinds of payload over a byte stream:
//!
//! ```text
//! [4 bytes: u32 little-endian]                 integer (file count, prefix, ...)
//! [4 bytes: length N][N bytes: raw payload]    frame
//! ```
//!
//! A frame with `N == 0` has no body at all. Every call completes only once the
//! peer has produced (or accepted) the bytes involved, so program order on both
//! ends is the protocol. Channels never time out.
//!
//! `Channel` is generic over the stream so the same code runs on
//! `tokio::net::TcpStream` in production and `tokio::io::DuplexStream` in tests.

use crate::error::{Result, TallyError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default ceiling for a single frame (256 MiB)
pub const DEFAULT_MAX_PAYLOAD: usize = 256 * 1024 * 1024;

/// One end of a point-to-point link
#[derive(Debug)]
pub struct Channel<S> {
    stream: S,

    /// Rank of the process at the other end
    peer: usize,

    /// Largest frame this end accepts
    max_payload: usize,
}

impl<S> Channel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, peer: usize) -> Self {
        Self {
            stream,
            peer,
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }

    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload;
        self
    }

    pub fn peer(&self) -> usize {
        self.peer
    }

    pub fn set_peer(&mut self, peer: usize) {
        self.peer = peer;
    }

    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Send a single 4-byte integer
    pub async fn send_u32(&mut self, value: u32) -> Result<()> {
        let peer = self.peer;
        self.stream
            .write_all(&value.to_le_bytes())
            .await
            .map_err(|e| failure(peer, "send integer", e))?;
        self.stream
            .flush()
            .await
            .map_err(|e| failure(peer, "flush", e))
    }

    /// Receive a single 4-byte integer
    pub async fn recv_u32(&mut self) -> Result<u32> {
        let peer = self.peer;
        let mut buf = [0u8; 4];
        self.stream
            .read_exact(&mut buf)
            .await
            .map_err(|e| failure(peer, "receive integer", e))?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Send a length-prefixed frame
    ///
    /// The body is omitted entirely for an empty payload.
    pub async fn send_frame(&mut self, payload: &[u8]) -> Result<()> {
        let peer = self.peer;
        let len = u32::try_from(payload.len()).map_err(|_| {
            TallyError::TransportFailure(format!(
                "payload of {} bytes to rank {} does not fit a 4-byte length prefix",
                payload.len(),
                peer
            ))
        })?;

        self.stream
            .write_all(&len.to_le_bytes())
            .await
            .map_err(|e| failure(peer, "send length prefix", e))?;

        if !payload.is_empty() {
            self.stream
                .write_all(payload)
                .await
                .map_err(|e| failure(peer, "send payload", e))?;
        }

        self.stream
            .flush()
            .await
            .map_err(|e| failure(peer, "flush", e))
    }

    /// Receive a length-prefixed frame
    ///
    /// The buffer is allocated at exactly the announced length. A short body
    /// (peer closed early) fails instead of returning a partial payload.
    pub async fn recv_frame(&mut self) -> Result<Vec<u8>> {
        let peer = self.peer;
        let len = self.recv_u32().await? as usize;

        if len > self.max_payload {
            return Err(TallyError::TransportFailure(format!(
                "rank {} announced a {} byte payload (max {})",
                peer, len, self.max_payload
            )));
        }

        let mut payload = vec![0u8; len];
        if len > 0 {
            self.stream
                .read_exact(&mut payload)
                .await
                .map_err(|e| failure(peer, "receive payload", e))?;
        }

        Ok(payload)
    }

    /// Close the write half so the peer sees end-of-stream
    pub async fn shutdown(&mut self) -> Result<()> {
        let peer = self.peer;
        self.stream
            .shutdown()
            .await
            .map_err(|e| failure(peer, "shutdown", e))
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

fn failure(peer: usize, op: &str, err: std::io::Error) -> TallyError {
    TallyError::TransportFailure(format!("{} (rank {}): {}", op, peer, err))
}

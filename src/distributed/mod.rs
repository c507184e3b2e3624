//! Distributed run implementation
//!
//! This module implements the scatter/gather pipeline across a process group.
//!
//! # Architecture
//!
//! logtally uses a coordinator-worker architecture:
//!
//! - **Coordinator** (rank 0): lists logs, scatters them, parses its own share,
//!   gathers and merges partial results
//! - **Worker** (rank 1..N): parses the logs it is sent and returns its counts
//!
//! # Modules
//!
//! - `transport`: 4-byte integers and length-prefixed frames over a stream
//! - `codec`: wire form of a partial result
//! - `protocol`: handshake and per-link session state
//! - `role`: the shared `Role::run` capability
//! - `coordinator` / `worker`: the two roles

pub mod codec;
pub mod coordinator;
pub mod protocol;
pub mod role;
pub mod transport;
pub mod worker;

// Re-export key types
pub use coordinator::{Coordinator, RunSummary};
pub use protocol::{Hello, PROTOCOL_VERSION};
pub use role::Role;
pub use transport::Channel;
pub use worker::{Worker, WorkerService, WorkerSummary};

use crate::error::{Result, TallyError};
use tokio::net::TcpStream;
use tracing::info;

/// Connect to every worker address, in rank order
///
/// `addresses[i]` becomes rank `i + 1`.
pub async fn connect_workers(addresses: &[String], max_payload: usize) -> Result<Vec<Channel<TcpStream>>> {
    let mut channels = Vec::with_capacity(addresses.len());

    for (i, addr) in addresses.iter().enumerate() {
        let rank = i + 1;
        info!(rank, %addr, "Connecting to worker");

        let stream = TcpStream::connect(addr).await.map_err(|e| {
            TallyError::TransportFailure(format!("failed to connect to {}: {}", addr, e))
        })?;
        stream.set_nodelay(true)?;

        channels.push(Channel::new(stream, rank).with_max_payload(max_payload));
    }

    info!(workers = channels.len(), "All workers connected");
    Ok(channels)
}

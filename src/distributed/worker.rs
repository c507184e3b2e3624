//! Worker role and the worker service
//!
//! A [`Worker`] serves one run over one coordinator link:
//! - Receives the handshake and the broadcast file count
//! - Computes its own share from `(file_count, world_size, rank)`
//! - Receives and parses exactly that many logs
//! - Sends its partial result back (only if its share is non-zero)
//!
//! [`WorkerService`] listens on a TCP port and runs a [`Worker`] for every
//! coordinator connection it accepts.

use crate::aggregate::WorkerAggregator;
use crate::distributed::protocol::CoordinatorLink;
use crate::distributed::role::Role;
use crate::distributed::transport::{Channel, DEFAULT_MAX_PAYLOAD};
use crate::error::{Result, TallyError};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// What a worker did during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSummary {
    pub rank: usize,

    /// Logs received (including empty ones)
    pub units: usize,

    /// Distinct tags sent back to the coordinator
    pub tags: usize,
}

/// A non-coordinator rank
pub struct Worker<S> {
    link: CoordinatorLink<S>,
}

impl<S> Worker<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(channel: Channel<S>) -> Self {
        Self {
            link: CoordinatorLink::new(channel),
        }
    }
}

impl<S> Role for Worker<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    type Output = WorkerSummary;

    async fn run(mut self) -> Result<WorkerSummary> {
        let hello = self.link.recv_hello().await?;
        let rank = hello.rank;

        let (file_count, share) = self.link.recv_count().await?;
        debug!(rank, file_count, share, "Received total number of logs");

        let mut aggregator = WorkerAggregator::new();
        for _ in 0..share {
            let unit = self.link.recv_unit().await?;
            aggregator.ingest(unit);
        }

        if share == 0 {
            info!(rank, "No logs assigned, nothing to send");
            return Ok(WorkerSummary {
                rank,
                units: 0,
                tags: 0,
            });
        }

        let counts = aggregator.snapshot();
        debug!(rank, units = aggregator.units(), bytes = aggregator.bytes(), tags = counts.len(), "Logs parsed");

        self.link.send_result(&counts).await?;
        info!(rank, units = aggregator.units(), tags = counts.len(), "Sent result to coordinator");

        Ok(WorkerSummary {
            rank,
            units: aggregator.units(),
            tags: counts.len(),
        })
    }
}

/// TCP listener running one [`Worker`] per coordinator connection
pub struct WorkerService {
    /// Port to listen on
    listen_port: u16,

    /// Node identifier (hostname)
    node_id: String,

    /// Largest frame accepted from the coordinator
    max_payload: usize,

    /// Serve a single run and return
    once: bool,
}

impl WorkerService {
    pub fn new(listen_port: u16) -> Self {
        Self {
            listen_port,
            node_id: get_node_id(),
            max_payload: DEFAULT_MAX_PAYLOAD,
            once: false,
        }
    }

    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload;
        self
    }

    pub fn once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }

    /// Bind and serve runs
    ///
    /// In `once` mode the outcome of the single run is returned. Otherwise a
    /// failed run is logged and the service waits for the next coordinator.
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.listen_port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| TallyError::TransportFailure(format!("failed to bind {}: {}", addr, e)))?;

        self.serve(listener).await
    }

    /// Serve runs on an already-bound listener
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        info!(node_id = %self.node_id, addr = ?listener.local_addr().ok(), "Worker service listening");

        loop {
            let (stream, peer) = listener.accept().await?;
            stream.set_nodelay(true)?;
            info!(%peer, "Coordinator connected");

            let channel = Channel::new(stream, 0).with_max_payload(self.max_payload);
            let result = Worker::new(channel).run().await;

            if self.once {
                return result.map(|summary| {
                    info!(rank = summary.rank, units = summary.units, "Run complete");
                });
            }

            match result {
                Ok(summary) => info!(rank = summary.rank, units = summary.units, "Run complete"),
                Err(e) => error!("Run failed: {}", e),
            }
            info!("Waiting for next connection");
        }
    }
}

/// Node identifier for logs
fn get_node_id() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::TagCount;
    use crate::distributed::codec;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_worker_reports_its_share() {
        let (a, b) = duplex(64 * 1024);
        let mut coord = Channel::new(a, 1);
        let worker = tokio::spawn(Worker::new(Channel::new(b, 0)).run());

        // rank 1 of 2, 3 files: rank 1 owns 1
        for v in [crate::distributed::PROTOCOL_VERSION, 1, 2, 3] {
            coord.send_u32(v).await.unwrap();
        }
        coord.send_frame(b"x[1]: Failed password for root\n").await.unwrap();

        let counts = codec::decode(&coord.recv_frame().await.unwrap()).unwrap();
        let expected: TagCount = [("Failed password", 1)].into_iter().collect();
        assert_eq!(counts, expected);

        let summary = worker.await.unwrap().unwrap();
        assert_eq!(summary, WorkerSummary { rank: 1, units: 1, tags: 1 });
    }

    #[tokio::test]
    async fn test_worker_with_no_share_sends_nothing() {
        let (a, b) = duplex(1024);
        let mut coord = Channel::new(a, 2);
        let worker = tokio::spawn(Worker::new(Channel::new(b, 0)).run());

        // rank 2 of 3, 2 files: ranks 0 and 1 own one each
        for v in [crate::distributed::PROTOCOL_VERSION, 2, 3, 2] {
            coord.send_u32(v).await.unwrap();
        }

        let summary = worker.await.unwrap().unwrap();
        assert_eq!(summary, WorkerSummary { rank: 2, units: 0, tags: 0 });

        // The worker has hung up without writing anything
        let mut raw = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut coord.into_inner(), &mut raw)
            .await
            .unwrap();
        assert!(raw.is_empty());
    }

    #[tokio::test]
    async fn test_worker_empty_units_send_empty_object() {
        let (a, b) = duplex(1024);
        let mut coord = Channel::new(a, 1);
        let worker = tokio::spawn(Worker::new(Channel::new(b, 0)).run());

        // rank 1 of 2, 4 files: rank 1 owns 2, both empty
        for v in [crate::distributed::PROTOCOL_VERSION, 1, 2, 4] {
            coord.send_u32(v).await.unwrap();
        }
        coord.send_frame(b"").await.unwrap();
        coord.send_frame(b"").await.unwrap();

        assert_eq!(coord.recv_frame().await.unwrap(), b"{}\0".to_vec());
        assert_eq!(worker.await.unwrap().unwrap().units, 2);
    }

    #[tokio::test]
    async fn test_worker_aborts_when_coordinator_vanishes() {
        let (a, b) = duplex(1024);
        let mut coord = Channel::new(a, 1);
        let worker = tokio::spawn(Worker::new(Channel::new(b, 0)).run());

        for v in [crate::distributed::PROTOCOL_VERSION, 1, 2, 4] {
            coord.send_u32(v).await.unwrap();
        }
        drop(coord);

        assert!(matches!(
            worker.await.unwrap(),
            Err(TallyError::TransportFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_service_once_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let service = tokio::spawn(WorkerService::new(0).once(true).serve(listener));

        let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let mut coord = Channel::new(stream, 1);
        for v in [crate::distributed::PROTOCOL_VERSION, 1, 2, 2] {
            coord.send_u32(v).await.unwrap();
        }
        coord.send_frame(b"x[9]: Invalid user bob from 10.0.0.1 p\n").await.unwrap();

        let counts = codec::decode(&coord.recv_frame().await.unwrap()).unwrap();
        assert_eq!(counts.get("Invalid user"), 1);
        service.await.unwrap().unwrap();
    }
}

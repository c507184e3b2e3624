//! Coordinator role
//!
//! This module implements rank 0 of a run. The coordinator:
//! - Lists the logs and broadcasts how many there are
//! - Plans which rank parses which log
//! - Scatters log payloads to their owners, keeping its own share
//! - Parses its own share
//! - Gathers and merges partial results in rank order
//! - Ranks the merged counts

use crate::aggregate::{RankedReport, TagCount, WorkUnit, WorkerAggregator};
use crate::distributed::protocol::{broadcast_count, PeerSession};
use crate::distributed::role::Role;
use crate::distributed::transport::Channel;
use crate::error::{Result, TallyError};
use crate::partition;
use crate::source::LogSource;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

/// Result of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Merged counts ordered by count, descending
    pub report: RankedReport,

    /// Number of logs processed
    pub file_count: usize,

    /// Processes in the group, coordinator included
    pub world_size: usize,
}

/// Rank 0 of a run
pub struct Coordinator<L, S> {
    source: L,

    /// Worker sessions; `peers[i]` is rank `i + 1`
    peers: Vec<PeerSession<S>>,
}

impl<L, S> Coordinator<L, S>
where
    L: LogSource,
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a coordinator over already-connected worker channels
    ///
    /// Channels are ranked in the order given, starting at 1.
    pub fn new(source: L, channels: Vec<Channel<S>>) -> Self {
        let world_size = channels.len() + 1;
        let peers = channels
            .into_iter()
            .enumerate()
            .map(|(i, channel)| PeerSession::new(channel, i + 1, world_size))
            .collect();

        Self { source, peers }
    }

    /// Processes in the group, coordinator included
    pub fn world_size(&self) -> usize {
        self.peers.len() + 1
    }
}

impl<L, S> Role for Coordinator<L, S>
where
    L: LogSource,
    S: AsyncRead + AsyncWrite + Unpin,
{
    type Output = RunSummary;

    async fn run(mut self) -> Result<RunSummary> {
        let world_size = self.world_size();

        for peer in &mut self.peers {
            peer.hello().await?;
        }
        debug!(world_size, "Handshake complete");

        info!("Listing all files");
        let files = self.source.list()?;
        let file_count = files.len();

        info!(file_count, "Broadcasting total number of logs");
        broadcast_count(&mut self.peers, file_count).await?;

        let plan = partition::plan(file_count, world_size)?;
        for peer in &self.peers {
            if peer.share() != plan.share(peer.rank()) {
                return Err(TallyError::InvalidTopology(format!(
                    "rank {} share {} disagrees with plan share {}",
                    peer.rank(),
                    peer.share(),
                    plan.share(peer.rank())
                )));
            }
        }
        info!(own_share = plan.share(0), shares = ?plan.shares, "Dividing the job among workers");

        info!("Sending logs to the workers");
        let mut local_units: Vec<WorkUnit> = Vec::with_capacity(plan.share(0));
        for (path, &owner) in files.iter().zip(&plan.assignment) {
            let unit = self.source.read(path)?;
            debug!(path = %path.display(), bytes = unit.len(), owner, "Assigned log");

            if owner == 0 {
                local_units.push(unit);
            } else {
                self.peers[owner - 1].send_unit(&unit).await?;
            }
        }

        info!(units = local_units.len(), "Parsing the logs");
        let mut aggregator = WorkerAggregator::new();
        for unit in local_units {
            aggregator.ingest(unit);
        }
        debug!(bytes = aggregator.bytes(), tags = aggregator.snapshot().len(), "Local share parsed");
        let mut global: TagCount = aggregator.into_counts();

        info!("Receiving results from workers");
        for peer in &mut self.peers {
            if !peer.expects_result() {
                debug!(rank = peer.rank(), "No share, not waiting");
                continue;
            }

            let partial = peer.recv_result().await?;
            debug!(rank = peer.rank(), tags = partial.len(), "Received partial result");
            global.merge(partial)?;
        }

        info!(tags = global.len(), "Sorting the result");
        let report = global.rank();

        info!("Operation finished");
        Ok(RunSummary {
            report,
            file_count,
            world_size,
        })
    }
}

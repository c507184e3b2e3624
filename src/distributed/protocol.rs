//! Run protocol between the coordinator and its workers
//!
//! # Protocol Version
//!
//! Current version: 1
//!
//! # Message Flow
//!
//! Every value below is a 4-byte little-endian integer except the bodies of
//! frames, which carry raw bytes (see [`transport`](super::transport)).
//!
//! ```text
//! Coordinator (rank 0)                  Worker (rank r)
//!     |                                     |
//!     |-- HELLO(version, r, world_size) --->|
//!     |                                     |
//!     |-- FILE_COUNT ---------------------->|   both sides derive share(r)
//!     |                                     |
//!     |-- UNIT(len, bytes) x share(r) ----->|   no bytes when len == 0
//!     |                                     |
//!     |<------- RESULT(size, json\0) -------|   only when share(r) > 0
//! ```
//!
//! # Sessions
//!
//! Each end of a link is wrapped in a session object that tracks where in the
//! flow above the link currently is. Calling an operation out of turn is a
//! transport failure instead of a silent deadlock or a misread frame. A link
//! whose share is zero closes right after the file count.

use crate::aggregate::{TagCount, WorkUnit};
use crate::distributed::codec;
use crate::distributed::transport::Channel;
use crate::error::{Result, TallyError};
use crate::partition;
use tokio::io::{AsyncRead, AsyncWrite};

/// Protocol version
///
/// Increment this when making breaking changes to the protocol.
/// Coordinator and workers must have matching protocol versions.
pub const PROTOCOL_VERSION: u32 = 1;

/// Handshake sent by the coordinator on every new link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hello {
    pub version: u32,

    /// Rank assigned to the receiving worker (1..world_size)
    pub rank: usize,

    /// Total processes in the group, coordinator included
    pub world_size: usize,
}

/// Coordinator-side phase of a worker link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerPhase {
    Hello,
    Count,
    Scatter { remaining: usize },
    Gather,
    Closed,
}

/// Worker-side phase of the coordinator link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPhase {
    Hello,
    Count,
    Receive { remaining: usize },
    Send,
    Closed,
}

/// Coordinator's session with one worker
#[derive(Debug)]
pub struct PeerSession<S> {
    channel: Channel<S>,
    rank: usize,
    world_size: usize,
    share: usize,
    phase: PeerPhase,
}

impl<S> PeerSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(mut channel: Channel<S>, rank: usize, world_size: usize) -> Self {
        channel.set_peer(rank);
        Self {
            channel,
            rank,
            world_size,
            share: 0,
            phase: PeerPhase::Hello,
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn phase(&self) -> PeerPhase {
        self.phase
    }

    /// Number of units this worker owns (known after the file count is sent)
    pub fn share(&self) -> usize {
        self.share
    }

    /// Whether the coordinator must wait for a result from this worker
    pub fn expects_result(&self) -> bool {
        self.phase == PeerPhase::Gather
    }

    /// Send the handshake
    pub async fn hello(&mut self) -> Result<()> {
        self.expect(PeerPhase::Hello, "hello")?;

        self.channel.send_u32(PROTOCOL_VERSION).await?;
        self.channel.send_u32(to_wire(self.rank, "rank")?).await?;
        self.channel.send_u32(to_wire(self.world_size, "world size")?).await?;

        self.phase = PeerPhase::Count;
        Ok(())
    }

    /// Send the run's file count and derive this worker's share from it
    pub async fn send_count(&mut self, file_count: usize) -> Result<()> {
        self.expect(PeerPhase::Count, "file count")?;

        self.channel.send_u32(to_wire(file_count, "file count")?).await?;

        self.share = partition::share_for(file_count, self.world_size, self.rank)?;
        self.phase = match self.share {
            0 => PeerPhase::Closed,
            remaining => PeerPhase::Scatter { remaining },
        };
        Ok(())
    }

    /// Send one work unit
    pub async fn send_unit(&mut self, unit: &WorkUnit) -> Result<()> {
        let remaining = match self.phase {
            PeerPhase::Scatter { remaining } => remaining,
            phase => return Err(violation(self.rank, "work unit", phase)),
        };

        self.channel.send_frame(unit.as_bytes()).await?;

        self.phase = match remaining - 1 {
            0 => PeerPhase::Gather,
            remaining => PeerPhase::Scatter { remaining },
        };
        Ok(())
    }

    /// Receive and decode the worker's partial result
    pub async fn recv_result(&mut self) -> Result<TagCount> {
        self.expect(PeerPhase::Gather, "result")?;

        let payload = self.channel.recv_frame().await?;
        let counts = codec::decode(&payload)?;

        self.phase = PeerPhase::Closed;
        Ok(counts)
    }

    fn expect(&self, phase: PeerPhase, op: &str) -> Result<()> {
        if self.phase != phase {
            return Err(violation(self.rank, op, self.phase));
        }
        Ok(())
    }
}

/// Worker's session with the coordinator
#[derive(Debug)]
pub struct CoordinatorLink<S> {
    channel: Channel<S>,
    hello: Option<Hello>,
    phase: LinkPhase,
}

impl<S> CoordinatorLink<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(mut channel: Channel<S>) -> Self {
        channel.set_peer(0);
        Self {
            channel,
            hello: None,
            phase: LinkPhase::Hello,
        }
    }

    pub fn phase(&self) -> LinkPhase {
        self.phase
    }

    /// Receive and validate the handshake
    pub async fn recv_hello(&mut self) -> Result<Hello> {
        self.expect(LinkPhase::Hello, "hello")?;

        let version = self.channel.recv_u32().await?;
        let rank = self.channel.recv_u32().await? as usize;
        let world_size = self.channel.recv_u32().await? as usize;

        if version != PROTOCOL_VERSION {
            return Err(TallyError::TransportFailure(format!(
                "protocol version mismatch: coordinator={}, worker={}",
                version, PROTOCOL_VERSION
            )));
        }
        if rank == 0 || rank >= world_size {
            return Err(TallyError::InvalidTopology(format!(
                "rank {} is not a worker rank in a group of {}",
                rank, world_size
            )));
        }

        let hello = Hello {
            version,
            rank,
            world_size,
        };
        self.hello = Some(hello);
        self.phase = LinkPhase::Count;
        Ok(hello)
    }

    /// Receive the file count and compute this worker's share
    ///
    /// Returns `(file_count, share)`.
    pub async fn recv_count(&mut self) -> Result<(usize, usize)> {
        self.expect(LinkPhase::Count, "file count")?;
        let hello = self
            .hello
            .ok_or_else(|| violation(0, "file count", self.phase))?;

        let file_count = self.channel.recv_u32().await? as usize;
        let share = partition::share_for(file_count, hello.world_size, hello.rank)?;

        self.phase = match share {
            0 => LinkPhase::Closed,
            remaining => LinkPhase::Receive { remaining },
        };
        Ok((file_count, share))
    }

    /// Receive one work unit
    pub async fn recv_unit(&mut self) -> Result<WorkUnit> {
        let remaining = match self.phase {
            LinkPhase::Receive { remaining } => remaining,
            phase => return Err(violation(0, "work unit", phase)),
        };

        let unit = WorkUnit::new(self.channel.recv_frame().await?);

        self.phase = match remaining - 1 {
            0 => LinkPhase::Send,
            remaining => LinkPhase::Receive { remaining },
        };
        Ok(unit)
    }

    /// Encode and send this worker's partial result
    pub async fn send_result(&mut self, counts: &TagCount) -> Result<()> {
        self.expect(LinkPhase::Send, "result")?;

        let payload = codec::encode(counts)?;
        self.channel.send_frame(&payload).await?;

        self.phase = LinkPhase::Closed;
        Ok(())
    }

    fn expect(&self, phase: LinkPhase, op: &str) -> Result<()> {
        if self.phase != phase {
            return Err(violation(0, op, self.phase));
        }
        Ok(())
    }
}

/// Send the file count to every worker, in rank order
///
/// This is the run's one-to-all broadcast; each session derives its share
/// from the count it sent.
pub async fn broadcast_count<S>(peers: &mut [PeerSession<S>], file_count: usize) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    for peer in peers.iter_mut() {
        peer.send_count(file_count).await?;
    }
    Ok(())
}

fn to_wire(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        TallyError::TransportFailure(format!("{} {} does not fit a 4-byte integer", what, value))
    })
}

fn violation(peer: usize, op: &str, phase: impl std::fmt::Debug) -> TallyError {
    TallyError::TransportFailure(format!(
        "protocol violation with rank {}: {} not expected in phase {:?}",
        peer, op, phase
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, DuplexStream};

    fn link(rank: usize, world_size: usize) -> (PeerSession<DuplexStream>, CoordinatorLink<DuplexStream>) {
        let (a, b) = duplex(64 * 1024);
        (
            PeerSession::new(Channel::new(a, rank), rank, world_size),
            CoordinatorLink::new(Channel::new(b, 0)),
        )
    }

    #[tokio::test]
    async fn test_broadcast_count_reaches_every_worker() {
        let mut peers = Vec::new();
        let mut coords = Vec::new();
        for rank in 1..=3 {
            let (peer, coord) = link(rank, 4);
            peers.push(peer);
            coords.push(coord);
        }
        for (peer, coord) in peers.iter_mut().zip(coords.iter_mut()) {
            peer.hello().await.unwrap();
            coord.recv_hello().await.unwrap();
        }

        // 6 files over 4 ranks: ranks 0 and 1 own 2, ranks 2 and 3 own 1
        broadcast_count(&mut peers, 6).await.unwrap();

        let shares: Vec<usize> = peers.iter().map(|p| p.share()).collect();
        assert_eq!(shares, vec![2, 1, 1]);
        for (rank, coord) in (1..).zip(coords.iter_mut()) {
            assert_eq!(coord.recv_count().await.unwrap(), (6, shares[rank - 1]));
        }
    }

    #[tokio::test]
    async fn test_full_exchange() {
        let (mut peer, mut coord) = link(1, 3);

        peer.hello().await.unwrap();
        let hello = coord.recv_hello().await.unwrap();
        assert_eq!(hello, Hello { version: PROTOCOL_VERSION, rank: 1, world_size: 3 });

        // 7 files over 3 ranks: rank 1 owns 2
        peer.send_count(7).await.unwrap();
        assert_eq!(peer.phase(), PeerPhase::Scatter { remaining: 2 });
        assert_eq!(coord.recv_count().await.unwrap(), (7, 2));

        peer.send_unit(&WorkUnit::new(b"a[1]: Failed password for x\n".to_vec())).await.unwrap();
        peer.send_unit(&WorkUnit::new(Vec::new())).await.unwrap();
        assert!(peer.expects_result());

        assert_eq!(coord.recv_unit().await.unwrap().len(), 28);
        assert!(coord.recv_unit().await.unwrap().is_empty());
        assert_eq!(coord.phase(), LinkPhase::Send);

        let counts: TagCount = [("Failed password", 1)].into_iter().collect();
        coord.send_result(&counts).await.unwrap();
        assert_eq!(peer.recv_result().await.unwrap(), counts);
        assert_eq!(peer.phase(), PeerPhase::Closed);
        assert_eq!(coord.phase(), LinkPhase::Closed);
    }

    #[tokio::test]
    async fn test_zero_share_closes_after_count() {
        let (mut peer, mut coord) = link(2, 3);
        peer.hello().await.unwrap();
        coord.recv_hello().await.unwrap();

        // 1 file over 3 ranks: only rank 0 works
        peer.send_count(1).await.unwrap();
        assert_eq!(peer.share(), 0);
        assert!(!peer.expects_result());
        assert_eq!(coord.recv_count().await.unwrap(), (1, 0));
        assert_eq!(coord.phase(), LinkPhase::Closed);

        assert!(matches!(
            coord.send_result(&TagCount::new()).await,
            Err(TallyError::TransportFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_out_of_turn_is_violation() {
        let (mut peer, mut coord) = link(1, 2);

        assert!(matches!(peer.send_count(4).await, Err(TallyError::TransportFailure(_))));
        assert!(matches!(
            peer.send_unit(&WorkUnit::default()).await,
            Err(TallyError::TransportFailure(_))
        ));
        assert!(matches!(peer.recv_result().await, Err(TallyError::TransportFailure(_))));
        assert!(matches!(coord.recv_unit().await, Err(TallyError::TransportFailure(_))));
        assert!(matches!(coord.recv_count().await, Err(TallyError::TransportFailure(_))));
    }

    #[tokio::test]
    async fn test_version_mismatch_rejected() {
        let (a, b) = duplex(1024);
        let mut raw = Channel::new(a, 1);
        let mut coord = CoordinatorLink::new(Channel::new(b, 0));

        raw.send_u32(PROTOCOL_VERSION + 1).await.unwrap();
        raw.send_u32(1).await.unwrap();
        raw.send_u32(2).await.unwrap();

        assert!(matches!(coord.recv_hello().await, Err(TallyError::TransportFailure(_))));
    }

    #[tokio::test]
    async fn test_coordinator_rank_rejected_as_worker() {
        let (a, b) = duplex(1024);
        let mut raw = Channel::new(a, 1);
        let mut coord = CoordinatorLink::new(Channel::new(b, 0));

        raw.send_u32(PROTOCOL_VERSION).await.unwrap();
        raw.send_u32(0).await.unwrap();
        raw.send_u32(2).await.unwrap();

        assert!(matches!(coord.recv_hello().await, Err(TallyError::InvalidTopology(_))));
    }

    #[tokio::test]
    async fn test_corrupt_result_rejected() {
        let (mut peer, coord) = link(1, 2);
        peer.hello().await.unwrap();
        peer.send_count(2).await.unwrap();
        peer.send_unit(&WorkUnit::default()).await.unwrap();

        // Drain the worker side by hand and answer with a duplicate-keyed object
        let mut raw = Channel::new(coord.channel.into_inner(), 0);
        for _ in 0..4 {
            raw.recv_u32().await.unwrap();
        }
        assert!(raw.recv_frame().await.unwrap().is_empty());
        raw.send_frame(b"{\"A\":1,\"A\":1}\0").await.unwrap();

        assert!(matches!(peer.recv_result().await, Err(TallyError::CorruptPayload(_))));
    }
}

//! Static partitioning of log files across the process group
//!
//! Files are split into contiguous blocks in listing order. Every worker gets
//! `files / workers` files, and the first `files % workers` workers (by rank)
//! get one more. Rank 0 is the coordinator, which takes a share like everyone
//! else.
//!
//! The arithmetic depends only on `(file_count, worker_count)`, so a worker can
//! recompute its own share from the broadcast file count without being told.

use crate::error::{Result, TallyError};

/// Assignment of files to workers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Worker rank for each file index, in listing order
    pub assignment: Vec<usize>,

    /// Number of files assigned to each worker rank
    pub shares: Vec<usize>,
}

impl Plan {
    /// Number of workers in the plan
    pub fn worker_count(&self) -> usize {
        self.shares.len()
    }

    /// Number of files in the plan
    pub fn file_count(&self) -> usize {
        self.assignment.len()
    }

    /// Share of a single rank (0 for ranks outside the group)
    pub fn share(&self, rank: usize) -> usize {
        self.shares.get(rank).copied().unwrap_or(0)
    }

    /// File index range owned by `rank`
    pub fn range(&self, rank: usize) -> std::ops::Range<usize> {
        let start: usize = self.shares.iter().take(rank).sum();
        start..start + self.share(rank)
    }
}

/// Compute the share of a single rank
///
/// Identical to `plan(file_count, worker_count)?.share(rank)` without
/// materializing the assignment.
pub fn share_for(file_count: usize, worker_count: usize, rank: usize) -> Result<usize> {
    check_topology(worker_count)?;

    if rank >= worker_count {
        return Err(TallyError::InvalidTopology(format!(
            "rank {} is outside a group of {} workers",
            rank, worker_count
        )));
    }

    let base = file_count / worker_count;
    let overflow = file_count % worker_count;
    Ok(if rank < overflow { base + 1 } else { base })
}

/// Compute the full assignment of `file_count` files to `worker_count` workers
pub fn plan(file_count: usize, worker_count: usize) -> Result<Plan> {
    check_topology(worker_count)?;

    let mut shares = Vec::with_capacity(worker_count);
    let mut assignment = Vec::with_capacity(file_count);

    for rank in 0..worker_count {
        let share = share_for(file_count, worker_count, rank)?;
        shares.push(share);
        assignment.extend(std::iter::repeat(rank).take(share));
    }

    Ok(Plan { assignment, shares })
}

fn check_topology(worker_count: usize) -> Result<()> {
    if worker_count == 0 {
        return Err(TallyError::InvalidTopology(
            "worker count must be at least 1".to_string(),
        ));
    }
    Ok(())
}

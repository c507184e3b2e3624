//! Process roles
//!
//! Every process in a run plays exactly one role, chosen once at startup:
//! rank 0 is the [`Coordinator`](super::Coordinator), every other rank is a
//! [`Worker`](super::Worker).

use crate::error::Result;

/// A process role driving one complete run
#[allow(async_fn_in_trait)]
pub trait Role {
    /// What the role produces when the run completes
    type Output;

    /// Run the role to completion
    ///
    /// Any error aborts the run; nothing is retried.
    async fn run(self) -> Result<Self::Output>;
}

//! logtally - distributed security-event tag counter
//!
//! logtally counts event tags (`Failed password`, `Invalid user`, ...) across a
//! set of authentication logs by scattering the logs over a group of worker
//! processes and merging their partial counts into one ranked report.
//!
//! # Architecture
//!
//! - **Parser**: pure tag extraction from raw log bytes
//! - **Partition**: static, deterministic split of logs across ranks
//! - **Aggregate**: per-process tallies, merge and ranking
//! - **Distributed**: transport, wire codec, run protocol, coordinator/worker roles
//! - **Source / Output**: log listing and reading, report rendering

pub mod aggregate;
pub mod config;
pub mod distributed;
pub mod error;
pub mod output;
pub mod parser;
pub mod partition;
pub mod source;

// Re-export commonly used types
pub use aggregate::{RankedReport, TagCount, WorkUnit, WorkerAggregator};
pub use config::Config;
pub use distributed::{Coordinator, Role, RunSummary, Worker};
pub use error::{Result, TallyError};

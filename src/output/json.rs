//! JSON output formatting
//!
//! Writes the ranked report together with the shape of the run that
//! produced it:
//!
//! ```json
//! {
//!   "generated_at": "2024-03-01T10:00:00Z",
//!   "files": 7,
//!   "workers": 3,
//!   "total_tags": 11,
//!   "entries": [{ "tag": "Failed password", "count": 6 }, ...]
//! }
//! ```

use crate::aggregate::RankedReport;
use crate::distributed::RunSummary;
use crate::error::{Result, TallyError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One report line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonEntry {
    pub tag: String,
    pub count: u64,
}

/// Complete JSON report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonReport {
    pub generated_at: DateTime<Utc>,

    /// Number of logs processed
    pub files: usize,

    /// Processes in the group, coordinator included
    pub workers: usize,

    /// Sum of all counts (before any `top` limit)
    pub total_tags: u64,

    pub entries: Vec<JsonEntry>,
}

impl JsonReport {
    pub fn from_summary(summary: &RunSummary, top: Option<usize>) -> Self {
        Self {
            generated_at: Utc::now(),
            files: summary.file_count,
            workers: summary.world_size,
            total_tags: summary.report.total(),
            entries: entries(&summary.report, top),
        }
    }
}

fn entries(report: &RankedReport, top: Option<usize>) -> Vec<JsonEntry> {
    let slice = match top {
        Some(n) => report.top(n),
        None => report.entries(),
    };

    slice
        .iter()
        .map(|(tag, count)| JsonEntry {
            tag: tag.clone(),
            count: *count,
        })
        .collect()
}

/// Write the JSON report to a file
pub fn write_json_report(output_path: &Path, summary: &RunSummary, top: Option<usize>) -> Result<()> {
    let file = File::create(output_path).map_err(|e| TallyError::io(output_path, e))?;

    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, &JsonReport::from_summary(summary, top))
        .map_err(|e| TallyError::io(output_path, e.into()))?;
    writer.flush().map_err(|e| TallyError::io(output_path, e))
}

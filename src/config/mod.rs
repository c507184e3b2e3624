//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.

pub mod cli;
pub mod cli_convert;
pub mod toml;
pub mod validator;

use crate::distributed::transport::DEFAULT_MAX_PAYLOAD;
use crate::source::{DEFAULT_LOG_DIR, DEFAULT_NAME_FILTER};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Complete run configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Where the logs come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Directory holding the logs
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Substring a file name must contain to be processed
    #[serde(default = "default_name_filter")]
    pub name_filter: String,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_DIR)
}

fn default_name_filter() -> String {
    DEFAULT_NAME_FILTER.to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            name_filter: default_name_filter(),
        }
    }
}

/// Process group configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Worker addresses (IP:port); `workers[i]` is rank `i + 1`
    #[serde(default)]
    pub workers: Vec<String>,
    /// Port used for worker addresses given without one
    #[serde(default = "default_port")]
    pub worker_port: u16,
    /// Port a worker service listens on
    #[serde(default = "default_port")]
    pub listen_port: u16,
    /// Largest frame accepted on any link (bytes)
    #[serde(default = "default_max_payload")]
    pub max_payload: usize,
}

fn default_port() -> u16 {
    9999
}

fn default_max_payload() -> usize {
    DEFAULT_MAX_PAYLOAD
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            workers: Vec::new(),
            worker_port: default_port(),
            listen_port: default_port(),
            max_payload: default_max_payload(),
        }
    }
}

impl ClusterConfig {
    /// Processes in the group, coordinator included
    pub fn world_size(&self) -> usize {
        self.workers.len() + 1
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// JSON report file path
    pub json_output: Option<PathBuf>,
    /// Only show the first N entries
    pub top: Option<usize>,
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Log directory: {}", self.source.log_dir.display())?;
        writeln!(f, "Name filter:   {}", self.source.name_filter)?;
        writeln!(f, "Processes:     {} (coordinator + {} workers)", self.cluster.world_size(), self.cluster.workers.len())?;
        for (i, addr) in self.cluster.workers.iter().enumerate() {
            writeln!(f, "  rank {}: {}", i + 1, addr)?;
        }
        writeln!(f, "Max payload:   {} bytes", self.cluster.max_payload)?;
        if let Some(ref path) = self.output.json_output {
            writeln!(f, "JSON output:   {}", path.display())?;
        }
        if let Some(top) = self.output.top {
            writeln!(f, "Top entries:   {}", top)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.source.log_dir, PathBuf::from("./var/log/"));
        assert_eq!(config.source.name_filter, "secure");
        assert_eq!(config.cluster.listen_port, 9999);
        assert_eq!(config.cluster.world_size(), 1);
        assert!(config.output.json_output.is_none());
    }

    #[test]
    fn test_display_lists_ranks() {
        let mut config = Config::default();
        config.cluster.workers = vec!["10.0.0.2:9999".into(), "10.0.0.3:9999".into()];
        let text = config.to_string();
        assert!(text.contains("rank 1: 10.0.0.2:9999"));
        assert!(text.contains("rank 2: 10.0.0.3:9999"));
        assert!(text.contains("3 (coordinator + 2 workers)"));
    }
}

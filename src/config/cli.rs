//! CLI argument parsing using clap

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutionMode {
    /// Standalone mode (default) - coordinator plus local worker processes
    Standalone,
    /// Coordinator mode - rank 0 of a group of remote workers
    Coordinator,
    /// Worker mode - serve runs for a coordinator
    Worker,
}

/// logtally - distributed security-event tag counter
#[derive(Parser, Debug)]
#[command(name = "logtally")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Execution mode: standalone, coordinator, or worker
    #[arg(long, value_enum, default_value = "standalone")]
    pub mode: ExecutionMode,

    /// Directory holding the logs
    ///
    /// Not used in worker mode (the coordinator sends log content)
    #[arg(value_name = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Only process files whose name contains this string
    #[arg(long)]
    pub filter: Option<String>,

    // === Cluster Options ===
    /// Comma-separated list of worker addresses for coordinator mode (e.g., "10.0.1.10:9999,10.0.1.11:9999")
    #[arg(long)]
    pub host_list: Option<String>,

    /// File containing list of worker addresses (one per line, for coordinator mode)
    #[arg(long)]
    pub clients_file: Option<PathBuf>,

    /// Port to connect to on workers given without one (coordinator mode only)
    #[arg(long)]
    pub worker_port: Option<u16>,

    /// Port for the worker service to listen on (worker mode only)
    #[arg(long)]
    pub listen_port: Option<u16>,

    /// Serve a single run, then exit (worker mode only)
    #[arg(long)]
    pub once: bool,

    /// Number of local worker processes (standalone mode only, default: CPUs - 1)
    #[arg(long)]
    pub local_workers: Option<usize>,

    /// Largest accepted frame (e.g., 64M, 1G)
    #[arg(long, env = "LOGTALLY_MAX_PAYLOAD")]
    pub max_payload: Option<String>,

    // === Output Options ===
    /// Write the ranked report as JSON to this file
    #[arg(long)]
    pub json_output: Option<PathBuf>,

    /// Only show the first N entries
    #[arg(long)]
    pub top: Option<usize>,

    // === Runtime Options ===
    /// TOML configuration file
    #[arg(short = 'c', long, env = "LOGTALLY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Dry run - validate configuration without executing
    #[arg(long)]
    pub dry_run: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.host_list.is_some() && self.clients_file.is_some() {
            anyhow::bail!("can only specify one of --host-list or --clients-file");
        }

        match self.mode {
            ExecutionMode::Worker => {
                if self.host_list.is_some() || self.clients_file.is_some() {
                    anyhow::bail!("--host-list and --clients-file are coordinator options");
                }
            }
            ExecutionMode::Standalone => {
                if self.host_list.is_some() || self.clients_file.is_some() {
                    anyhow::bail!("standalone mode launches its own workers; use --mode coordinator for remote workers");
                }
            }
            ExecutionMode::Coordinator => {
                if self.local_workers.is_some() {
                    anyhow::bail!("--local-workers is a standalone option");
                }
            }
        }

        if self.once && self.mode != ExecutionMode::Worker {
            anyhow::bail!("--once is a worker option");
        }

        Ok(())
    }
}

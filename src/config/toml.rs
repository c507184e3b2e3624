//! TOML configuration file parsing
//!
//! ```toml
//! [source]
//! log_dir = "/var/log"
//! name_filter = "secure"
//!
//! [cluster]
//! workers = ["10.0.1.10:9999", "10.0.1.11:9999"]
//!
//! [output]
//! top = 20
//! ```

use super::cli::Cli;
use super::cli_convert::{parse_host_list, parse_size, read_clients_file, with_port};
use super::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Result<Config> {
    if let Some(ref dir) = cli.log_dir {
        config.source.log_dir = dir.clone();
    }
    if let Some(ref filter) = cli.filter {
        config.source.name_filter = filter.clone();
    }

    if let Some(port) = cli.worker_port {
        config.cluster.worker_port = port;
    }
    if let Some(port) = cli.listen_port {
        config.cluster.listen_port = port;
    }
    if let Some(ref size) = cli.max_payload {
        let bytes = parse_size(size).context("Invalid max payload")?;
        config.cluster.max_payload = usize::try_from(bytes)
            .with_context(|| format!("Max payload too large: {}", size))?;
    }

    // Worker lists replace the file's list entirely
    if let Some(ref host_list) = cli.host_list {
        config.cluster.workers = parse_host_list(host_list, config.cluster.worker_port);
    } else if let Some(ref clients_file) = cli.clients_file {
        config.cluster.workers = read_clients_file(clients_file, config.cluster.worker_port)?;
    } else {
        let port = config.cluster.worker_port;
        config.cluster.workers = config
            .cluster
            .workers
            .iter()
            .map(|addr| if addr.trim().is_empty() { addr.clone() } else { with_port(addr, port) })
            .collect();
    }

    if let Some(ref path) = cli.json_output {
        config.output.json_output = Some(path.clone());
    }
    if let Some(top) = cli.top {
        config.output.top = Some(top);
    }

    Ok(config)
}

/// Build the effective configuration: TOML file (if any), then CLI overrides
pub fn load_config(cli: &Cli) -> Result<Config> {
    let base = match cli.config {
        Some(ref path) => parse_toml_file(path)?,
        None => Config::default(),
    };

    merge_cli_with_config(cli, base)
}

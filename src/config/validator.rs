//! Configuration validation

use super::*;
use crate::error::{Result, TallyError};

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_source(&config.source)?;
    validate_cluster(&config.cluster)?;
    validate_output(&config.output)?;
    Ok(())
}

/// Validate log source configuration
pub fn validate_source(source: &SourceConfig) -> Result<()> {
    if source.name_filter.is_empty() {
        return Err(TallyError::Config("name_filter must not be empty".to_string()));
    }
    Ok(())
}

/// Validate process group configuration
pub fn validate_cluster(cluster: &ClusterConfig) -> Result<()> {
    if cluster.max_payload == 0 {
        return Err(TallyError::Config("max_payload must be at least 1 byte".to_string()));
    }

    // Lengths travel as 4-byte prefixes
    if cluster.max_payload as u64 > u32::MAX as u64 {
        return Err(TallyError::Config(format!(
            "max_payload must not exceed {} bytes, got {}",
            u32::MAX,
            cluster.max_payload
        )));
    }

    if u32::try_from(cluster.world_size()).is_err() {
        return Err(TallyError::Config(format!(
            "too many workers: {}",
            cluster.workers.len()
        )));
    }

    for (i, addr) in cluster.workers.iter().enumerate() {
        if addr.trim().is_empty() {
            return Err(TallyError::Config(format!("worker address for rank {} is empty", i + 1)));
        }
    }

    Ok(())
}

/// Validate output configuration
pub fn validate_output(output: &OutputConfig) -> Result<()> {
    if output.top == Some(0) {
        return Err(TallyError::Config("top must be at least 1".to_string()));
    }
    Ok(())
}

//! CLI to Config conversion utilities

use anyhow::{Context, Result};
use std::path::Path;

/// Parse a size string (e.g., "1G", "100M", "4k") to bytes
pub fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim().to_lowercase();

    let (num_str, multiplier) = if s.ends_with("k") || s.ends_with("kb") {
        (s.trim_end_matches("kb").trim_end_matches("k"), 1024u64)
    } else if s.ends_with("m") || s.ends_with("mb") {
        (s.trim_end_matches("mb").trim_end_matches("m"), 1024 * 1024)
    } else if s.ends_with("g") || s.ends_with("gb") {
        (s.trim_end_matches("gb").trim_end_matches("g"), 1024 * 1024 * 1024)
    } else {
        (s.as_str(), 1)
    };

    let num: u64 = num_str.parse()
        .with_context(|| format!("Invalid size format: {}", s))?;

    num.checked_mul(multiplier)
        .with_context(|| format!("Size out of range: {}", s))
}

/// Add `default_port` to an address given without one
pub fn with_port(addr: &str, default_port: u16) -> String {
    let addr = addr.trim();
    if addr.contains(':') {
        addr.to_string()
    } else {
        format!("{}:{}", addr, default_port)
    }
}

/// Parse a comma-separated worker list
pub fn parse_host_list(host_list: &str, default_port: u16) -> Vec<String> {
    host_list
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| with_port(s, default_port))
        .collect()
}

/// Read worker addresses from a file (one per line, `#` comments)
pub fn read_clients_file(path: &Path, default_port: u16) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read clients file: {}", path.display()))?;

    Ok(content
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.trim().starts_with('#'))
        .map(|line| with_port(line, default_port))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("4k").unwrap(), 4096);
        assert_eq!(parse_size("64M").unwrap(), 64 * 1024 * 1024);
        assert_eq!(parse_size("1gb").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_size("512").unwrap(), 512);
        assert!(parse_size("lots").is_err());
    }

    #[test]
    fn test_parse_host_list() {
        assert_eq!(
            parse_host_list("10.0.0.2, 10.0.0.3:7000,", 9999),
            vec!["10.0.0.2:9999".to_string(), "10.0.0.3:7000".to_string()]
        );
    }

    #[test]
    fn test_read_clients_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("hosts");
        std::fs::write(&path, "# workers\nnode-a\n\nnode-b:7000\n").unwrap();

        assert_eq!(
            read_clients_file(&path, 9999).unwrap(),
            vec!["node-a:9999".to_string(), "node-b:7000".to_string()]
        );
        assert!(read_clients_file(&dir.path().join("absent"), 9999).is_err());
    }
}

//! Log sources
//!
//! The coordinator never touches the filesystem directly; it asks a
//! [`LogSource`] for the ordered list of logs and for the bytes of each one.
//! [`DirectorySource`] is the production source (one directory, file names
//! filtered by substring). [`MemorySource`] serves fixed payloads.

use crate::aggregate::WorkUnit;
use crate::error::{Result, TallyError};
use std::path::{Path, PathBuf};

/// Default directory holding the authentication logs
pub const DEFAULT_LOG_DIR: &str = "./var/log/";

/// Default file name filter (`secure`, `secure-20240101`, `secure.1`, ...)
pub const DEFAULT_NAME_FILTER: &str = "secure";

/// Provider of log files for a run
pub trait LogSource {
    /// Ordered list of logs to process
    fn list(&self) -> Result<Vec<PathBuf>>;

    /// Full content of one log
    fn read(&self, path: &Path) -> Result<WorkUnit>;
}

/// Logs in a single directory whose file name contains a filter string
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
    name_filter: String,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>, name_filter: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name_filter: name_filter.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl LogSource for DirectorySource {
    /// Regular files whose name contains the filter, sorted by path
    fn list(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| TallyError::io(&self.dir, e))?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| TallyError::io(&self.dir, e))?;
            let file_type = entry.file_type().map_err(|e| TallyError::io(entry.path(), e))?;
            if !file_type.is_file() {
                continue;
            }
            if entry.file_name().to_string_lossy().contains(&self.name_filter) {
                paths.push(entry.path());
            }
        }

        paths.sort();
        Ok(paths)
    }

    fn read(&self, path: &Path) -> Result<WorkUnit> {
        std::fs::read(path)
            .map(WorkUnit::new)
            .map_err(|e| TallyError::io(path, e))
    }
}

/// Fixed in-memory logs, listed in insertion order
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    logs: Vec<(PathBuf, Vec<u8>)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(mut self, name: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        self.logs.push((name.into(), content.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }
}

impl LogSource for MemorySource {
    fn list(&self) -> Result<Vec<PathBuf>> {
        Ok(self.logs.iter().map(|(name, _)| name.clone()).collect())
    }

    fn read(&self, path: &Path) -> Result<WorkUnit> {
        self.logs
            .iter()
            .find(|(name, _)| name == path)
            .map(|(_, content)| WorkUnit::new(content.clone()))
            .ok_or_else(|| {
                TallyError::io(
                    path,
                    std::io::Error::new(std::io::ErrorKind::NotFound, "no such log"),
                )
            })
    }
}

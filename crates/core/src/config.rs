//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Environment variables are read only by the binaries, never during
//! request handling, so behaviour stays consistent in multi-threaded runtimes and test harnesses.

use crate::constants::{DEFAULT_DATA_DIR, DOCUMENTS_DIR_NAME};
use crate::{CoreError, CoreResult};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Where records and documents are kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StorageBackend {
    /// Sharded YAML records and content-addressed documents under the data directory.
    #[default]
    Files,
    /// Process memory only; everything is lost on exit.
    Memory,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StorageBackend::Files => "files",
            StorageBackend::Memory => "memory",
        })
    }
}

impl FromStr for StorageBackend {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "files" | "file" => Ok(StorageBackend::Files),
            "memory" | "mem" => Ok(StorageBackend::Memory),
            other => Err(CoreError::InvalidInput(format!(
                "unknown storage backend '{}' (expected 'files' or 'memory')",
                other
            ))),
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    storage_backend: StorageBackend,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] if the file backend is selected and `data_dir` exists
    /// but is not a directory.
    pub fn new(data_dir: PathBuf, storage_backend: StorageBackend) -> CoreResult<Self> {
        if storage_backend == StorageBackend::Files && data_dir.exists() && !data_dir.is_dir() {
            return Err(CoreError::InvalidInput(format!(
                "data directory is not a directory: {}",
                data_dir.display()
            )));
        }

        Ok(Self {
            data_dir,
            storage_backend,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.storage_backend
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.data_dir.join(DOCUMENTS_DIR_NAME)
    }
}

/// Resolve the data directory from an optional override.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_DATA_DIR`].
pub fn resolve_data_dir(value: Option<String>) -> PathBuf {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

/// Parse the storage backend from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`StorageBackend::Files`].
pub fn storage_backend_from_env_value(value: Option<String>) -> CoreResult<StorageBackend> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let parsed = value.map(|v| v.parse::<StorageBackend>()).transpose()?;

    Ok(parsed.unwrap_or_default())
}

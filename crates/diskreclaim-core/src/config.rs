//! Engine configuration.
//!
//! [`EngineConfig`] is built once and handed to each scanner profile and
//! engine at construction. There is no global settings state; the binary
//! loads it from disk (or uses defaults) and applies command-line overrides.

use crate::scanner::roots::TraversalLimits;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine the platform config directory")]
    NoConfigDir,

    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Tunables for every scanner and engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum size for the large-files scanner.
    pub large_file_min_size: u64,
    /// Minimum age, in days, for the downloads scanner.
    pub download_min_age_days: u64,
    /// Files below this size are never fingerprinted.
    pub duplicate_min_size: u64,
    /// Bytes hashed from the start of each duplicate candidate.
    pub duplicate_prefix_bytes: usize,
    /// Confirm prefix matches with a full-content hash.
    pub verify_full_hash: bool,
    /// Limits for per-directory scanners (junk, containers, caches).
    pub shallow_limits: TraversalLimits,
    /// Limits for whole-tree scanners (large files, duplicates, treemap).
    pub deep_limits: TraversalLimits,
    pub default_shred_passes: u32,
    /// Scan summaries kept in history.
    pub history_cap: usize,
    /// Worker threads for hashing and tree scans; 0 means one per CPU.
    pub threads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            large_file_min_size: 100 * MIB,
            download_min_age_days: 30,
            duplicate_min_size: 10 * KIB,
            duplicate_prefix_bytes: 64 * KIB as usize,
            verify_full_hash: false,
            shallow_limits: TraversalLimits {
                max_depth: Some(32),
                max_items_per_dir: Some(500),
                skip_hidden: false,
                skip_packages: false,
            },
            deep_limits: TraversalLimits {
                max_depth: None,
                max_items_per_dir: Some(5_000),
                skip_hidden: true,
                skip_packages: true,
            },
            default_shred_passes: 3,
            history_cap: 30,
            threads: 0,
        }
    }
}

impl EngineConfig {
    /// Load from the platform config directory, falling back to defaults.
    pub fn load() -> Self {
        match Self::default_path().and_then(|path| Self::load_from(&path)) {
            Ok(config) => config,
            Err(e) => {
                debug!("Failed to load config, using defaults: {e}");
                Self::default()
            }
        }
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, content).map_err(io_err)
    }

    /// `<config dir>/config.json`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        Ok(project_dirs()?.config_dir().join("config.json"))
    }

    /// Effective worker thread count.
    pub fn worker_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }
}

pub(crate) fn project_dirs() -> Result<ProjectDirs, ConfigError> {
    ProjectDirs::from("com", "diskreclaim", "diskreclaim").ok_or(ConfigError::NoConfigDir)
}

//! Scan history: one summary per scan or cleanup, kept for display trends.
//!
//! History lives behind the [`KeyValueStore`] collaborator. The engine only
//! appends to it; nothing in a scan reads it back.

use crate::config::{project_dirs, ConfigError};
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Key under which the history list is stored.
pub const HISTORY_KEY: &str = "scan_history";

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt history data: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// String key-value persistence.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, HistoryError>;
    fn set(&self, key: &str, value: String) -> Result<(), HistoryError>;
}

/// In-process store, for tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, HistoryError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), HistoryError> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }
}

/// All keys in one JSON object file. Writes go to a sibling temp file
/// first and are renamed over the original.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// `history.json` in the platform data directory.
    pub fn default_location() -> Result<Self, HistoryError> {
        Ok(Self::new(project_dirs()?.data_dir().join("history.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, HistoryError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(source) => Err(HistoryError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<(), HistoryError> {
        let io_err = |source| HistoryError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(values)?).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, HistoryError> {
        let _guard = self.lock.lock();
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: String) -> Result<(), HistoryError> {
        let _guard = self.lock.lock();
        let mut values = self.read_all()?;
        values.insert(key.to_string(), value);
        self.write_all(&values)
    }
}

/// One recorded scan or cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub timestamp: DateTime<Utc>,
    /// What ran ("junk", "duplicates", "shred", ...).
    pub label: String,
    /// Bytes the scan found.
    pub total_found: u64,
    /// Bytes an action reclaimed.
    pub total_cleaned: u64,
}

impl ScanSummary {
    pub fn now(label: impl Into<String>, total_found: u64, total_cleaned: u64) -> Self {
        Self {
            timestamp: Utc::now(),
            label: label.into(),
            total_found,
            total_cleaned,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// Capped, append-only list of [`ScanSummary`] entries.
pub struct HistoryLog<S: KeyValueStore> {
    store: S,
    cap: usize,
}

impl<S: KeyValueStore> HistoryLog<S> {
    pub fn new(store: S, cap: usize) -> Self {
        Self { store, cap }
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> Result<Vec<ScanSummary>, HistoryError> {
        match self.store.get(HISTORY_KEY)? {
            Some(text) => Ok(serde_json::from_str(&text)?),
            None => Ok(Vec::new()),
        }
    }

    /// Append `summary`, dropping the oldest entries beyond the cap.
    pub fn record(&self, summary: ScanSummary) -> Result<(), HistoryError> {
        let mut entries = self.entries()?;
        entries.push(summary);
        entries.sort_by_key(|e| e.timestamp);
        if entries.len() > self.cap {
            let excess = entries.len() - self.cap;
            entries.drain(..excess);
        }
        debug!("History now holds {} entries", entries.len());
        self.store.set(HISTORY_KEY, serde_json::to_string(&entries)?)
    }

    /// Entries grouped by calendar day (UTC).
    pub fn by_date(&self) -> Result<BTreeMap<NaiveDate, Vec<ScanSummary>>, HistoryError> {
        let mut days: BTreeMap<NaiveDate, Vec<ScanSummary>> = BTreeMap::new();
        for entry in self.entries()? {
            days.entry(entry.date()).or_default().push(entry);
        }
        Ok(days)
    }

    pub fn total_cleaned(&self) -> Result<u64, HistoryError> {
        Ok(self.entries()?.iter().map(|e| e.total_cleaned).sum())
    }
}

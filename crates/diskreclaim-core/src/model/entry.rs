/// Candidate entries and result rows produced by the scan pipeline.
use crate::analysis::Category;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// One enumerated path, before sizing and classification.
///
/// Files carry their raw length; directories carry `None` until the size
/// accountant aggregates them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateEntry {
    pub path: PathBuf,
    pub size: Option<u64>,
    pub modified: Option<SystemTime>,
    pub is_dir: bool,
}

impl CandidateEntry {
    pub fn file(path: PathBuf, size: u64, modified: Option<SystemTime>) -> Self {
        Self {
            path,
            size: Some(size),
            modified,
            is_dir: false,
        }
    }

    pub fn dir(path: PathBuf, modified: Option<SystemTime>) -> Self {
        Self {
            path,
            size: None,
            modified,
            is_dir: true,
        }
    }

    /// Final path component, or the whole path when there is none.
    pub fn name(&self) -> String {
        display_name(&self.path)
    }
}

/// A sized, classified scan result.
///
/// `selected` belongs to whoever holds the published snapshot; the pipeline
/// only sets its initial value from the scanner's selection policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResultItem {
    pub entry: CandidateEntry,
    pub category: Category,
    pub size: u64,
    pub selected: bool,
}

impl ScanResultItem {
    pub fn new(entry: CandidateEntry, category: Category, size: u64, selected: bool) -> Self {
        Self {
            entry,
            category,
            size,
            selected,
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.entry.path
    }

    pub fn name(&self) -> String {
        self.entry.name()
    }
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

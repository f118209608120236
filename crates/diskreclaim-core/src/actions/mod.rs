/// Destructive actions over a selection: move to trash, permanent delete
/// and shred, with per-item failure accounting.
pub mod coordinator;
pub mod delete;

pub use coordinator::{execute, Coordinator, RefreshPlan, Refreshed, Selection, Target};
pub use delete::{delete_to_trash, is_in_trash, permanent_delete, remove, DeleteError, Deleted};

use crate::model::entry::display_name;
use crate::model::size::format_size;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How selected items are removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionMode {
    /// Recoverable. Falls back to permanent delete when the trash is
    /// unavailable.
    Trash,
    PermanentDelete,
    /// Overwrite then unlink. Never goes through the trash.
    Shred { passes: u32 },
}

impl ActionMode {
    pub fn verb(self) -> &'static str {
        match self {
            Self::Trash => "Moving to trash",
            Self::PermanentDelete => "Deleting",
            Self::Shred { .. } => "Shredding",
        }
    }
}

/// One item the action could not process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionFailure {
    /// Display name of the item.
    pub item: String,
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of one action over a selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionResult {
    pub succeeded: usize,
    pub failed: usize,
    /// Items not attempted because the action was cancelled.
    pub skipped: usize,
    pub bytes_reclaimed: u64,
    pub failures: Vec<ActionFailure>,
}

impl ActionResult {
    pub(crate) fn record_success(&mut self, bytes: u64) {
        self.succeeded += 1;
        self.bytes_reclaimed += bytes;
    }

    pub(crate) fn record_failure(&mut self, path: &Path, reason: String) {
        self.failed += 1;
        self.failures.push(ActionFailure {
            item: display_name(path),
            path: path.to_path_buf(),
            reason,
        });
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }

    /// "N succeeded, M failed", plus what was reclaimed.
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} succeeded, {} failed, {} reclaimed",
            self.succeeded,
            self.failed,
            format_size(self.bytes_reclaimed)
        );
        if self.skipped > 0 {
            summary.push_str(&format!(", {} skipped", self.skipped));
        }
        summary
    }
}

/// Selection state over a published snapshot, and the action that
/// consumes it.
///
/// The coordinator owns the `selected` flags once a scan has published its
/// result. After an action it starts a fresh scan with the same parameters
/// instead of patching the list locally, so what is shown next is what is
/// actually on disk.
use super::delete::remove;
use super::{ActionMode, ActionResult};
use crate::analysis::duplicates::{DedupOptions, DedupOutcome, DuplicateGroup};
use crate::erase::shred_files;
use crate::model::entry::display_name;
use crate::model::ScanResultItem;
use crate::scanner::progress::{MonotonicProgress, ProgressSink};
use crate::scanner::{ScanError, ScanHandle, ScanOutcome, ScanRequest, ScanRoot, Scanner};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;
use tracing::{info, warn};

/// The selectable rows of one snapshot.
#[derive(Debug, Clone)]
pub enum Selection {
    Items(Vec<ScanResultItem>),
    Groups(Vec<DuplicateGroup>),
}

/// One item an action will process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub path: PathBuf,
    pub size: u64,
    /// Modification time seen by the scan, re-checked before deleting.
    pub modified: Option<SystemTime>,
}

impl Selection {
    pub fn select_all(&mut self) {
        self.set_all(true);
    }

    pub fn deselect_all(&mut self) {
        self.set_all(false);
    }

    fn set_all(&mut self, selected: bool) {
        match self {
            Self::Items(items) => items.iter_mut().for_each(|i| i.selected = selected),
            Self::Groups(groups) => groups
                .iter_mut()
                .flat_map(|g| g.members.iter_mut())
                .for_each(|m| m.selected = selected && !m.is_original),
        }
    }

    /// Flip the row at `path` and return its new state. A duplicate
    /// group's original stays deselected. `None` if no row has that path.
    pub fn toggle(&mut self, path: &Path) -> Option<bool> {
        match self {
            Self::Items(items) => {
                let item = items.iter_mut().find(|i| i.path() == path)?;
                item.selected = !item.selected;
                Some(item.selected)
            }
            Self::Groups(groups) => {
                let member = groups
                    .iter_mut()
                    .flat_map(|g| g.members.iter_mut())
                    .find(|m| m.path == path)?;
                if !member.is_original {
                    member.selected = !member.selected;
                }
                Some(member.selected)
            }
        }
    }

    /// Bytes the selected rows occupy.
    pub fn selected_total(&self) -> u64 {
        self.targets().iter().map(|t| t.size).sum()
    }

    pub fn selected_count(&self) -> usize {
        match self {
            Self::Items(items) => items.iter().filter(|i| i.selected).count(),
            Self::Groups(groups) => groups
                .iter()
                .flat_map(|g| &g.members)
                .filter(|m| m.selected)
                .count(),
        }
    }

    /// The selected rows, in display order.
    pub fn targets(&self) -> Vec<Target> {
        match self {
            Self::Items(items) => items
                .iter()
                .filter(|i| i.selected)
                .map(|i| Target {
                    path: i.entry.path.clone(),
                    size: i.size,
                    modified: i.entry.modified,
                })
                .collect(),
            Self::Groups(groups) => groups
                .iter()
                .flat_map(|g| {
                    g.members
                        .iter()
                        .filter(|m| m.selected && !m.is_original)
                        .map(move |m| Target {
                            path: m.path.clone(),
                            size: g.size,
                            modified: m.modified,
                        })
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Items(items) => items.len(),
            Self::Groups(groups) => groups.iter().map(|g| g.members.len()).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run `mode` over `targets`. Every target is attempted independently;
/// cancellation is honoured between targets.
pub fn execute(
    targets: &[Target],
    mode: ActionMode,
    sink: &dyn ProgressSink,
    cancel_flag: &AtomicBool,
) -> ActionResult {
    info!("{} {} item(s)", mode.verb(), targets.len());

    if let ActionMode::Shred { passes } = mode {
        let paths: Vec<PathBuf> = targets.iter().map(|t| t.path.clone()).collect();
        return shred_files(&paths, passes, sink, cancel_flag);
    }

    let progress = MonotonicProgress::new(sink);
    let permanent = mode == ActionMode::PermanentDelete;
    let total = targets.len().max(1) as f64;
    let mut result = ActionResult::default();

    for (i, target) in targets.iter().enumerate() {
        if cancel_flag.load(Ordering::Relaxed) {
            result.skipped = targets.len() - i;
            break;
        }
        progress.report(
            i as f64 / total,
            &format!("{} {}", mode.verb(), display_name(&target.path)),
        );
        match remove(&target.path, target.modified, permanent) {
            Ok(_) => result.record_success(target.size),
            Err(err) => {
                warn!("{err}");
                result.record_failure(&target.path, err.to_string());
            }
        }
    }

    progress.report(1.0, &result.summary());
    info!("Action finished: {}", result.summary());
    result
}

/// How to reproduce the snapshot a selection came from.
#[derive(Debug, Clone)]
pub enum RefreshPlan {
    Scan(ScanRequest),
    Duplicates {
        roots: Vec<ScanRoot>,
        options: DedupOptions,
    },
}

/// The rescan started after an action.
pub enum Refreshed {
    Scan(ScanHandle<ScanOutcome>),
    Duplicates(ScanHandle<DedupOutcome>),
}

/// A selection plus the scan that produced it.
#[derive(Debug, Clone)]
pub struct Coordinator {
    pub selection: Selection,
    refresh: RefreshPlan,
}

impl Coordinator {
    pub fn for_scan(request: ScanRequest, outcome: ScanOutcome) -> Self {
        Self {
            selection: Selection::Items(outcome.items),
            refresh: RefreshPlan::Scan(request),
        }
    }

    pub fn for_duplicates(roots: Vec<ScanRoot>, options: DedupOptions, outcome: DedupOutcome) -> Self {
        Self {
            selection: Selection::Groups(outcome.groups),
            refresh: RefreshPlan::Duplicates { roots, options },
        }
    }

    /// Apply `mode` to the selected rows.
    pub fn act(&self, mode: ActionMode, sink: &dyn ProgressSink, cancel_flag: &AtomicBool) -> ActionResult {
        execute(&self.selection.targets(), mode, sink, cancel_flag)
    }

    /// Start the scan that produced this selection again.
    pub fn refresh(&self, scanner: &Scanner) -> Result<Refreshed, ScanError> {
        match &self.refresh {
            RefreshPlan::Scan(request) => scanner.start(request.clone()).map(Refreshed::Scan),
            RefreshPlan::Duplicates { roots, options } => scanner
                .start_duplicates(roots.clone(), options.clone())
                .map(Refreshed::Duplicates),
        }
    }

    /// [`act`](Self::act), then [`refresh`](Self::refresh).
    pub fn act_and_refresh(
        &self,
        scanner: &Scanner,
        mode: ActionMode,
        sink: &dyn ProgressSink,
        cancel_flag: &AtomicBool,
    ) -> (ActionResult, Result<Refreshed, ScanError>) {
        let result = self.act(mode, sink, cancel_flag);
        (result, self.refresh(scanner))
    }
}

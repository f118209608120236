/// The generic scan pipeline shared by every concrete scanner:
/// enumerate → filter → size → classify → collect → sort.
///
/// Roots are processed in the order supplied. Root `i` of `N` owns the
/// progress slice `[i/N, (i+1)/N]`. Cancellation is checked before each
/// candidate is processed, and a cancelled run returns what it had.
use super::accountant::SizeAccountant;
use super::progress::{MonotonicProgress, ProgressSink, RootError};
use super::roots::{check_root, walker, Enumeration, ScanRoot};
use crate::analysis::age::is_older_than;
use crate::analysis::classify;
use crate::model::size::{format_count, format_size};
use crate::model::{CandidateEntry, ScanResultItem};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info, trace, warn};

/// Recursive enumeration reports progress every this many entries.
const RECURSIVE_PROGRESS_INTERVAL: u64 = 500;

/// Children enumeration reports progress every this many candidates.
const CHILDREN_PROGRESS_INTERVAL: usize = 8;

/// Extra predicate applied after the built-in filters.
pub type EntryPredicate = Arc<dyn Fn(&CandidateEntry) -> bool + Send + Sync>;

/// Which candidates a scan keeps.
///
/// Entry-level checks (kind, age, extension, custom predicate) run before
/// sizing; the size threshold runs after, since directory sizes are only
/// known once aggregated.
#[derive(Clone, Default)]
pub struct ScanFilter {
    /// Minimum size in bytes (inclusive).
    pub min_size: u64,
    /// Minimum age in days since last modification (inclusive).
    pub min_age_days: Option<u64>,
    /// Lowercased extension allow-list, without dots.
    pub extensions: Option<Vec<String>>,
    /// Keep directories as candidates (only meaningful for `Children` roots).
    pub include_dirs: bool,
    pub predicate: Option<EntryPredicate>,
}

impl fmt::Debug for ScanFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanFilter")
            .field("min_size", &self.min_size)
            .field("min_age_days", &self.min_age_days)
            .field("extensions", &self.extensions)
            .field("include_dirs", &self.include_dirs)
            .field("predicate", &self.predicate.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl ScanFilter {
    #[must_use]
    pub fn min_size(mut self, bytes: u64) -> Self {
        self.min_size = bytes;
        self
    }

    #[must_use]
    pub fn min_age_days(mut self, days: u64) -> Self {
        self.min_age_days = Some(days);
        self
    }

    #[must_use]
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = Some(
            extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        );
        self
    }

    #[must_use]
    pub fn include_dirs(mut self, include: bool) -> Self {
        self.include_dirs = include;
        self
    }

    #[must_use]
    pub fn predicate(mut self, predicate: impl Fn(&CandidateEntry) -> bool + Send + Sync + 'static) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn accepts_entry(&self, entry: &CandidateEntry, now: SystemTime) -> bool {
        if entry.is_dir && !self.include_dirs {
            return false;
        }
        if let Some(days) = self.min_age_days {
            if !is_older_than(entry.modified, days, now) {
                return false;
            }
        }
        if let Some(allowed) = &self.extensions {
            let ext = entry
                .path
                .extension()
                .map(|e| e.to_string_lossy().to_ascii_lowercase())
                .unwrap_or_default();
            if !allowed.iter().any(|a| *a == ext) {
                return false;
            }
        }
        self.predicate.as_ref().is_none_or(|p| p(entry))
    }

    pub fn accepts_size(&self, size: u64) -> bool {
        size >= self.min_size
    }
}

/// Final ordering of a scan's results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    SizeDescending,
    OldestFirst,
    Path,
}

/// Everything one pipeline run needs.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    /// Short label used in status strings ("junk", "large files", ...).
    pub label: String,
    pub roots: Vec<ScanRoot>,
    pub filter: ScanFilter,
    pub sort: SortKey,
    /// Initial `selected` value for every result.
    pub preselect: bool,
    /// Keep only the first N results after sorting.
    pub max_results: Option<usize>,
}

impl ScanRequest {
    pub fn new(label: impl Into<String>, roots: Vec<ScanRoot>) -> Self {
        Self {
            label: label.into(),
            roots,
            filter: ScanFilter::default(),
            sort: SortKey::default(),
            preselect: false,
            max_results: None,
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: ScanFilter) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn with_sort(mut self, sort: SortKey) -> Self {
        self.sort = sort;
        self
    }

    #[must_use]
    pub fn with_preselect(mut self, preselect: bool) -> Self {
        self.preselect = preselect;
        self
    }

    #[must_use]
    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = Some(max);
        self
    }
}

/// The snapshot a pipeline run publishes.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub items: Vec<ScanResultItem>,
    pub root_errors: Vec<RootError>,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl ScanOutcome {
    pub fn total_size(&self) -> u64 {
        self.items.iter().map(|i| i.size).sum()
    }

    /// `true` if every root failed, as opposed to roots that simply held
    /// nothing matching.
    pub fn all_roots_failed(&self, root_count: usize) -> bool {
        root_count > 0 && self.root_errors.len() == root_count
    }
}

/// Run the pipeline synchronously on the calling thread.
///
/// Never fails: per-root problems land in `root_errors`, per-entry I/O
/// errors are skipped.
pub fn run_scan(request: &ScanRequest, sink: &dyn ProgressSink, cancel_flag: &Arc<AtomicBool>) -> ScanOutcome {
    let start = Instant::now();
    let progress = MonotonicProgress::new(sink);
    let now = SystemTime::now();
    let root_count = request.roots.len().max(1) as f64;
    let mut outcome = ScanOutcome::default();

    info!("Starting {} scan over {} root(s)", request.label, request.roots.len());
    progress.report(0.0, &format!("Scanning {}…", request.label));

    for (i, root) in request.roots.iter().enumerate() {
        if cancel_flag.load(Ordering::Relaxed) {
            outcome.cancelled = true;
            break;
        }

        let slice = (i as f64 / root_count, (i + 1) as f64 / root_count);
        if let Err(message) = check_root(&root.path) {
            warn!("Skipping root {}: {message}", root.path.display());
            let error = RootError {
                root: root.path.clone(),
                message,
            };
            progress.root_error(&error);
            outcome.root_errors.push(error);
            progress.report(slice.1, &format!("Skipped {}", root.path.display()));
            continue;
        }

        let accountant = SizeAccountant::new(root.limits).with_cancel_flag(cancel_flag.clone());
        let mut ctx = RootScan {
            request,
            root,
            accountant,
            progress: &progress,
            slice,
            now,
            cancel_flag,
            items: &mut outcome.items,
        };
        let completed = match root.enumeration {
            Enumeration::Children => ctx.scan_children(),
            Enumeration::Recursive => ctx.scan_recursive(),
        };
        if !completed {
            outcome.cancelled = true;
            break;
        }
        progress.report(slice.1, &format!("Scanned {}", root.path.display()));
    }

    sort_items(&mut outcome.items, request.sort);
    if let Some(max) = request.max_results {
        outcome.items.truncate(max);
    }
    outcome.elapsed = start.elapsed();

    let summary = format!(
        "Found {} item(s), {}",
        format_count(outcome.items.len() as u64),
        format_size(outcome.total_size())
    );
    if outcome.cancelled {
        info!("{} scan cancelled: {summary}", request.label);
    } else {
        debug!("{} scan finished in {:?}: {summary}", request.label, outcome.elapsed);
        progress.report(1.0, &summary);
    }
    outcome
}

fn sort_items(items: &mut [ScanResultItem], key: SortKey) {
    match key {
        SortKey::SizeDescending => items.sort_by(|a, b| {
            b.size
                .cmp(&a.size)
                .then_with(|| a.entry.path.cmp(&b.entry.path))
        }),
        SortKey::OldestFirst => items.sort_by(|a, b| {
            // Missing timestamps sort last.
            let key = |i: &ScanResultItem| (i.entry.modified.is_none(), i.entry.modified);
            key(a).cmp(&key(b)).then_with(|| a.entry.path.cmp(&b.entry.path))
        }),
        SortKey::Path => items.sort_by(|a, b| a.entry.path.cmp(&b.entry.path)),
    }
}

/// State for scanning one root.
struct RootScan<'a, 'p> {
    request: &'a ScanRequest,
    root: &'a ScanRoot,
    accountant: SizeAccountant,
    progress: &'a MonotonicProgress<'p>,
    slice: (f64, f64),
    now: SystemTime,
    cancel_flag: &'a AtomicBool,
    items: &'a mut Vec<ScanResultItem>,
}

impl RootScan<'_, '_> {
    fn cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    /// Offer one candidate. Returns `false` if the scan was cancelled
    /// before the candidate could be recorded.
    fn offer(&mut self, entry: CandidateEntry) -> bool {
        if !self.request.filter.accepts_entry(&entry, self.now) {
            return true;
        }
        let size = match entry.size {
            Some(size) => size,
            None => self.accountant.size_of(&entry.path),
        };
        // Sizing may have been cut short by cancellation; never record a
        // partially sized item.
        if self.cancelled() {
            return false;
        }
        if !self.request.filter.accepts_size(size) {
            return true;
        }
        let category = classify(&entry.path);
        self.items.push(ScanResultItem::new(
            entry,
            category,
            size,
            self.request.preselect,
        ));
        true
    }

    /// Each direct child is one candidate. Returns `false` on cancellation.
    fn scan_children(&mut self) -> bool {
        let limits = self.root.limits.with_max_depth(1);
        let children: Vec<CandidateEntry> = walker(&self.root.path, limits, 1, None)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) if entry.depth == 1 => candidate_from(&entry),
                Ok(_) => None,
                Err(err) => {
                    trace!("Skipping unreadable child: {err}");
                    None
                }
            })
            .collect();

        let total = children.len().max(1) as f64;
        for (n, entry) in children.into_iter().enumerate() {
            if self.cancelled() {
                return false;
            }
            if n % CHILDREN_PROGRESS_INTERVAL == 0 {
                let status = format!("Sizing {}", entry.name());
                self.progress
                    .report_in(self.slice.0, self.slice.1, n as f64 / total, &status);
            }
            if !self.offer(entry) {
                return false;
            }
        }
        true
    }

    /// Every file below the root is a candidate. The total is unknown up
    /// front, so local progress approaches the end of the slice
    /// asymptotically. Returns `false` on cancellation.
    fn scan_recursive(&mut self) -> bool {
        let mut seen: u64 = 0;
        for entry in walker(&self.root.path, self.root.limits, 1, None) {
            if self.cancelled() {
                return false;
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    trace!("Skipping unreadable entry: {err}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            seen += 1;
            if seen % RECURSIVE_PROGRESS_INTERVAL == 0 {
                let local = 1.0 - 1.0 / (1.0 + seen as f64 / 5_000.0);
                let status = format!(
                    "Scanning {} ({} files, {} found)",
                    self.root.path.display(),
                    format_count(seen),
                    format_count(self.items.len() as u64)
                );
                self.progress
                    .report_in(self.slice.0, self.slice.1, local, &status);
            }
            if let Some(candidate) = candidate_from(&entry) {
                if !self.offer(candidate) {
                    return false;
                }
            }
        }
        true
    }
}

fn candidate_from(entry: &jwalk::DirEntry<((), ())>) -> Option<CandidateEntry> {
    let path = entry.path();
    match entry.metadata() {
        Ok(meta) if meta.is_dir() => Some(CandidateEntry::dir(path, meta.modified().ok())),
        Ok(meta) => Some(CandidateEntry::file(path, meta.len(), meta.modified().ok())),
        Err(err) => {
            trace!("Skipping {}: {err}", path.display());
            None
        }
    }
}

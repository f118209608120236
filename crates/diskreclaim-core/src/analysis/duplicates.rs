/// Duplicate file detection: size buckets first, content fingerprints second.
///
/// 1. Walk the roots (bounded per-directory item count), drop files below
///    `min_size`, bucket the rest by exact byte length, and discard buckets
///    with fewer than two members before any file is opened.
/// 2. Fingerprint each bucket member with SHA-256 over its first
///    `prefix_len` bytes and regroup by fingerprint.
/// 3. Optionally, when `verify_full_hash` is set, re-hash the whole content
///    of every prefix match and regroup again.
///
/// Prefix hashing alone is a deliberate heuristic: two files of equal size
/// that share their first `prefix_len` bytes but differ later are reported
/// as duplicates. `verify_full_hash` removes that risk at the cost of
/// reading every candidate in full. Files no longer than the prefix are
/// fully covered by it either way.
///
/// The "original" of a group is the member with the oldest modification
/// time, ties broken by path. Members without a timestamp never win while
/// any member has one.
use crate::model::entry::display_name;
use crate::model::size::{format_count, format_size};
use crate::scanner::progress::{MonotonicProgress, ProgressSink, RootError};
use crate::scanner::roots::{check_root, walker, ScanRoot};
use rayon::prelude::*;
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info, trace, warn};

/// Share of the progress range spent bucketing by size.
const BUCKET_PHASE_END: f64 = 0.3;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// A SHA-256 content digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(pub [u8; 32]);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One member of a duplicate group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateFile {
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
    pub is_original: bool,
    /// Always `false` for the original.
    pub selected: bool,
}

impl DuplicateFile {
    pub fn name(&self) -> String {
        display_name(&self.path)
    }
}

/// Files with identical size and fingerprint.
///
/// Invariants: at least two members, exactly one `is_original`, and the
/// original is never selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub fingerprint: Fingerprint,
    pub size: u64,
    pub members: Vec<DuplicateFile>,
}

impl DuplicateGroup {
    /// Bytes reclaimable by keeping only one copy.
    pub fn wasted_space(&self) -> u64 {
        self.size * (self.members.len() as u64).saturating_sub(1)
    }

    pub fn original(&self) -> Option<&DuplicateFile> {
        self.members.iter().find(|m| m.is_original)
    }

    /// Order members oldest first (path order on ties) and mark the first
    /// as the original. Members are deselected.
    fn from_members(fingerprint: Fingerprint, size: u64, mut files: Vec<FileRecord>) -> Self {
        files.sort_by(|a, b| {
            let key = |f: &FileRecord| (f.modified.is_none(), f.modified);
            key(a).cmp(&key(b)).then_with(|| a.path.cmp(&b.path))
        });
        let members = files
            .into_iter()
            .enumerate()
            .map(|(i, f)| DuplicateFile {
                path: f.path,
                modified: f.modified,
                is_original: i == 0,
                selected: false,
            })
            .collect();
        Self {
            fingerprint,
            size,
            members,
        }
    }
}

/// Deduplication tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupOptions {
    /// Files smaller than this are ignored.
    pub min_size: u64,
    /// Bytes fingerprinted from the start of each file. `0` turns the
    /// prefix stage off: every candidate is then hashed in full.
    pub prefix_len: usize,
    /// Confirm prefix matches by hashing the full content.
    pub verify_full_hash: bool,
    /// Hashing threads.
    pub threads: usize,
}

impl Default for DedupOptions {
    fn default() -> Self {
        Self {
            min_size: 10 * 1024,
            prefix_len: 64 * 1024,
            verify_full_hash: false,
            threads: num_cpus::get(),
        }
    }
}

impl DedupOptions {
    /// Whether a prefix match between files of `size` bytes must be
    /// confirmed by hashing the whole content.
    pub fn needs_full_hash(&self, size: u64) -> bool {
        size > self.prefix_len as u64 && (self.verify_full_hash || self.prefix_len == 0)
    }

    pub fn from_config(config: &crate::config::EngineConfig) -> Self {
        Self {
            min_size: config.duplicate_min_size,
            prefix_len: config.duplicate_prefix_bytes,
            verify_full_hash: config.verify_full_hash,
            threads: config.worker_threads(),
        }
    }
}

/// The snapshot a deduplication run publishes.
#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    /// Sorted by wasted space, largest first.
    pub groups: Vec<DuplicateGroup>,
    pub files_scanned: u64,
    pub files_hashed: u64,
    /// Files that could not be read for hashing and were left out.
    pub unreadable: u64,
    pub root_errors: Vec<RootError>,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl DedupOutcome {
    pub fn wasted_space(&self) -> u64 {
        self.groups.iter().map(DuplicateGroup::wasted_space).sum()
    }
}

#[derive(Debug, Clone)]
struct FileRecord {
    path: PathBuf,
    modified: Option<SystemTime>,
}

/// Find duplicate files under `roots`.
///
/// Cancellation is checked per enumerated entry and between size buckets;
/// a cancelled run returns the groups confirmed so far.
pub fn find_duplicates(
    roots: &[ScanRoot],
    options: &DedupOptions,
    sink: &dyn ProgressSink,
    cancel_flag: &AtomicBool,
) -> DedupOutcome {
    let start = Instant::now();
    let progress = MonotonicProgress::new(sink);
    let mut outcome = DedupOutcome::default();

    info!("Finding duplicates over {} root(s)", roots.len());
    progress.report(0.0, "Grouping files by size…");

    let buckets = match bucket_by_size(roots, options, &progress, cancel_flag, &mut outcome) {
        Some(buckets) => buckets,
        None => {
            outcome.cancelled = true;
            outcome.elapsed = start.elapsed();
            return outcome;
        }
    };

    let candidates: u64 = buckets.values().map(|b| b.len() as u64).sum();
    debug!(
        "{} files scanned, {} candidates in {} size buckets",
        outcome.files_scanned,
        candidates,
        buckets.len()
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.threads.max(1))
        .thread_name(|i| format!("diskreclaim-hash-{i}"))
        .build();
    let pool = match pool {
        Ok(pool) => Some(pool),
        Err(e) => {
            warn!("Failed to build hashing pool, using the global pool: {e}");
            None
        }
    };

    let unreadable = AtomicU64::new(0);
    let mut hashed: u64 = 0;
    for (size, files) in buckets.into_iter().rev() {
        if cancel_flag.load(Ordering::Relaxed) {
            outcome.cancelled = true;
            break;
        }

        let status = format!(
            "Comparing {} files of {} ({} of {})",
            files.len(),
            format_size(size),
            format_count(hashed),
            format_count(candidates)
        );
        progress.report_in(
            BUCKET_PHASE_END,
            1.0,
            hashed as f64 / candidates.max(1) as f64,
            &status,
        );
        hashed += files.len() as u64;

        let prefix_len = options.prefix_len;
        let by_prefix = regroup(
            install(pool.as_ref(), || {
                files
                    .par_iter()
                    .map(|f| (f.clone(), hash_prefix(&f.path, prefix_len)))
                    .collect()
            }),
            &unreadable,
        );
        outcome.files_hashed += files.len() as u64;

        let needs_full = options.needs_full_hash(size);
        for (fingerprint, members) in by_prefix {
            if !needs_full {
                outcome
                    .groups
                    .push(DuplicateGroup::from_members(fingerprint, size, members));
                continue;
            }
            let confirmed = regroup(
                install(pool.as_ref(), || {
                    members
                        .par_iter()
                        .map(|f| (f.clone(), hash_full(&f.path)))
                        .collect()
                }),
                &unreadable,
            );
            for (fingerprint, members) in confirmed {
                outcome
                    .groups
                    .push(DuplicateGroup::from_members(fingerprint, size, members));
            }
        }
    }

    outcome.unreadable = unreadable.into_inner();
    outcome.groups.sort_by(|a, b| {
        b.wasted_space()
            .cmp(&a.wasted_space())
            .then_with(|| b.size.cmp(&a.size))
            .then_with(|| a.members[0].path.cmp(&b.members[0].path))
    });
    outcome.elapsed = start.elapsed();

    let summary = format!(
        "{} duplicate group(s), {} reclaimable",
        format_count(outcome.groups.len() as u64),
        format_size(outcome.wasted_space())
    );
    if outcome.cancelled {
        info!("Duplicate search cancelled: {summary}");
    } else {
        info!("Duplicate search finished in {:?}: {summary}", outcome.elapsed);
        progress.report(1.0, &summary);
    }
    outcome
}

/// Phase 1. Returns `None` on cancellation.
fn bucket_by_size(
    roots: &[ScanRoot],
    options: &DedupOptions,
    progress: &MonotonicProgress<'_>,
    cancel_flag: &AtomicBool,
    outcome: &mut DedupOutcome,
) -> Option<BTreeMap<u64, Vec<FileRecord>>> {
    let mut buckets: BTreeMap<u64, Vec<FileRecord>> = BTreeMap::new();
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let root_count = roots.len().max(1) as f64;

    for (i, root) in roots.iter().enumerate() {
        if let Err(message) = check_root(&root.path) {
            warn!("Skipping root {}: {message}", root.path.display());
            let error = RootError {
                root: root.path.clone(),
                message,
            };
            progress.root_error(&error);
            outcome.root_errors.push(error);
            continue;
        }

        for entry in walker(&root.path, root.limits, 1, None) {
            if cancel_flag.load(Ordering::Relaxed) {
                return None;
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
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            outcome.files_scanned += 1;
            if meta.len() < options.min_size.max(1) {
                continue;
            }
            let path = entry.path();
            if !seen.insert(path.clone()) {
                continue;
            }
            buckets.entry(meta.len()).or_default().push(FileRecord {
                path,
                modified: meta.modified().ok(),
            });
        }

        progress.report(
            BUCKET_PHASE_END * (i + 1) as f64 / root_count,
            &format!("Grouped {} files by size", format_count(outcome.files_scanned)),
        );
    }

    buckets.retain(|_, files| files.len() >= 2);
    Some(buckets)
}

fn install<R: Send>(pool: Option<&rayon::ThreadPool>, job: impl FnOnce() -> R + Send) -> R {
    match pool {
        Some(pool) => pool.install(job),
        None => job(),
    }
}

/// Group hashed files by fingerprint, keeping groups of two or more.
/// Groups come back in fingerprint order.
fn regroup(
    hashed: Vec<(FileRecord, io::Result<Fingerprint>)>,
    unreadable: &AtomicU64,
) -> Vec<(Fingerprint, Vec<FileRecord>)> {
    let mut groups: HashMap<Fingerprint, Vec<FileRecord>> = HashMap::new();
    for (file, result) in hashed {
        match result {
            Ok(fingerprint) => groups.entry(fingerprint).or_default().push(file),
            Err(err) => {
                unreadable.fetch_add(1, Ordering::Relaxed);
                debug!("Cannot hash {}: {err}", file.path.display());
            }
        }
    }
    let mut groups: Vec<_> = groups.into_iter().filter(|(_, f)| f.len() >= 2).collect();
    groups.sort_by(|a, b| a.0.cmp(&b.0));
    groups
}

/// SHA-256 of the first `len` bytes of a file.
pub fn hash_prefix(path: &Path, len: usize) -> io::Result<Fingerprint> {
    hash_reader(File::open(path)?.take(len as u64))
}

/// SHA-256 of a file's full content.
pub fn hash_full(path: &Path) -> io::Result<Fingerprint> {
    hash_reader(File::open(path)?)
}

fn hash_reader(mut reader: impl Read) -> io::Result<Fingerprint> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..n]);
    }
    Ok(Fingerprint(hasher.finalize().into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::progress::NoProgress;
    use crate::scanner::roots::TraversalLimits;
    use filetime::{set_file_mtime, FileTime};
    use std::io::Write;
    use tempfile::TempDir;

    fn write(path: &Path, bytes: &[u8]) {
        let mut f = File::create(path).unwrap();
        f.write_all(bytes).unwrap();
    }

    fn options(min_size: u64) -> DedupOptions {
        DedupOptions {
            min_size,
            prefix_len: 64 * 1024,
            verify_full_hash: false,
            threads: 2,
        }
    }

    fn roots(path: &Path) -> Vec<ScanRoot> {
        vec![ScanRoot::recursive(path, TraversalLimits::unbounded())]
    }

    #[test]
    fn identical_files_form_one_group() {
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join("x"), &[1u8; 4096]);
        write(&tmp.path().join("y"), &[1u8; 4096]);
        write(&tmp.path().join("z"), &[2u8; 4096]);

        let outcome = find_duplicates(
            &roots(tmp.path()),
            &options(1024),
            &NoProgress,
            &AtomicBool::new(false),
        );

        assert_eq!(outcome.groups.len(), 1);
        let group = &outcome.groups[0];
        assert_eq!(group.size, 4096);
        assert_eq!(group.wasted_space(), 4096);
        let names: HashSet<String> = group.members.iter().map(DuplicateFile::name).collect();
        assert_eq!(names, HashSet::from(["x".to_string(), "y".to_string()]));
        assert_eq!(outcome.files_hashed, 3);
    }

    #[test]
    fn unique_sizes_are_never_hashed() {
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join("a"), &[1u8; 2000]);
        write(&tmp.path().join("b"), &[1u8; 3000]);

        let outcome = find_duplicates(
            &roots(tmp.path()),
            &options(1),
            &NoProgress,
            &AtomicBool::new(false),
        );
        assert!(outcome.groups.is_empty());
        assert_eq!(outcome.files_hashed, 0);
        assert_eq!(outcome.files_scanned, 2);
    }

    #[test]
    fn files_below_min_size_are_ignored() {
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join("a"), &[1u8; 100]);
        write(&tmp.path().join("b"), &[1u8; 100]);

        let outcome = find_duplicates(
            &roots(tmp.path()),
            &options(10 * 1024),
            &NoProgress,
            &AtomicBool::new(false),
        );
        assert!(outcome.groups.is_empty());
    }

    #[test]
    fn oldest_member_is_original_and_deselected() {
        let tmp = TempDir::new().unwrap();
        let (a, b, c) = (tmp.path().join("a"), tmp.path().join("b"), tmp.path().join("c"));
        for p in [&a, &b, &c] {
            write(p, &[9u8; 2048]);
        }
        set_file_mtime(&a, FileTime::from_unix_time(3_000, 0)).unwrap();
        set_file_mtime(&b, FileTime::from_unix_time(1_000, 0)).unwrap();
        set_file_mtime(&c, FileTime::from_unix_time(2_000, 0)).unwrap();

        let outcome = find_duplicates(
            &roots(tmp.path()),
            &options(1),
            &NoProgress,
            &AtomicBool::new(false),
        );
        let group = &outcome.groups[0];
        assert_eq!(group.members.iter().filter(|m| m.is_original).count(), 1);
        assert_eq!(group.original().unwrap().path, b);
        assert!(group.members.iter().all(|m| !m.selected));
        assert_eq!(group.members[1].path, c);
        assert_eq!(group.wasted_space(), 2 * 2048);
    }

    #[test]
    fn equal_mtimes_fall_back_to_path_order() {
        let tmp = TempDir::new().unwrap();
        let (a, b) = (tmp.path().join("a"), tmp.path().join("b"));
        write(&b, &[3u8; 512]);
        write(&a, &[3u8; 512]);
        for p in [&a, &b] {
            set_file_mtime(p, FileTime::from_unix_time(5_000, 0)).unwrap();
        }

        let outcome = find_duplicates(
            &roots(tmp.path()),
            &options(1),
            &NoProgress,
            &AtomicBool::new(false),
        );
        assert_eq!(outcome.groups[0].original().unwrap().path, a);
    }

    #[test]
    fn shared_prefix_needs_full_hash_to_split() {
        let tmp = TempDir::new().unwrap();
        let mut left = vec![0u8; 8192];
        let mut right = vec![0u8; 8192];
        left[8000] = 1;
        right[8000] = 2;
        write(&tmp.path().join("left"), &left);
        write(&tmp.path().join("right"), &right);

        let mut opts = options(1);
        opts.prefix_len = 4096;
        let prefix_only =
            find_duplicates(&roots(tmp.path()), &opts, &NoProgress, &AtomicBool::new(false));
        assert_eq!(prefix_only.groups.len(), 1);

        opts.verify_full_hash = true;
        let verified =
            find_duplicates(&roots(tmp.path()), &opts, &NoProgress, &AtomicBool::new(false));
        assert!(verified.groups.is_empty());
    }

    #[test]
    fn zero_prefix_length_compares_whole_content() {
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join("ones"), &[1u8; 20_000]);
        write(&tmp.path().join("ones-copy"), &[1u8; 20_000]);
        write(&tmp.path().join("twos"), &[2u8; 20_000]);

        let opts = DedupOptions {
            min_size: 1,
            prefix_len: 0,
            verify_full_hash: false,
            threads: 2,
        };
        assert!(opts.needs_full_hash(20_000));
        let outcome =
            find_duplicates(&roots(tmp.path()), &opts, &NoProgress, &AtomicBool::new(false));

        assert_eq!(outcome.groups.len(), 1);
        assert_eq!(outcome.wasted_space(), 20_000);
        let names: HashSet<String> =
            outcome.groups[0].members.iter().map(DuplicateFile::name).collect();
        assert_eq!(
            names,
            HashSet::from(["ones".to_string(), "ones-copy".to_string()])
        );
    }

    #[test]
    fn full_hash_only_when_prefix_does_not_cover_the_file() {
        let mut opts = options(1);
        opts.prefix_len = 4096;
        assert!(!opts.needs_full_hash(8192));
        opts.verify_full_hash = true;
        assert!(opts.needs_full_hash(8192));
        assert!(!opts.needs_full_hash(4096));
    }

    #[test]
    fn groups_sorted_by_wasted_space() {
        let tmp = TempDir::new().unwrap();
        for name in ["s1", "s2"] {
            write(&tmp.path().join(name), &[1u8; 1000]);
        }
        for name in ["b1", "b2"] {
            write(&tmp.path().join(name), &[2u8; 5000]);
        }

        let outcome = find_duplicates(
            &roots(tmp.path()),
            &options(1),
            &NoProgress,
            &AtomicBool::new(false),
        );
        assert_eq!(outcome.groups.len(), 2);
        assert_eq!(outcome.groups[0].size, 5000);
        assert_eq!(outcome.wasted_space(), 6000);
    }

    #[test]
    fn overlapping_roots_do_not_duplicate_paths() {
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join("only"), &[1u8; 4096]);
        let both = vec![
            ScanRoot::recursive(tmp.path(), TraversalLimits::unbounded()),
            ScanRoot::recursive(tmp.path(), TraversalLimits::unbounded()),
        ];
        let outcome = find_duplicates(&both, &options(1), &NoProgress, &AtomicBool::new(false));
        assert!(outcome.groups.is_empty());
    }

    #[test]
    fn cancelled_run_returns_no_groups() {
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join("x"), &[1u8; 4096]);
        write(&tmp.path().join("y"), &[1u8; 4096]);
        let outcome = find_duplicates(
            &roots(tmp.path()),
            &options(1),
            &NoProgress,
            &AtomicBool::new(true),
        );
        assert!(outcome.cancelled);
        assert!(outcome.groups.is_empty());
    }

    #[test]
    fn fingerprint_displays_as_hex() {
        let fp = hash_reader(&b"abc"[..]).unwrap();
        assert_eq!(
            fp.to_string(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}

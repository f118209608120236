/// Directory tree scan that feeds the treemap.
///
/// Walks one root with `jwalk` (rayon-backed when `threads > 1`) under the
/// same traversal limits as the scan pipeline and builds an arena
/// [`FileTree`]. Directory sizes are aggregated bottom-up once the walk
/// ends, which is what gives treemap nodes the "weight equals sum of
/// children" invariant.
use super::progress::{MonotonicProgress, ProgressSink};
use super::roots::{walker, TraversalLimits, TruncationLog};
use crate::model::size::format_count;
use crate::model::{FileNode, FileTree, NodeIndex};
use compact_str::CompactString;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Entries between progress updates and cancellation checks.
const UPDATE_INTERVAL: u64 = 1_000;

/// Result of a tree scan.
#[derive(Debug, Clone)]
pub struct TreeScan {
    pub tree: FileTree,
    pub root: NodeIndex,
    pub error_count: u64,
    pub cancelled: bool,
    pub duration: Duration,
}

/// Scan `root_path` into a [`FileTree`].
///
/// Unreadable entries become error placeholder nodes of size 0. A
/// cancelled scan still aggregates what it collected.
pub fn scan_tree(
    root_path: &Path,
    limits: TraversalLimits,
    threads: usize,
    sink: &dyn ProgressSink,
    cancel_flag: &AtomicBool,
) -> TreeScan {
    let start = Instant::now();
    let progress = MonotonicProgress::new(sink);
    let mut tree = FileTree::with_capacity(4_096);
    let root_idx = tree.add_root(root_path);

    let mut dir_map: HashMap<PathBuf, NodeIndex> = HashMap::new();
    dir_map.insert(root_path.to_path_buf(), root_idx);

    let truncations: TruncationLog = Arc::new(Mutex::new(Vec::new()));
    let mut error_count: u64 = 0;
    let mut files_found: u64 = 0;
    let mut counter: u64 = 0;
    let mut cancelled = false;

    for entry_result in walker(root_path, limits, threads, Some(truncations.clone())) {
        counter += 1;
        if counter.is_multiple_of(UPDATE_INTERVAL) {
            if cancel_flag.load(Ordering::Relaxed) {
                cancelled = true;
                break;
            }
            // The total is unknown during a walk; approach 1 asymptotically.
            let local = 1.0 - 1.0 / (1.0 + counter as f64 / 50_000.0);
            progress.report(
                local * 0.95,
                &format!("Mapping {} ({} files)", root_path.display(), format_count(files_found)),
            );
        }

        let entry = match entry_result {
            Ok(entry) => entry,
            Err(err) => {
                error_count += 1;
                if let Some(path) = err.path() {
                    let parent = path.parent().and_then(|p| dir_map.get(p)).copied();
                    if let Some(parent) = parent {
                        let name = path
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default();
                        let idx = tree.add_node(FileNode::new_error(
                            CompactString::new(&name),
                            true,
                            Some(parent),
                        ));
                        tree.add_child(parent, idx);
                    }
                }
                trace!("Unreadable entry: {err}");
                continue;
            }
        };

        let path = entry.path();
        if path == root_path {
            continue;
        }
        let Some(parent_idx) = path.parent().and_then(|p| dir_map.get(p)).copied() else {
            trace!("Parent of {} not mapped, skipping", path.display());
            continue;
        };

        let name = CompactString::new(entry.file_name().to_string_lossy());
        if entry.file_type().is_dir() {
            let mut node = FileNode::new_dir(name, Some(parent_idx));
            node.modified = entry.metadata().ok().and_then(|m| m.modified().ok());
            let idx = tree.add_node(node);
            tree.add_child(parent_idx, idx);
            dir_map.insert(path, idx);
        } else {
            let node = match entry.metadata() {
                Ok(meta) => {
                    files_found += 1;
                    let mut node = FileNode::new_file(name, meta.len(), Some(parent_idx));
                    node.modified = meta.modified().ok();
                    node
                }
                Err(err) => {
                    error_count += 1;
                    trace!("Cannot stat {}: {err}", path.display());
                    FileNode::new_error(name, false, Some(parent_idx))
                }
            };
            let idx = tree.add_node(node);
            tree.add_child(parent_idx, idx);
        }
    }

    for dir in truncations.lock().iter() {
        if let Some(&idx) = dir_map.get(dir) {
            tree.nodes[idx.idx()].truncated = true;
        }
    }

    tree.aggregate_sizes();
    let duration = start.elapsed();
    debug!(
        "Tree scan of {}: {} nodes, {} errors in {duration:?}",
        root_path.display(),
        tree.len(),
        error_count
    );
    if !cancelled {
        progress.report(1.0, &format!("Mapped {}", root_path.display()));
    }

    TreeScan {
        tree,
        root: root_idx,
        error_count,
        cancelled,
        duration,
    }
}

/// End-to-end scanner integration tests.
///
/// These drive the public `Scanner` API against real temporary directories:
/// a background thread is spawned, progress arrives over the crossbeam
/// channel, and the snapshot is read from the terminal message. Nothing is
/// mocked.
use diskreclaim_core::analysis::DedupOptions;
use diskreclaim_core::scanner::{
    run_scan, ScanError, ScanFilter, ScanHandle, ScanProgress, ScanRequest, ScanRoot, Scanner,
    TraversalLimits, PROGRESS_CHANNEL_CAPACITY,
};
use diskreclaim_core::treemap::{layout_nested, Rect, TreemapNode};
use std::fs;
use std::io::Write;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

// ── Helpers ──────────────────────────────────────────────────────────────────

/// ```text
/// root/
///   alpha/
///     a.txt   (100 bytes)
///     b.rs    (200 bytes)
///   beta/
///     c.png   (300 bytes)
///   d.zip     (400 bytes)
/// ```
fn build_test_tree(root: &Path) {
    let alpha = root.join("alpha");
    let beta = root.join("beta");
    fs::create_dir_all(&alpha).unwrap();
    fs::create_dir_all(&beta).unwrap();

    write_bytes(&alpha.join("a.txt"), 100);
    write_bytes(&alpha.join("b.rs"), 200);
    write_bytes(&beta.join("c.png"), 300);
    write_bytes(&root.join("d.zip"), 400);
}

fn write_bytes(path: &Path, n: usize) {
    let mut f = fs::File::create(path).unwrap();
    f.write_all(&vec![0u8; n]).unwrap();
}

fn recursive(root: &Path) -> Vec<ScanRoot> {
    vec![ScanRoot::recursive(root, TraversalLimits::unbounded())]
}

/// Collect every message until the terminal one. Panics after 30 seconds.
fn drain<T>(handle: &ScanHandle<T>) -> (Vec<f64>, ScanProgress<T>) {
    let deadline = Instant::now() + Duration::from_secs(30);
    let mut fractions = Vec::new();
    loop {
        assert!(Instant::now() < deadline, "scanner did not finish within 30 seconds");
        match handle.progress_rx.try_recv() {
            Ok(ScanProgress::Update { fraction, .. }) => fractions.push(fraction),
            Ok(message @ (ScanProgress::Complete(_) | ScanProgress::Cancelled(_))) => {
                return (fractions, message)
            }
            Ok(ScanProgress::RootError(_)) => continue,
            Err(crossbeam_channel::TryRecvError::Empty) => {
                std::thread::sleep(Duration::from_millis(5));
            }
            Err(crossbeam_channel::TryRecvError::Disconnected) => {
                panic!("scanner channel disconnected before the snapshot was sent");
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[test]
fn pipeline_scan_finds_all_files_largest_first() {
    let tmp = TempDir::new().unwrap();
    build_test_tree(tmp.path());

    let scanner = Scanner::new();
    let handle = scanner.start(ScanRequest::new("all", recursive(tmp.path()))).unwrap();
    let (fractions, message) = drain(&handle);

    let ScanProgress::Complete(outcome) = message else {
        panic!("scan was unexpectedly cancelled");
    };
    let sizes: Vec<u64> = outcome.items.iter().map(|i| i.size).collect();
    assert_eq!(sizes, vec![400, 300, 200, 100]);
    assert_eq!(outcome.total_size(), 1_000);

    assert!(fractions.windows(2).all(|w| w[0] <= w[1]), "progress went backwards");
    assert!(fractions.iter().all(|f| (0.0..=1.0).contains(f)));
    assert_eq!(fractions.last().copied(), Some(1.0));
}

#[test]
fn extension_filter_limits_results() {
    let tmp = TempDir::new().unwrap();
    build_test_tree(tmp.path());

    let request = ScanRequest::new("archives", recursive(tmp.path()))
        .with_filter(ScanFilter::default().extensions([".ZIP"]));
    let outcome = Scanner::new().start(request).unwrap().wait().unwrap();
    assert_eq!(outcome.items.len(), 1);
    assert_eq!(outcome.items[0].name(), "d.zip");
}

#[test]
fn failed_roots_are_distinguishable_from_empty_results() {
    let tmp = TempDir::new().unwrap();
    let request = ScanRequest::new(
        "missing",
        vec![ScanRoot::recursive(tmp.path().join("nope"), TraversalLimits::unbounded())],
    );
    let mut handle = Scanner::new().start(request).unwrap();

    let mut root_errors = 0;
    let outcome = handle
        .wait_with(|m| {
            if let ScanProgress::RootError(_) = m {
                root_errors += 1;
            }
        })
        .unwrap();
    assert_eq!(root_errors, 1);
    assert!(outcome.items.is_empty());
    assert!(outcome.all_roots_failed(1));

    let empty = Scanner::new()
        .start(ScanRequest::new("empty", recursive(tmp.path())))
        .unwrap()
        .wait()
        .unwrap();
    assert!(empty.items.is_empty());
    assert!(!empty.all_roots_failed(1));
}

#[test]
fn cancellation_keeps_only_items_recorded_before_the_cancel_point() {
    let tmp = TempDir::new().unwrap();
    for i in 0..40 {
        write_bytes(&tmp.path().join(format!("f{i:02}.bin")), 16);
    }
    let request = ScanRequest::new(
        "cancel midway",
        vec![ScanRoot::children(tmp.path(), TraversalLimits::unbounded())],
    );

    // Children are sized in name order and a "Sizing" update is sent before
    // every eighth candidate. Cancel on the third one, just before f16.
    let cancel = Arc::new(AtomicBool::new(false));
    let sizing_reports = AtomicUsize::new(0);
    let fractions = Mutex::new(Vec::new());
    let sink = |fraction: f64, status: &str| {
        fractions.lock().push(fraction);
        if status.starts_with("Sizing") && sizing_reports.fetch_add(1, Ordering::SeqCst) == 2 {
            cancel.store(true, Ordering::SeqCst);
        }
    };

    let outcome = run_scan(&request, &sink, &cancel);

    assert!(outcome.cancelled);
    assert_eq!(outcome.items.len(), 16);
    let names: Vec<String> = outcome.items.iter().map(|i| i.name()).collect();
    let expected: Vec<String> = (0..16).map(|i| format!("f{i:02}.bin")).collect();
    assert_eq!(names, expected);

    let fractions = fractions.into_inner();
    assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
    assert!(fractions.last().copied().unwrap_or(0.0) < 1.0);
}

#[test]
fn cancelled_background_scan_publishes_cancelled_snapshot() {
    let tmp = TempDir::new().unwrap();
    for i in 0..2_000 {
        write_bytes(&tmp.path().join(format!("f{i:05}.bin")), 16);
    }

    let scanner = Scanner::new();
    let handle = scanner.start(ScanRequest::new("many", recursive(tmp.path()))).unwrap();
    // The scan may finish before the flag is read, so both terminal
    // messages are accepted; the cut-off itself is covered above.
    handle.cancel();
    assert!(handle.is_cancelled());

    let (_, message) = drain(&handle);
    match message {
        ScanProgress::Cancelled(outcome) => assert!(outcome.cancelled),
        ScanProgress::Complete(outcome) => assert_eq!(outcome.items.len(), 2_000),
        _ => unreachable!(),
    }
    assert!(!scanner.is_busy());
}

#[test]
fn one_scan_in_flight_per_scanner() {
    let tmp = TempDir::new().unwrap();
    for i in 0..500 {
        write_bytes(&tmp.path().join(format!("f{i:04}.bin")), 8);
    }

    let scanner = Scanner::new();
    let first = scanner.start(ScanRequest::new("one", recursive(tmp.path()))).unwrap();
    match scanner.start(ScanRequest::new("two", recursive(tmp.path()))) {
        Err(ScanError::AlreadyRunning) => {}
        // The first scan may already have released the guard.
        Ok(second) => {
            second.wait();
        }
        Err(other) => panic!("unexpected error: {other}"),
    }
    first.wait();
    assert!(!scanner.is_busy());
}

#[test]
fn duplicate_search_runs_in_background() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a");
    fs::create_dir(&a).unwrap();
    fs::write(a.join("x"), vec![7u8; 4096]).unwrap();
    fs::write(a.join("y"), vec![7u8; 4096]).unwrap();
    fs::write(a.join("z"), vec![8u8; 4096]).unwrap();

    let options = DedupOptions {
        min_size: 1024,
        ..DedupOptions::default()
    };
    let outcome = Scanner::new()
        .start_duplicates(recursive(&a), options)
        .unwrap()
        .wait()
        .unwrap();

    assert_eq!(outcome.groups.len(), 1);
    let group = &outcome.groups[0];
    assert_eq!(group.size, 4096);
    assert_eq!(group.wasted_space(), 4096);
    assert_eq!(group.members.len(), 2);
    assert!(group.members.iter().all(|m| m.name() != "z"));
}

#[test]
fn tree_scan_feeds_treemap() {
    let tmp = TempDir::new().unwrap();
    build_test_tree(tmp.path());

    let scan = Scanner::new()
        .start_tree(tmp.path().to_path_buf(), TraversalLimits::unbounded(), 2)
        .unwrap()
        .wait()
        .unwrap();
    assert_eq!(scan.tree.total_size, 1_000);

    let node = TreemapNode::from_tree(&scan.tree, scan.root, 4);
    assert_eq!(node.weight, 1_000);
    let bounds = Rect::new(0.0, 0.0, 200.0, 100.0);
    let placed = layout_nested(&node, bounds, 4);

    let top: f64 = placed.iter().filter(|p| p.depth == 0).map(|p| p.rect.area()).sum();
    assert!((top - bounds.area()).abs() < 1e-6);
    assert_eq!(placed.iter().filter(|p| !p.is_dir).count(), 4);
}

const _: () = assert!(
    PROGRESS_CHANNEL_CAPACITY > 0,
    "PROGRESS_CHANNEL_CAPACITY must be > 0"
);

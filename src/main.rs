//! DiskReclaim: disk maintenance from the command line.
//!
//! Thin binary entry point. All logic lives in the `diskreclaim-core`
//! crate; this file parses arguments, shows progress and prints results.

mod cli;
mod progress;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{ActionArgs, Cli, Commands, DupesArgs, HistoryArgs, ScanArgs, ShredArgs, TreemapArgs};
use diskreclaim_core::actions::{ActionMode, ActionResult, Coordinator, Refreshed};
use diskreclaim_core::analysis::age::age_days;
use diskreclaim_core::analysis::{summarise_categories, DedupOptions};
use diskreclaim_core::config::EngineConfig;
use diskreclaim_core::erase::shred_files;
use diskreclaim_core::export;
use diskreclaim_core::history::{HistoryLog, JsonFileStore, ScanSummary};
use diskreclaim_core::model::size::{format_count, format_size};
use diskreclaim_core::scanner::{
    build_request, container_usage, ScanKind, ScanRoot, Scanner, SystemCommandRunner, ToolReport,
};
use diskreclaim_core::treemap::{layout_nested, Rect, TreemapNode};
use progress::TerminalProgress;
use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::time::SystemTime;
use tracing::{info, warn};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialise structured logging. Logs go to stderr, results to stdout.
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_writer(std::io::stderr)
        .init();

    info!("DiskReclaim starting");

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => EngineConfig::load(),
    };
    if let Some(threads) = cli.threads {
        config.threads = threads;
    }

    let ui = Ui { quiet: cli.quiet };
    match cli.command {
        Commands::Scan(args) => scan(args, &config, ui),
        Commands::Dupes(args) => dupes(args, &config, ui),
        Commands::Treemap(args) => treemap(args, &config, ui),
        Commands::Shred(args) => shred(args, &config, ui),
        Commands::History(args) => history(args, &config),
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// Output switches shared by the subcommands.
#[derive(Clone, Copy)]
struct Ui {
    quiet: bool,
}

impl Ui {
    /// A fresh progress bar for one operation.
    fn bar(self) -> TerminalProgress {
        TerminalProgress::new(self.quiet)
    }
}

fn home_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(home) = explicit {
        return Ok(home);
    }
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .context("could not determine the home directory; pass --home")
}

fn action_mode(args: &ActionArgs) -> Option<ActionMode> {
    if args.trash {
        Some(ActionMode::Trash)
    } else if args.delete {
        Some(ActionMode::PermanentDelete)
    } else {
        args.shred.map(|passes| ActionMode::Shred { passes })
    }
}

fn record_history(config: &EngineConfig, label: &str, found: u64, cleaned: u64) {
    let summary = ScanSummary::now(label, found, cleaned);
    let recorded = JsonFileStore::default_location()
        .and_then(|store| HistoryLog::new(store, config.history_cap).record(summary));
    if let Err(err) = recorded {
        warn!("Could not record history: {err}");
    }
}

fn print_action_result(result: &ActionResult) {
    println!("{}", result.summary());
    for failure in &result.failures {
        println!("  failed: {} ({})", failure.item, failure.reason);
    }
}

fn scan(args: ScanArgs, config: &EngineConfig, ui: Ui) -> Result<()> {
    let mut config = config.clone();
    if let Some(min_size) = args.min_size {
        config.large_file_min_size = min_size;
    }
    if let Some(days) = args.min_age {
        config.download_min_age_days = days;
    }

    let kind = ScanKind::from(args.kind);
    let home = home_dir(args.home)?;
    let request = build_request(kind, &config, &home, &SystemCommandRunner);
    if request.roots.is_empty() {
        println!("No {} locations exist under {}", kind.label(), home.display());
        return Ok(());
    }

    let scanner = Scanner::new();
    let outcome = ui.bar().wait(scanner.start(request.clone())?)?;
    if outcome.all_roots_failed(request.roots.len()) {
        bail!("every {} location failed to scan", kind.label());
    }

    let now = SystemTime::now();
    for item in outcome.items.iter().take(args.limit) {
        let age = match age_days(item.entry.modified, now) {
            Some(days) if kind == ScanKind::Downloads => format!("{days:>5}d  "),
            _ => String::new(),
        };
        println!(
            "{:>10}  {age}{:<16}  {}",
            format_size(item.size),
            item.category.label(),
            item.path().display()
        );
    }
    println!(
        "{} item(s), {} in {:.1?}",
        format_count(outcome.items.len() as u64),
        format_size(outcome.total_size()),
        outcome.elapsed
    );
    for stats in summarise_categories(&outcome.items).iter().take(5) {
        println!("  {:<16} {:>10}", stats.category.label(), format_size(stats.total_size));
    }
    if kind == ScanKind::DeveloperCaches {
        match container_usage(&SystemCommandRunner) {
            ToolReport::Available(rows) => {
                println!("Container engine:");
                for row in rows {
                    println!("  {:<16} {:>10}  reclaimable {}", row.kind, row.size, row.reclaimable);
                }
            }
            ToolReport::Unavailable(reason) => info!("Container usage unavailable: {reason}"),
        }
    }

    if let Some(path) = &args.csv {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        export::write_items(&outcome.items, file)?;
        println!("Wrote {}", path.display());
    }

    let found = outcome.total_size();
    let Some(mode) = action_mode(&args.action) else {
        record_history(&config, kind.label(), found, 0);
        return Ok(());
    };

    let mut coordinator = Coordinator::for_scan(request, outcome);
    if args.select_all {
        coordinator.selection.select_all();
    }
    println!(
        "{} {} selected item(s), {}",
        mode.verb(),
        coordinator.selection.selected_count(),
        format_size(coordinator.selection.selected_total())
    );

    let bar = ui.bar();
    let (result, refreshed) = coordinator.act_and_refresh(&scanner, mode, &bar, &AtomicBool::new(false));
    bar.finish();
    print_action_result(&result);
    record_history(&config, kind.label(), found, result.bytes_reclaimed);

    if let Refreshed::Scan(handle) = refreshed? {
        let after = ui.bar().wait(handle)?;
        println!(
            "After cleanup: {} item(s), {}",
            format_count(after.items.len() as u64),
            format_size(after.total_size())
        );
    }
    Ok(())
}

fn dupes(args: DupesArgs, config: &EngineConfig, ui: Ui) -> Result<()> {
    let mut limits = config.deep_limits;
    if let Some(cap) = args.max_items {
        limits = limits.with_max_items_per_dir(cap);
    }
    let roots: Vec<ScanRoot> = args
        .roots
        .iter()
        .map(|path| ScanRoot::recursive(path, limits))
        .collect();

    let mut options = DedupOptions::from_config(config);
    if let Some(min_size) = args.min_size {
        options.min_size = min_size;
    }
    options.verify_full_hash |= args.full_hash;

    let scanner = Scanner::new();
    let outcome = ui.bar().wait(scanner.start_duplicates(roots.clone(), options.clone())?)?;
    if outcome.root_errors.len() == roots.len() {
        bail!("none of the given directories could be scanned");
    }

    for group in outcome.groups.iter().take(args.limit) {
        println!(
            "{} x {} ({} wasted)",
            group.members.len(),
            format_size(group.size),
            format_size(group.wasted_space())
        );
        for member in &group.members {
            let marker = if member.is_original { "keep" } else { "    " };
            println!("  {marker}  {}", member.path.display());
        }
    }
    println!(
        "{} group(s), {} reclaimable, {} files scanned{}",
        format_count(outcome.groups.len() as u64),
        format_size(outcome.wasted_space()),
        format_count(outcome.files_scanned),
        if outcome.unreadable > 0 {
            format!(", {} unreadable", outcome.unreadable)
        } else {
            String::new()
        }
    );

    if let Some(path) = &args.csv {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        export::write_groups(&outcome.groups, file)?;
        println!("Wrote {}", path.display());
    }

    let found = outcome.wasted_space();
    let label = "duplicates";
    let Some(mode) = action_mode(&args.action) else {
        record_history(config, label, found, 0);
        return Ok(());
    };

    let mut coordinator = Coordinator::for_duplicates(roots, options, outcome);
    // Every copy except the elected original.
    coordinator.selection.select_all();
    let bar = ui.bar();
    let (result, refreshed) = coordinator.act_and_refresh(&scanner, mode, &bar, &AtomicBool::new(false));
    bar.finish();
    print_action_result(&result);
    record_history(config, label, found, result.bytes_reclaimed);

    if let Refreshed::Duplicates(handle) = refreshed? {
        let after = ui.bar().wait(handle)?;
        println!(
            "After cleanup: {} group(s), {} reclaimable",
            after.groups.len(),
            format_size(after.wasted_space())
        );
    }
    Ok(())
}

fn treemap(args: TreemapArgs, config: &EngineConfig, ui: Ui) -> Result<()> {
    let scan = ui.bar().wait(Scanner::new().start_tree(
        args.root.clone(),
        config.deep_limits,
        config.worker_threads(),
    )?)?;
    if scan.cancelled {
        bail!("tree scan was cancelled");
    }

    let node = TreemapNode::from_tree(&scan.tree, scan.root, args.depth);
    let bounds = Rect::new(0.0, 0.0, args.width, args.height);
    println!(
        "{}  {}, {} files",
        node.path.display(),
        format_size(node.weight),
        format_count(scan.tree.node(scan.root).descendant_count)
    );
    for placed in layout_nested(&node, bounds, args.depth) {
        let r = placed.rect;
        println!(
            "{indent}{name:<30} {size:>10}  x={x:<7.1} y={y:<7.1} w={w:<7.1} h={h:.1}",
            indent = "  ".repeat(placed.depth + 1),
            name = placed.name,
            size = format_size(placed.weight),
            x = r.x,
            y = r.y,
            w = r.width,
            h = r.height,
        );
    }
    if scan.error_count > 0 {
        println!("{} entries could not be read", scan.error_count);
        for idx in scan.tree.unreadable().take(10) {
            println!("  unreadable: {}", scan.tree.full_path(idx).display());
        }
    }
    Ok(())
}

fn shred(args: ShredArgs, config: &EngineConfig, ui: Ui) -> Result<()> {
    let passes = args.passes.unwrap_or(config.default_shred_passes);
    if !ui.quiet {
        eprintln!(
            "Note: overwriting may not reach the original blocks on SSDs or \
             copy-on-write and journaled file systems."
        );
    }
    let bar = ui.bar();
    let result = shred_files(&args.files, passes, &bar, &AtomicBool::new(false));
    bar.finish();
    print_action_result(&result);
    record_history(config, "shred", result.bytes_reclaimed, result.bytes_reclaimed);
    if result.failed > 0 {
        bail!("{} file(s) could not be shredded", result.failed);
    }
    Ok(())
}

fn history(args: HistoryArgs, config: &EngineConfig) -> Result<()> {
    let log = HistoryLog::new(JsonFileStore::default_location()?, config.history_cap);
    let entries = log.entries()?;
    if entries.is_empty() {
        println!("No history yet");
        return Ok(());
    }
    for entry in entries.iter().rev().take(args.limit) {
        println!(
            "{}  {:<18} found {:>10}  cleaned {:>10}",
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.label,
            format_size(entry.total_found),
            format_size(entry.total_cleaned)
        );
    }
    println!("Total cleaned: {}", format_size(log.total_cleaned()?));
    Ok(())
}

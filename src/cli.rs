//! Command-line interface definitions.

use clap::{Args, Parser, Subcommand, ValueEnum};
use diskreclaim_core::model::size::parse_size;
use diskreclaim_core::scanner::ScanKind;
use std::path::PathBuf;

/// Find and reclaim disk space: junk, large files, duplicates, treemaps
/// and secure erase.
#[derive(Debug, Parser)]
#[command(name = "diskreclaim")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print errors and results
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Read engine settings from this JSON file instead of the default location
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Worker threads for hashing and tree scans (0 = one per CPU)
    #[arg(long, value_name = "N", global = true)]
    pub threads: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            return tracing::Level::ERROR;
        }
        match self.verbose {
            0 => tracing::Level::INFO,
            1 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one of the built-in scanners
    Scan(ScanArgs),
    /// Find duplicate files under one or more directories
    Dupes(DupesArgs),
    /// Print a treemap layout of a directory
    Treemap(TreemapArgs),
    /// Overwrite files several times, then delete them
    Shred(ShredArgs),
    /// Show recorded scans and cleanups
    History(HistoryArgs),
    /// Print the effective engine configuration
    Config,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindArg {
    Junk,
    LargeFiles,
    AppContainers,
    DeveloperCaches,
    Downloads,
}

impl From<KindArg> for ScanKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Junk => ScanKind::Junk,
            KindArg::LargeFiles => ScanKind::LargeFiles,
            KindArg::AppContainers => ScanKind::AppContainers,
            KindArg::DeveloperCaches => ScanKind::DeveloperCaches,
            KindArg::Downloads => ScanKind::Downloads,
        }
    }
}

/// What to do with the selected results.
#[derive(Debug, Args)]
#[group(multiple = false)]
pub struct ActionArgs {
    /// Move selected results to the trash
    #[arg(long)]
    pub trash: bool,

    /// Delete selected results permanently
    #[arg(long)]
    pub delete: bool,

    /// Shred selected files with this many passes
    #[arg(long, value_name = "PASSES")]
    pub shred: Option<u32>,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Scanner to run
    #[arg(value_enum)]
    pub kind: KindArg,

    /// Home directory to resolve scanner locations against
    #[arg(long, value_name = "DIR")]
    pub home: Option<PathBuf>,

    /// Minimum size for large files (e.g. 500MB)
    #[arg(long, value_parser = parse_size, value_name = "SIZE")]
    pub min_size: Option<u64>,

    /// Minimum age in days for downloads
    #[arg(long, value_name = "DAYS")]
    pub min_age: Option<u64>,

    /// Select every result before acting (junk is pre-selected anyway)
    #[arg(long)]
    pub select_all: bool,

    /// Write the results to a CSV file
    #[arg(long, value_name = "FILE")]
    pub csv: Option<PathBuf>,

    /// Rows to print
    #[arg(long, default_value_t = 25)]
    pub limit: usize,

    #[command(flatten)]
    pub action: ActionArgs,
}

#[derive(Debug, Args)]
pub struct DupesArgs {
    /// Directories to search
    #[arg(value_name = "DIR", required = true)]
    pub roots: Vec<PathBuf>,

    /// Ignore files smaller than this (e.g. 10KB)
    #[arg(long, value_parser = parse_size, value_name = "SIZE")]
    pub min_size: Option<u64>,

    /// Confirm matches by hashing whole files, not just the first block
    #[arg(long)]
    pub full_hash: bool,

    /// Maximum entries read per directory
    #[arg(long, value_name = "N")]
    pub max_items: Option<usize>,

    /// Write the groups to a CSV file
    #[arg(long, value_name = "FILE")]
    pub csv: Option<PathBuf>,

    /// Groups to print
    #[arg(long, default_value_t = 25)]
    pub limit: usize,

    #[command(flatten)]
    pub action: ActionArgs,
}

#[derive(Debug, Args)]
pub struct TreemapArgs {
    /// Directory to map
    #[arg(value_name = "DIR")]
    pub root: PathBuf,

    #[arg(long, default_value_t = 120.0)]
    pub width: f64,

    #[arg(long, default_value_t = 40.0)]
    pub height: f64,

    /// Levels to lay out
    #[arg(long, default_value_t = 2)]
    pub depth: usize,
}

#[derive(Debug, Args)]
pub struct ShredArgs {
    /// Files to destroy
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,

    /// Overwrite passes (defaults to the configured value)
    #[arg(long, short)]
    pub passes: Option<u32>,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Entries to show, most recent first
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

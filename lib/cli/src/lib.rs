use clap::{Args, Parser, Subcommand};
use getset::{CopyGetters, Getters};
use std::path::PathBuf;

pub mod host;

/// crtdash: live host metrics (CPU, memory, disk, network)
#[derive(Debug, Parser, Getters, CopyGetters)]
#[command(name = "crtdash")]
#[command(about = "crtdash: Live host metrics sampling", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    #[getset(get = "pub")]
    command: Commands,
    /// Log debug output from the sampling engine
    #[arg(short, long, global = true)]
    #[getset(get_copy = "pub")]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sample continuously and print every published snapshot until Ctrl-C
    Watch(WatchArgs),
    /// Take a single measurement and print it
    Snapshot(SnapshotArgs),
}

#[derive(Debug, Args, Getters, CopyGetters)]
pub struct WatchArgs {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    #[getset(get = "pub")]
    config: Option<PathBuf>,
    /// Override the fast (CPU, memory, network) interval, in milliseconds
    #[arg(long)]
    #[getset(get_copy = "pub")]
    fast_ms: Option<u64>,
    /// Override the slow (disk) interval, in seconds
    #[arg(long)]
    #[getset(get_copy = "pub")]
    slow_secs: Option<u64>,
    /// Print snapshots as JSON lines instead of log lines
    #[arg(long)]
    #[getset(get_copy = "pub")]
    json: bool,
}

#[derive(Debug, Args, Getters, CopyGetters)]
pub struct SnapshotArgs {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    #[getset(get = "pub")]
    config: Option<PathBuf>,
    /// Print the snapshot as JSON instead of log lines
    #[arg(long)]
    #[getset(get_copy = "pub")]
    json: bool,
}

use anyhow::Result;
use clap::Parser;
use cli::host::{run_snapshot, run_watch};
use cli::{Cli, Commands};
use common::util::trace::initialize_tracing;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    initialize_tracing(args.verbose())?;
    info!("crtdash started");

    match args.command() {
        Commands::Watch(args) => run_watch(args).await,
        Commands::Snapshot(args) => run_snapshot(args).await,
    }
}

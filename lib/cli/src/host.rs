use crate::{SnapshotArgs, WatchArgs};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use common::config::MonitorConfig;
use metrics::{MetricsHandle, MetricsSnapshot, SamplingScheduler, SystemCounterReader};
use serde::Serialize;
use std::future::Future;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

/// One line of `--json` output.
#[derive(Debug, Serialize)]
pub struct SnapshotRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub snapshot: MetricsSnapshot,
}

impl SnapshotRecord {
    pub fn new(snapshot: MetricsSnapshot) -> Self {
        Self {
            timestamp: Utc::now(),
            snapshot,
        }
    }
}

/// Loads the configuration file and environment, then applies command-line
/// overrides on top.
pub fn resolve_config(
    path: Option<&Path>,
    fast_ms: Option<u64>,
    slow_secs: Option<u64>,
) -> Result<MonitorConfig> {
    let mut config = MonitorConfig::load(path).context("Failed to load configuration")?;

    if let Some(fast_ms) = fast_ms {
        config.set_fast_interval_ms(fast_ms);
    }
    if let Some(slow_secs) = slow_secs {
        config.set_slow_interval_secs(slow_secs);
    }
    config
        .validate()
        .context("Invalid command-line interval override")?;

    Ok(config)
}

fn emit(snapshot: MetricsSnapshot, json: bool) -> Result<()> {
    if json {
        let line = serde_json::to_string(&SnapshotRecord::new(snapshot))
            .context("Failed to serialize snapshot")?;
        println!("{}", line);
    } else {
        snapshot.log_snapshot();
    }
    Ok(())
}

async fn build_scheduler(config: &MonitorConfig) -> SamplingScheduler {
    let reader = Arc::new(SystemCounterReader::new(config));
    SamplingScheduler::new(reader, config).await
}

/// Hands every snapshot published on `handle` to `sink`, exactly once each,
/// until `shutdown` resolves or the scheduler goes away.
pub async fn forward_snapshots<S, F>(
    handle: &mut MetricsHandle,
    mut sink: S,
    shutdown: F,
) -> Result<()>
where
    S: FnMut(MetricsSnapshot) -> Result<()>,
    F: Future<Output = io::Result<()>>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            changed = handle.changed() => match changed {
                Some(snapshot) => sink(snapshot)?,
                None => return Ok(()),
            },
            signal = &mut shutdown => {
                signal.context("Failed to listen for shutdown signal")?;
                info!("Received shutdown signal");
                return Ok(());
            }
        }
    }
}

#[instrument(skip(args))]
pub async fn run_watch(args: &WatchArgs) -> Result<()> {
    let config = resolve_config(args.config().as_deref(), args.fast_ms(), args.slow_secs())?;
    let scheduler = build_scheduler(&config).await;
    let mut handle = scheduler.handle();

    // The immediate tick of `start` is the first publication the loop sees.
    scheduler.start().await;
    let json = args.json();
    let result = forward_snapshots(
        &mut handle,
        |snapshot| emit(snapshot, json),
        tokio::signal::ctrl_c(),
    )
    .await;

    scheduler.stop();
    result
}

#[instrument(skip(args))]
pub async fn run_snapshot(args: &SnapshotArgs) -> Result<()> {
    let config = resolve_config(args.config().as_deref(), None, None)?;
    let scheduler = build_scheduler(&config).await;

    // The first tick measures CPU and network against the samples taken at
    // construction, so give it a full fast interval to average over.
    tokio::time::sleep(config.fast_interval()).await;
    scheduler.start().await;

    let snapshot = scheduler.snapshot();
    scheduler.stop();

    emit(snapshot, args.json())
}

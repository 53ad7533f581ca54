//! Derivation of ratios and per-second rates from pairs of raw samples.
//!
//! Everything in here is pure: no I/O, no clocks. The scheduler hands in the
//! reads of one tick and the instant they completed, and gets back the next
//! snapshot. All divisions are guarded so no NaN, infinite or negative value
//! ever reaches a snapshot.

use crate::error::ReadError;
use crate::sample::{CpuTicks, DiskSample, MemorySample, NetworkCounters};
use crate::snapshot::MetricsSnapshot;
use getset::CopyGetters;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Fraction of CPU time spent in user or system mode between two samples.
///
/// A field that went backwards contributes nothing. When no CPU time elapsed
/// between the samples (or the reader produced nothing) the ratio is 0.
pub fn cpu_usage_ratio(previous: &CpuTicks, current: &CpuTicks) -> f64 {
    let user = current.user.saturating_sub(previous.user);
    let system = current.system.saturating_sub(previous.system);
    let idle = current.idle.saturating_sub(previous.idle);
    let nice = current.nice.saturating_sub(previous.nice);
    let total = user
        .saturating_add(system)
        .saturating_add(idle)
        .saturating_add(nice);

    if total == 0 {
        return 0.0;
    }

    (user.saturating_add(system) as f64 / total as f64).clamp(0.0, 1.0)
}

/// `used / total` for an instantaneous gauge, 0 when `total` is 0 and
/// saturated at 1 when `used` exceeds `total`.
pub fn usage_ratio(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }

    (used as f64 / total as f64).clamp(0.0, 1.0)
}

/// Growth of a cumulative counter.
///
/// A counter that went backwards wrapped or was reset (an interface went away
/// and came back); the counter width is unknown, so the whole current value is
/// taken as this tick's growth.
pub fn counter_delta(previous: u64, current: u64) -> u64 {
    if current >= previous {
        current - previous
    } else {
        current
    }
}

/// Per-second network throughput.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkRates {
    pub bytes_in_per_sec: u64,
    pub bytes_out_per_sec: u64,
}

/// Throughput between two counter samples taken `elapsed_secs` apart,
/// truncated to whole bytes per second.
///
/// Returns `None` when no time elapsed (or the clock is unusable), in which case
/// the caller must leave the previously published rates untouched.
pub fn network_rates(
    previous: &NetworkCounters,
    current: &NetworkCounters,
    elapsed_secs: f64,
) -> Option<NetworkRates> {
    if !(elapsed_secs > 0.0) || !elapsed_secs.is_finite() {
        return None;
    }

    let per_sec = |delta: u64| (delta as f64 / elapsed_secs) as u64;

    Some(NetworkRates {
        bytes_in_per_sec: per_sec(counter_delta(previous.bytes_in, current.bytes_in)),
        bytes_out_per_sec: per_sec(counter_delta(previous.bytes_out, current.bytes_out)),
    })
}

/// The raw reads of one fast tick, fetched back to back.
#[derive(Debug)]
pub struct FastReads {
    pub cpu: Result<CpuTicks, ReadError>,
    pub memory: Result<MemorySample, ReadError>,
    pub network: Result<NetworkCounters, ReadError>,
}

/// Previous raw samples the next fast tick is measured against.
///
/// A group without a baseline (its first read failed) establishes one on its
/// next successful read and reports no data until then. A failed read never
/// replaces a good baseline, so the tick after a failure measures against the
/// last good sample instead of against zero.
#[derive(Debug, Clone, Copy, PartialEq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct Baseline {
    cpu_ticks: Option<CpuTicks>,
    network: Option<NetworkCounters>,
    network_at: Instant,
}

impl Baseline {
    pub fn new(
        cpu_ticks: Option<CpuTicks>,
        network: Option<NetworkCounters>,
        network_at: Instant,
    ) -> Self {
        Self {
            cpu_ticks,
            network,
            network_at,
        }
    }

    /// Applies one fast tick to `previous`, advancing the baseline, and returns
    /// the snapshot to publish. Disk fields are carried over untouched.
    pub fn fold(
        &mut self,
        previous: &MetricsSnapshot,
        reads: FastReads,
        now: Instant,
    ) -> MetricsSnapshot {
        let mut next = *previous;

        self.fold_cpu(&mut next, reads.cpu);
        fold_memory(&mut next, reads.memory);
        self.fold_network(&mut next, reads.network, now);

        next
    }

    fn fold_cpu(&mut self, next: &mut MetricsSnapshot, read: Result<CpuTicks, ReadError>) {
        match read {
            Ok(current) => match self.cpu_ticks.replace(current) {
                Some(previous) => {
                    next.cpu_usage_ratio = cpu_usage_ratio(&previous, &current);
                    next.availability.cpu = true;
                }
                None => {
                    debug!("Established CPU baseline");
                    next.cpu_usage_ratio = 0.0;
                    next.availability.cpu = false;
                }
            },
            Err(e) => {
                warn!(error = %e, "CPU read failed, reporting no data this tick");
                next.cpu_usage_ratio = 0.0;
                next.availability.cpu = false;
            }
        }
    }

    fn fold_network(
        &mut self,
        next: &mut MetricsSnapshot,
        read: Result<NetworkCounters, ReadError>,
        now: Instant,
    ) {
        let current = match read {
            Ok(current) => current,
            Err(e) => {
                warn!(error = %e, "Network read failed, reporting no data this tick");
                next.network_bytes_in_per_sec = 0;
                next.network_bytes_out_per_sec = 0;
                next.availability.network = false;
                return;
            }
        };

        let Some(previous) = self.network else {
            debug!("Established network baseline");
            self.network = Some(current);
            self.network_at = now;
            next.network_bytes_in_per_sec = 0;
            next.network_bytes_out_per_sec = 0;
            next.availability.network = false;
            return;
        };

        let elapsed_secs = now.saturating_duration_since(self.network_at).as_secs_f64();
        let Some(rates) = network_rates(&previous, &current, elapsed_secs) else {
            trace!("No time elapsed since the last network sample, keeping previous rates");
            return;
        };

        next.network_bytes_in_per_sec = rates.bytes_in_per_sec;
        next.network_bytes_out_per_sec = rates.bytes_out_per_sec;
        next.availability.network = true;
        self.network = Some(current);
        self.network_at = now;
    }
}

fn fold_memory(next: &mut MetricsSnapshot, read: Result<MemorySample, ReadError>) {
    match read {
        Ok(memory) => {
            next.memory_used_bytes = memory.used_bytes;
            next.memory_total_bytes = memory.total_bytes;
            next.availability.memory = true;
        }
        Err(e) => {
            warn!(error = %e, "Memory read failed, reporting no data this tick");
            next.memory_used_bytes = 0;
            next.memory_total_bytes = 0;
            next.availability.memory = false;
        }
    }
}

/// Applies one slow tick (a disk read) to `previous`. Disk gauges are
/// instantaneous, so no baseline is involved.
pub fn fold_disk(
    previous: &MetricsSnapshot,
    read: Result<DiskSample, ReadError>,
) -> MetricsSnapshot {
    let mut next = *previous;

    match read {
        Ok(disk) => {
            next.disk_used_bytes = disk.used_bytes;
            next.disk_total_bytes = disk.total_bytes;
            next.availability.disk = true;
        }
        Err(e) => {
            warn!(error = %e, "Disk read failed, reporting no data this tick");
            next.disk_used_bytes = 0;
            next.disk_total_bytes = 0;
            next.availability.disk = false;
        }
    }

    next
}

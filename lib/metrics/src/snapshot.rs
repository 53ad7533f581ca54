use crate::format::{format_bytes, format_percent, format_rate};
use crate::rate::usage_ratio;
use getset::CopyGetters;
use serde::{Deserialize, Serialize};
use tracing::info;
use typed_builder::TypedBuilder;

/// Ratio above which a gauge is drawn in the elevated (amber) band.
pub const ELEVATED_THRESHOLD: f64 = 0.7;

/// Ratio above which a gauge is drawn in the critical (red) band.
pub const CRITICAL_THRESHOLD: f64 = 0.85;

/// Whether the most recent tick for each field group read its counters
/// successfully.
///
/// A group that is not available reports zero values. This lets a display tell
/// "0% busy" apart from "no data this tick".
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, CopyGetters,
)]
#[getset(get_copy = "pub")]
pub struct Availability {
    pub(crate) cpu: bool,
    pub(crate) memory: bool,
    pub(crate) disk: bool,
    pub(crate) network: bool,
}

/// The published, internally consistent set of derived host metrics.
///
/// Snapshots are plain values: the engine replaces the whole snapshot on every
/// tick, so a copy held by an observer never changes underneath it.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize, CopyGetters, TypedBuilder,
)]
#[getset(get_copy = "pub")]
pub struct MetricsSnapshot {
    /// Fraction of CPU time spent busy since the previous fast tick (0.0 - 1.0).
    #[builder(default)]
    pub(crate) cpu_usage_ratio: f64,
    #[builder(default)]
    pub(crate) memory_used_bytes: u64,
    #[builder(default)]
    pub(crate) memory_total_bytes: u64,
    #[builder(default)]
    pub(crate) disk_used_bytes: u64,
    #[builder(default)]
    pub(crate) disk_total_bytes: u64,
    #[builder(default)]
    pub(crate) network_bytes_in_per_sec: u64,
    #[builder(default)]
    pub(crate) network_bytes_out_per_sec: u64,
    #[builder(default)]
    pub(crate) availability: Availability,
}

impl MetricsSnapshot {
    pub fn memory_usage_ratio(&self) -> f64 {
        usage_ratio(self.memory_used_bytes, self.memory_total_bytes)
    }

    pub fn disk_usage_ratio(&self) -> f64 {
        usage_ratio(self.disk_used_bytes, self.disk_total_bytes)
    }

    pub fn cpu_band(&self) -> GaugeBand {
        GaugeBand::for_ratio(self.cpu_usage_ratio)
    }

    pub fn memory_band(&self) -> GaugeBand {
        GaugeBand::for_ratio(self.memory_usage_ratio())
    }

    pub fn disk_band(&self) -> GaugeBand {
        GaugeBand::for_ratio(self.disk_usage_ratio())
    }

    pub fn log_snapshot(&self) {
        info!(
            band = ?self.cpu_band(),
            available = self.availability.cpu,
            "CPU: {}",
            format_percent(self.cpu_usage_ratio)
        );
        info!(
            band = ?self.memory_band(),
            available = self.availability.memory,
            "MEM: {} ({} / {})",
            format_percent(self.memory_usage_ratio()),
            format_bytes(self.memory_used_bytes),
            format_bytes(self.memory_total_bytes)
        );
        info!(
            band = ?self.disk_band(),
            available = self.availability.disk,
            "DSK: {} ({} / {})",
            format_percent(self.disk_usage_ratio()),
            format_bytes(self.disk_used_bytes),
            format_bytes(self.disk_total_bytes)
        );
        info!(
            available = self.availability.network,
            "NET: ↓ {} ↑ {}",
            format_rate(self.network_bytes_in_per_sec),
            format_rate(self.network_bytes_out_per_sec)
        );
    }
}

/// Display colour band of a gauge. This is the only threshold policy the
/// engine has; it does not alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GaugeBand {
    /// Up to 70%.
    Normal,
    /// Above 70%.
    Elevated,
    /// Above 85%.
    Critical,
}

impl GaugeBand {
    pub fn for_ratio(ratio: f64) -> Self {
        if ratio > CRITICAL_THRESHOLD {
            GaugeBand::Critical
        } else if ratio > ELEVATED_THRESHOLD {
            GaugeBand::Elevated
        } else {
            GaugeBand::Normal
        }
    }
}

//! Raw, absolute counter readings as reported by the operating system.
//!
//! Nothing in here is a rate or a ratio. Samples are cheap `Copy` values that
//! the rate engine pairs up (previous, current) to derive the published
//! metrics.

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Cumulative CPU time split by mode, in scheduler ticks since boot.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CpuTicks {
    pub user: u64,
    pub system: u64,
    pub idle: u64,
    pub nice: u64,
}

impl CpuTicks {
    pub fn new(user: u64, system: u64, idle: u64, nice: u64) -> Self {
        Self {
            user,
            system,
            idle,
            nice,
        }
    }

    /// Sum of all four modes.
    pub fn total(&self) -> u64 {
        self.user
            .saturating_add(self.system)
            .saturating_add(self.idle)
            .saturating_add(self.nice)
    }

    /// Ticks spent doing work (user + system).
    pub fn busy(&self) -> u64 {
        self.user.saturating_add(self.system)
    }
}

/// Physical memory usage, in bytes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemorySample {
    pub used_bytes: u64,
    pub total_bytes: u64,
}

/// Capacity of the root volume, in bytes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiskSample {
    pub used_bytes: u64,
    pub total_bytes: u64,
}

impl DiskSample {
    /// Builds a sample from total and available capacity. Available space larger
    /// than the volume itself (seen on some network filesystems) clamps `used` to 0.
    pub fn from_capacity(total_bytes: u64, available_bytes: u64) -> Self {
        Self {
            used_bytes: total_bytes.saturating_sub(available_bytes),
            total_bytes,
        }
    }
}

/// Cumulative bytes moved across every non-loopback interface.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkCounters {
    pub bytes_in: u64,
    pub bytes_out: u64,
}

impl NetworkCounters {
    pub fn new(bytes_in: u64, bytes_out: u64) -> Self {
        Self {
            bytes_in,
            bytes_out,
        }
    }

    /// Adds one interface's counters into the running sum.
    pub fn accumulate(&mut self, interface: &str, bytes_in: u64, bytes_out: u64) {
        trace!(interface, bytes_in, bytes_out, "Adding interface counters");
        self.bytes_in = self.bytes_in.saturating_add(bytes_in);
        self.bytes_out = self.bytes_out.saturating_add(bytes_out);
    }
}

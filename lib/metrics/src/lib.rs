//! Host metrics sampling and rate derivation.
//!
//! Raw OS counters are read by a [`collector::CounterReader`], paired with the
//! previous sample by the [`rate`] functions, and published as a
//! [`snapshot::MetricsSnapshot`] by the [`scheduler::SamplingScheduler`] on two
//! independent cadences.

pub mod collector;
pub mod error;
pub mod format;
pub mod rate;
pub mod sample;
pub mod scheduler;
pub mod snapshot;

pub use collector::{CounterReader, CounterReaderRef, SystemCounterReader};
pub use error::ReadError;
pub use format::{format_bytes, format_percent, format_rate};
pub use sample::{CpuTicks, DiskSample, MemorySample, NetworkCounters};
pub use scheduler::{MetricsHandle, SamplingScheduler, SchedulerState};
pub use snapshot::{Availability, GaugeBand, MetricsSnapshot};

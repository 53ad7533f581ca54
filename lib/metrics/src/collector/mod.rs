use crate::error::ReadError;
use crate::sample::{CpuTicks, DiskSample, MemorySample, NetworkCounters};
use async_trait::async_trait;
use common::config::MonitorConfig;
use parking_lot::Mutex;
use std::sync::Arc;
use sysinfo::System;
use tokio::task;
use tracing::{debug, instrument};
use typed_builder::TypedBuilder;

pub mod cpu;
pub mod disk;
pub mod memory;
pub mod network;

pub use cpu::CpuTickReader;
pub use disk::DiskReader;
pub use memory::MemoryReader;
pub use network::NetworkReader;

/// Source of raw, absolute OS counters.
///
/// Each query is independent: a failure in one says nothing about the others,
/// and callers decide how to substitute for a failed read. Implementations must
/// be callable from any task and must not block longer than a bounded OS query.
#[async_trait]
pub trait CounterReader: Send + Sync {
    /// Cumulative CPU ticks since boot.
    async fn read_cpu_ticks(&self) -> Result<CpuTicks, ReadError>;

    /// Current physical memory usage.
    async fn read_memory(&self) -> Result<MemorySample, ReadError>;

    /// Current capacity of the monitored volume.
    async fn read_disk(&self) -> Result<DiskSample, ReadError>;

    /// Cumulative bytes across all non-loopback interfaces.
    async fn read_network(&self) -> Result<NetworkCounters, ReadError>;
}

/// A reference-counted reference to a [`CounterReader`].
pub type CounterReaderRef = Arc<dyn CounterReader>;

/// A reference-counted, lockable reference to a [`System`].
/// This is used to collect system metrics like memory usage.
pub type SystemRef = Arc<Mutex<System>>;

/// [`CounterReader`] backed by the host operating system.
///
/// The underlying queries are synchronous syscalls and file reads, so every
/// read is moved onto tokio's blocking pool to keep the sampling tasks free.
#[derive(Debug, Clone, TypedBuilder)]
pub struct SystemCounterReader {
    cpu: CpuTickReader,
    memory: MemoryReader,
    disk: DiskReader,
    network: NetworkReader,
}

impl SystemCounterReader {
    pub fn new(config: &MonitorConfig) -> Self {
        debug!(mount_point = %config.disk_mount_point().display(), "Creating system counter reader");

        SystemCounterReader::builder()
            .cpu(CpuTickReader::new())
            .memory(MemoryReader::new())
            .disk(DiskReader::new(config.disk_mount_point().clone()))
            .network(NetworkReader::new())
            .build()
    }
}

async fn blocking<T, F>(query: F) -> Result<T, ReadError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ReadError> + Send + 'static,
{
    task::spawn_blocking(query).await?
}

#[async_trait]
impl CounterReader for SystemCounterReader {
    #[inline]
    #[instrument(skip(self))]
    async fn read_cpu_ticks(&self) -> Result<CpuTicks, ReadError> {
        let cpu = self.cpu.clone();
        blocking(move || cpu.read()).await
    }

    #[inline]
    #[instrument(skip(self))]
    async fn read_memory(&self) -> Result<MemorySample, ReadError> {
        let memory = self.memory.clone();
        blocking(move || memory.read()).await
    }

    #[inline]
    #[instrument(skip(self))]
    async fn read_disk(&self) -> Result<DiskSample, ReadError> {
        let disk = self.disk.clone();
        blocking(move || disk.read()).await
    }

    #[inline]
    #[instrument(skip(self))]
    async fn read_network(&self) -> Result<NetworkCounters, ReadError> {
        let network = self.network.clone();
        blocking(move || network.read()).await
    }
}

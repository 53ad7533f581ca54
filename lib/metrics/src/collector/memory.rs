use super::SystemRef;
use crate::error::ReadError;
use crate::sample::MemorySample;
use getset::CopyGetters;
use parking_lot::Mutex;
use std::sync::Arc;
use sysinfo::System;
use tracing::{debug, instrument, trace};

/// Reads physical memory usage through [`sysinfo`].
///
/// The physical memory size cannot change while we run, so it is queried once
/// when the reader is built and reused for every sample.
#[derive(Debug, Clone, CopyGetters)]
pub struct MemoryReader {
    system: SystemRef,
    #[getset(get_copy = "pub")]
    total_bytes: u64,
}

impl Default for MemoryReader {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryReader {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_memory();
        let total_bytes = system.total_memory();
        debug!(total_bytes, "Cached physical memory size");

        Self {
            system: Arc::new(Mutex::new(system)),
            total_bytes,
        }
    }

    #[instrument(skip(self))]
    pub fn read(&self) -> Result<MemorySample, ReadError> {
        if self.total_bytes == 0 {
            return Err(ReadError::Unavailable("physical memory size"));
        }

        let used_bytes = {
            let mut system = self.system.lock();
            system.refresh_memory();
            system.used_memory()
        };
        trace!(used_bytes, total_bytes = self.total_bytes, "Read memory usage");

        Ok(MemorySample {
            used_bytes,
            total_bytes: self.total_bytes,
        })
    }
}

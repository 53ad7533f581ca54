use crate::error::ReadError;
use crate::sample::CpuTicks;
use getset::Getters;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysinfo::System;
use tracing::{instrument, trace};
use typed_builder::TypedBuilder;

/// Location of the kernel's aggregate CPU accounting on Linux.
pub const PROC_STAT: &str = "/proc/stat";

/// A reference-counted, lockable handle to a [`UsageTicks`] accumulator.
pub type UsageTicksRef = Arc<Mutex<UsageTicks>>;

/// Reads cumulative CPU ticks from the host.
///
/// Linux parses `/proc/stat` and macOS asks the Mach host for its
/// `HOST_CPU_LOAD_INFO` counters. Every other host derives ticks from the
/// usage percentage [`sysinfo`] reports (see [`UsageTicks`]).
#[derive(Debug, Clone, Getters, TypedBuilder)]
#[getset(get = "pub")]
pub struct CpuTickReader {
    #[builder(default = PathBuf::from(PROC_STAT))]
    source: PathBuf,
    #[builder(default)]
    usage: UsageTicksRef,
}

impl Default for CpuTickReader {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuTickReader {
    pub fn new() -> Self {
        CpuTickReader::builder().build()
    }

    #[instrument(skip(self))]
    pub fn read(&self) -> Result<CpuTicks, ReadError> {
        let ticks = self.read_host()?;
        trace!(?ticks, "Read CPU ticks");
        Ok(ticks)
    }

    #[cfg(target_os = "linux")]
    fn read_host(&self) -> Result<CpuTicks, ReadError> {
        let contents = std::fs::read_to_string(&self.source)?;
        parse_proc_stat(&contents)
    }

    #[cfg(target_os = "macos")]
    fn read_host(&self) -> Result<CpuTicks, ReadError> {
        mach::host_cpu_ticks()
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    fn read_host(&self) -> Result<CpuTicks, ReadError> {
        Ok(self.usage.lock().sample())
    }
}

/// Synthesizes cumulative ticks, in milliseconds, from sysinfo's global CPU
/// usage on hosts without raw tick counters.
///
/// Each sample splits the wall time since the previous sample into busy and
/// idle time by the usage sysinfo measured over that same window, so the ratio
/// between two samples reproduces sysinfo's own figure.
#[derive(Debug)]
pub struct UsageTicks {
    system: System,
    refreshed_at: Option<Instant>,
    ticks: CpuTicks,
}

impl Default for UsageTicks {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageTicks {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            refreshed_at: None,
            ticks: CpuTicks::default(),
        }
    }

    pub fn sample(&mut self) -> CpuTicks {
        self.system.refresh_cpu();
        let now = Instant::now();

        // The first refresh only primes sysinfo; there is no window to split yet.
        if let Some(previous) = self.refreshed_at.replace(now) {
            let usage_percent = self.system.global_cpu_info().cpu_usage();
            self.advance(usage_percent, now.saturating_duration_since(previous));
        }

        self.ticks
    }

    /// Adds `elapsed` to the counters, `usage_percent` of it as busy time.
    pub fn advance(&mut self, usage_percent: f32, elapsed: Duration) -> CpuTicks {
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let busy_ratio = f64::from(usage_percent) / 100.0;
        let busy_ratio = if busy_ratio.is_finite() {
            busy_ratio.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let busy_ms = ((elapsed_ms as f64 * busy_ratio).round() as u64).min(elapsed_ms);

        self.ticks.user = self.ticks.user.saturating_add(busy_ms);
        self.ticks.idle = self.ticks.idle.saturating_add(elapsed_ms - busy_ms);
        self.ticks
    }
}

/// `host_statistics(HOST_CPU_LOAD_INFO)` bindings.
#[cfg(target_os = "macos")]
mod mach {
    use crate::error::ReadError;
    use crate::sample::CpuTicks;
    use std::mem;
    use std::os::raw::{c_int, c_uint};
    use std::sync::OnceLock;

    type MachPort = c_uint;
    type KernReturn = c_int;

    const KERN_SUCCESS: KernReturn = 0;
    const HOST_CPU_LOAD_INFO: c_int = 3;

    const CPU_STATE_USER: usize = 0;
    const CPU_STATE_SYSTEM: usize = 1;
    const CPU_STATE_IDLE: usize = 2;
    const CPU_STATE_NICE: usize = 3;
    const CPU_STATE_MAX: usize = 4;

    /// `host_cpu_load_info_data_t`
    #[repr(C)]
    #[derive(Debug, Default)]
    struct HostCpuLoadInfo {
        cpu_ticks: [c_uint; CPU_STATE_MAX],
    }

    /// Size of [`HostCpuLoadInfo`] in `integer_t` units, as the kernel counts it.
    const HOST_CPU_LOAD_INFO_COUNT: c_uint =
        (mem::size_of::<HostCpuLoadInfo>() / mem::size_of::<c_int>()) as c_uint;

    extern "C" {
        fn mach_host_self() -> MachPort;
        fn host_statistics(
            host: MachPort,
            flavor: c_int,
            host_info: *mut c_int,
            host_info_count: *mut c_uint,
        ) -> KernReturn;
    }

    /// Every `mach_host_self` call adds a send right, so the port is fetched once.
    fn host_port() -> MachPort {
        static HOST: OnceLock<MachPort> = OnceLock::new();
        // SAFETY: `mach_host_self` has no preconditions.
        *HOST.get_or_init(|| unsafe { mach_host_self() })
    }

    pub(super) fn host_cpu_ticks() -> Result<CpuTicks, ReadError> {
        let mut info = HostCpuLoadInfo::default();
        let mut count = HOST_CPU_LOAD_INFO_COUNT;

        // SAFETY: `info` is a `host_cpu_load_info` sized buffer and `count`
        // carries its capacity, which the kernel never writes past.
        let result = unsafe {
            host_statistics(
                host_port(),
                HOST_CPU_LOAD_INFO,
                (&mut info as *mut HostCpuLoadInfo).cast::<c_int>(),
                &mut count,
            )
        };

        if result != KERN_SUCCESS {
            return Err(ReadError::Kernel {
                call: "host_statistics",
                code: result,
            });
        }
        if count != HOST_CPU_LOAD_INFO_COUNT {
            return Err(ReadError::Parse(format!(
                "host_statistics returned {} of {} cpu load fields",
                count, HOST_CPU_LOAD_INFO_COUNT
            )));
        }

        let ticks = info.cpu_ticks;
        Ok(CpuTicks {
            user: u64::from(ticks[CPU_STATE_USER]),
            system: u64::from(ticks[CPU_STATE_SYSTEM]),
            idle: u64::from(ticks[CPU_STATE_IDLE]),
            nice: u64::from(ticks[CPU_STATE_NICE]),
        })
    }
}

/// Parses the aggregate `cpu` line of `/proc/stat`.
///
/// The kernel reports `user nice system idle iowait irq softirq steal ...`.
/// `iowait` is idle time from the scheduler's point of view and is folded into
/// `idle`; `irq`, `softirq` and `steal` are folded into `system`. Older kernels
/// stop after `idle`, so only the first four columns are required.
pub fn parse_proc_stat(contents: &str) -> Result<CpuTicks, ReadError> {
    let line = contents
        .lines()
        .find(|line| line.split_whitespace().next() == Some("cpu"))
        .ok_or_else(|| ReadError::Parse("missing aggregate cpu line".to_string()))?;

    let columns = line
        .split_whitespace()
        .skip(1)
        .map(|column| {
            column
                .parse::<u64>()
                .map_err(|e| ReadError::Parse(format!("bad cpu column {:?}: {}", column, e)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if columns.len() < 4 {
        return Err(ReadError::Parse(format!(
            "expected at least 4 cpu columns, found {}",
            columns.len()
        )));
    }

    let column = |index: usize| columns.get(index).copied().unwrap_or(0);

    Ok(CpuTicks {
        user: column(0),
        nice: column(1),
        system: column(2)
            .saturating_add(column(5))
            .saturating_add(column(6))
            .saturating_add(column(7)),
        idle: column(3).saturating_add(column(4)),
    })
}

#[cfg(test)]
mod cpu_tests {
    use super::*;
    use pretty_assertions_sorted::assert_eq;
    use std::io::Write;

    const PROC_STAT_SAMPLE: &str = "\
cpu  4705 356 584 3699176 23 0 12 5 0 0
cpu0 1393 280 283 924513 4 0 6 1 0 0
cpu1 3312 76 301 2774663 19 0 6 4 0 0
intr 1462898 0 0 0
ctxt 2315744
";

    #[test]
    fn test_parse_full_line() {
        let ticks = parse_proc_stat(PROC_STAT_SAMPLE).unwrap();
        assert_eq!(
            ticks,
            CpuTicks {
                user: 4705,
                nice: 356,
                system: 584 + 12 + 5,
                idle: 3699176 + 23,
            }
        );
    }

    #[test]
    fn test_parse_old_kernel_four_columns() {
        let ticks = parse_proc_stat("cpu 1 2 3 4\n").unwrap();
        assert_eq!(ticks, CpuTicks::new(1, 3, 4, 2));
    }

    #[test]
    fn test_parse_ignores_per_core_lines() {
        let ticks = parse_proc_stat("cpu0 9 9 9 9\ncpu 1 0 1 2\n").unwrap();
        assert_eq!(ticks.total(), 4);
    }

    #[test]
    fn test_parse_rejects_missing_line() {
        let err = parse_proc_stat("intr 1 2 3\n").unwrap_err();
        assert!(matches!(err, ReadError::Parse(_)));
    }

    #[test]
    fn test_parse_rejects_short_line() {
        let err = parse_proc_stat("cpu 1 2\n").unwrap_err();
        assert!(matches!(err, ReadError::Parse(_)));
    }

    #[test]
    fn test_parse_rejects_garbage_column() {
        let err = parse_proc_stat("cpu 1 x 3 4\n").unwrap_err();
        assert!(matches!(err, ReadError::Parse(_)));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_read_from_custom_source() {
        let mut temp_file = tempfile::NamedTempFile::new().unwrap();
        write!(temp_file, "{}", PROC_STAT_SAMPLE).unwrap();

        let reader = CpuTickReader::builder()
            .source(temp_file.path().to_path_buf())
            .build();

        assert_eq!(reader.read().unwrap().user, 4705);
    }

    #[test]
    fn test_usage_ticks_split_elapsed_time() {
        let mut usage = UsageTicks::new();

        let ticks = usage.advance(25.0, Duration::from_secs(2));
        assert_eq!(ticks, CpuTicks::new(500, 0, 1_500, 0));

        let ticks = usage.advance(100.0, Duration::from_millis(400));
        assert_eq!(ticks, CpuTicks::new(900, 0, 1_500, 0));
    }

    #[test]
    fn test_usage_ticks_clamp_bad_usage() {
        let mut usage = UsageTicks::new();

        assert_eq!(
            usage.advance(250.0, Duration::from_secs(1)),
            CpuTicks::new(1_000, 0, 0, 0)
        );
        assert_eq!(
            usage.advance(f32::NAN, Duration::from_secs(1)),
            CpuTicks::new(1_000, 0, 1_000, 0)
        );
        assert_eq!(
            usage.advance(-5.0, Duration::from_secs(1)),
            CpuTicks::new(1_000, 0, 2_000, 0)
        );
    }

    #[test]
    fn test_usage_ticks_first_sample_is_zero_then_monotonic() {
        let mut usage = UsageTicks::new();

        let first = usage.sample();
        assert_eq!(first, CpuTicks::default());

        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        let second = usage.sample();
        assert!(second.total() >= first.total());
        assert!(second.user >= first.user && second.idle >= first.idle);
    }

    #[test]
    #[cfg(target_os = "macos")]
    fn test_read_host_ticks_are_monotonic() {
        let reader = CpuTickReader::new();

        let first = reader.read().unwrap();
        std::thread::sleep(Duration::from_millis(50));
        let second = reader.read().unwrap();

        assert!(first.total() > 0);
        assert!(second.total() >= first.total());
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_read_missing_source_is_io_error() {
        let reader = CpuTickReader::builder()
            .source(PathBuf::from("/nonexistent/stat"))
            .build();

        assert!(matches!(reader.read(), Err(ReadError::Io(_))));
    }
}

use crate::collector::CounterReaderRef;
use crate::rate::{fold_disk, Baseline, FastReads};
use crate::snapshot::MetricsSnapshot;
use common::config::MonitorConfig;
use common::util::time::format_duration;
use core::fmt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, trace, warn};

/// Lifecycle state of a [`SamplingScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchedulerState {
    Stopped,
    Running,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerState::Stopped => write!(f, "stopped"),
            SchedulerState::Running => write!(f, "running"),
        }
    }
}

/// Everything a tick needs to commit, guarded by one lock.
///
/// Reads happen outside the lock; only the running check, the fold and the
/// publish happen under it, so the lock is held for microseconds. Holding it
/// while publishing makes the scheduler core the only writer of the snapshot.
#[derive(Debug)]
struct Core {
    state: SchedulerState,
    /// Bumped on every start so that ticks begun under an earlier run are
    /// discarded even if the engine was restarted in the meantime.
    epoch: u64,
    baseline: Baseline,
    producers: Vec<JoinHandle<()>>,
}

impl Core {
    fn accepts(&self, epoch: u64) -> bool {
        self.state == SchedulerState::Running && self.epoch == epoch
    }
}

struct Inner {
    reader: CounterReaderRef,
    fast_interval: Duration,
    slow_interval: Duration,
    core: Mutex<Core>,
    publisher: watch::Sender<MetricsSnapshot>,
}

impl fmt::Debug for Inner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inner")
            .field("fast_interval", &self.fast_interval)
            .field("slow_interval", &self.slow_interval)
            .field("core", &self.core)
            .finish()
    }
}

impl Inner {
    #[instrument(name = "Scheduler::fast_tick", skip(self))]
    async fn fast_tick(&self, epoch: u64) {
        if !self.core.lock().accepts(epoch) {
            trace!("Engine stopped, skipping fast tick");
            return;
        }

        let started = Instant::now();
        let cpu = self.reader.read_cpu_ticks().await;
        let memory = self.reader.read_memory().await;
        let network = self.reader.read_network().await;
        let now = Instant::now();
        let reads = FastReads {
            cpu,
            memory,
            network,
        };

        let mut core = self.core.lock();
        if !core.accepts(epoch) {
            debug!("Engine stopped while reading, discarding fast tick");
            return;
        }

        let baseline = &mut core.baseline;
        self.publisher
            .send_modify(|snapshot| *snapshot = baseline.fold(snapshot, reads, now));
        debug!(elapsed = %format_duration(started.elapsed()), "Published fast tick");
    }

    #[instrument(name = "Scheduler::slow_tick", skip(self))]
    async fn slow_tick(&self, epoch: u64) {
        if !self.core.lock().accepts(epoch) {
            trace!("Engine stopped, skipping slow tick");
            return;
        }

        let started = Instant::now();
        let disk = self.reader.read_disk().await;

        let core = self.core.lock();
        if !core.accepts(epoch) {
            debug!("Engine stopped while reading, discarding slow tick");
            return;
        }

        self.publisher
            .send_modify(|snapshot| *snapshot = fold_disk(snapshot, disk));
        drop(core);
        debug!(elapsed = %format_duration(started.elapsed()), "Published slow tick");
    }

    fn arm_fast(self: &Arc<Self>, epoch: u64) -> JoinHandle<()> {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = periodic(inner.fast_interval);
            loop {
                interval.tick().await;
                inner.fast_tick(epoch).await;
            }
        })
    }

    fn arm_slow(self: &Arc<Self>, epoch: u64) -> JoinHandle<()> {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = periodic(inner.slow_interval);
            loop {
                interval.tick().await;
                inner.slow_tick(epoch).await;
            }
        })
    }
}

/// An interval whose first tick is one full period away. Ticks missed while
/// the host is starved are skipped rather than replayed in a burst.
fn periodic(period: Duration) -> time::Interval {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// Drives the fast (CPU, memory, network) and slow (disk) sampling cadences and
/// publishes a [`MetricsSnapshot`] after every tick.
///
/// Observers never touch the scheduler directly; they hold a [`MetricsHandle`]
/// and read the latest snapshot whenever they like.
///
/// # Examples
///
/// ```rust,no_run
/// use common::config::MonitorConfig;
/// use metrics::collector::SystemCounterReader;
/// use metrics::scheduler::SamplingScheduler;
/// use std::sync::Arc;
///
/// # async fn run() {
/// let config = MonitorConfig::default();
/// let reader = Arc::new(SystemCounterReader::new(&config));
/// let scheduler = SamplingScheduler::new(reader, &config).await;
/// let handle = scheduler.handle();
///
/// scheduler.start().await;
/// println!("{:?}", handle.snapshot());
/// scheduler.stop();
/// # }
/// ```
#[derive(Debug)]
pub struct SamplingScheduler {
    inner: Arc<Inner>,
}

impl SamplingScheduler {
    /// Creates a stopped scheduler.
    ///
    /// Takes the initial CPU and network samples that the first fast tick is
    /// measured against, and reads the disk once so that the slow gauges have
    /// data before the first slow tick.
    #[instrument(skip(reader, config))]
    pub async fn new(reader: CounterReaderRef, config: &MonitorConfig) -> Self {
        let cpu = reader.read_cpu_ticks().await;
        let network = reader.read_network().await;
        let network_at = Instant::now();
        let disk = reader.read_disk().await;

        if let Err(e) = &cpu {
            warn!(error = %e, "Initial CPU sample failed, CPU gauge starts without a baseline");
        }
        if let Err(e) = &network {
            warn!(error = %e, "Initial network sample failed, network gauge starts without a baseline");
        }

        let baseline = Baseline::new(cpu.ok(), network.ok(), network_at);
        let (publisher, _) = watch::channel(fold_disk(&MetricsSnapshot::default(), disk));

        debug!(
            fast_interval = ?config.fast_interval(),
            slow_interval = ?config.slow_interval(),
            "Created sampling scheduler"
        );

        Self {
            inner: Arc::new(Inner {
                reader,
                fast_interval: config.fast_interval(),
                slow_interval: config.slow_interval(),
                core: Mutex::new(Core {
                    state: SchedulerState::Stopped,
                    epoch: 0,
                    baseline,
                    producers: Vec::new(),
                }),
                publisher,
            }),
        }
    }

    /// Starts sampling.
    ///
    /// Runs one fast tick right away so observers see data without waiting a
    /// full period, then arms both periodic producers. Calling `start` on a
    /// running scheduler does nothing.
    #[instrument(skip(self))]
    pub async fn start(&self) {
        let epoch = {
            let mut core = self.inner.core.lock();
            if core.state == SchedulerState::Running {
                debug!("Scheduler already running");
                return;
            }
            core.state = SchedulerState::Running;
            core.epoch += 1;
            core.epoch
        };

        info!(epoch, "Starting host metrics sampling");
        self.inner.fast_tick(epoch).await;

        let mut core = self.inner.core.lock();
        if !core.accepts(epoch) {
            debug!("Scheduler stopped during the initial tick, not arming producers");
            return;
        }
        core.producers = vec![self.inner.arm_fast(epoch), self.inner.arm_slow(epoch)];
        debug!(
            fast_interval = ?self.inner.fast_interval,
            slow_interval = ?self.inner.slow_interval,
            "Armed periodic producers"
        );
    }

    /// Stops sampling.
    ///
    /// Once this returns the snapshot is never modified again (until the next
    /// `start`), even if a read is still in flight. Safe to call from any
    /// context, and a no-op on a stopped scheduler.
    #[instrument(skip(self))]
    pub fn stop(&self) {
        let mut core = self.inner.core.lock();
        if core.state == SchedulerState::Stopped {
            return;
        }

        core.state = SchedulerState::Stopped;
        for producer in core.producers.drain(..) {
            producer.abort();
        }
        info!(epoch = core.epoch, "Stopped host metrics sampling");
    }

    pub fn state(&self) -> SchedulerState {
        self.inner.core.lock().state
    }

    /// Returns a handle observers use to read published snapshots.
    pub fn handle(&self) -> MetricsHandle {
        MetricsHandle {
            receiver: self.inner.publisher.subscribe(),
        }
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        *self.inner.publisher.borrow()
    }

    #[cfg(test)]
    fn armed_producers(&self) -> usize {
        self.inner.core.lock().producers.len()
    }
}

impl Drop for SamplingScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Read side of the published snapshot. Cheap to clone; reading never blocks
/// the sampler beyond the channel's short internal lock.
#[derive(Debug, Clone)]
pub struct MetricsHandle {
    receiver: watch::Receiver<MetricsSnapshot>,
}

impl MetricsHandle {
    /// The latest published snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        *self.receiver.borrow()
    }

    /// Waits for the next publication and returns it. Returns `None` once the
    /// scheduler has been dropped.
    pub async fn changed(&mut self) -> Option<MetricsSnapshot> {
        self.receiver.changed().await.ok()?;
        Some(*self.receiver.borrow_and_update())
    }
}

use crate::error::ReadError;
use crate::sample::NetworkCounters;
use get_if_addrs::get_if_addrs;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use sysinfo::Networks;
use tracing::{debug, instrument, trace};

/// Interface names that are loopback by convention (Linux, BSD/macOS).
const LOOPBACK_NAMES: [&str; 2] = ["lo", "lo0"];

/// A reference-counted, lockable handle to the [`Networks`] list.
pub type NetworksRef = Arc<Mutex<Networks>>;

/// Sums cumulative byte counters across every non-loopback interface.
#[derive(Debug, Clone)]
pub struct NetworkReader {
    networks: NetworksRef,
}

impl Default for NetworkReader {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkReader {
    pub fn new() -> Self {
        Self {
            networks: Arc::new(Mutex::new(Networks::new_with_refreshed_list())),
        }
    }

    #[instrument(skip(self))]
    pub fn read(&self) -> Result<NetworkCounters, ReadError> {
        let loopback = loopback_interfaces();
        let mut networks = self.networks.lock();
        // Interfaces come and go; rebuild the list so the sum only covers
        // interfaces that exist right now.
        networks.refresh_list();
        networks.refresh();

        let counters = sum_interfaces(
            networks.list().iter().map(|(name, data)| {
                (
                    name.as_str(),
                    data.total_received(),
                    data.total_transmitted(),
                )
            }),
            &loopback,
        );

        trace!(?counters, "Read network counters");
        Ok(counters)
    }
}

/// Names of loopback interfaces as reported by the OS, plus the conventional names.
pub fn loopback_interfaces() -> HashSet<String> {
    let mut names = LOOPBACK_NAMES
        .iter()
        .map(|name| name.to_string())
        .collect::<HashSet<_>>();

    match get_if_addrs() {
        Ok(interfaces) => names.extend(
            interfaces
                .into_iter()
                .filter(|interface| interface.is_loopback())
                .map(|interface| interface.name),
        ),
        Err(e) => debug!(error = %e, "Interface address lookup failed, using loopback names only"),
    }

    names
}

/// Sums `(name, bytes_in, bytes_out)` triples, skipping anything in `loopback`.
pub fn sum_interfaces<'a>(
    interfaces: impl IntoIterator<Item = (&'a str, u64, u64)>,
    loopback: &HashSet<String>,
) -> NetworkCounters {
    interfaces
        .into_iter()
        .filter(|(name, _, _)| !loopback.contains(*name))
        .fold(
            NetworkCounters::default(),
            |mut counters, (name, bytes_in, bytes_out)| {
                counters.accumulate(name, bytes_in, bytes_out);
                counters
            },
        )
}

#[cfg(test)]
mod network_tests {
    use super::*;

    fn loopback() -> HashSet<String> {
        LOOPBACK_NAMES.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_sum_skips_loopback() {
        let interfaces = vec![
            ("lo", 9_000, 9_000),
            ("eth0", 1_000, 500),
            ("wlan0", 250, 50),
        ];

        let counters = sum_interfaces(interfaces, &loopback());
        assert_eq!(counters, NetworkCounters::new(1_250, 550));
    }

    #[test]
    fn test_sum_no_interfaces_is_zero() {
        let interfaces: Vec<(&str, u64, u64)> = vec![];
        assert_eq!(
            sum_interfaces(interfaces, &loopback()),
            NetworkCounters::default()
        );
    }

    #[test]
    fn test_sum_only_loopback_is_zero() {
        let interfaces = vec![("lo0", 42, 42)];
        assert_eq!(
            sum_interfaces(interfaces, &loopback()),
            NetworkCounters::default()
        );
    }

    #[test]
    fn test_sum_saturates() {
        let interfaces = vec![("eth0", u64::MAX, 1), ("eth1", 10, 1)];
        let counters = sum_interfaces(interfaces, &loopback());
        assert_eq!(counters.bytes_in, u64::MAX);
        assert_eq!(counters.bytes_out, 2);
    }

    #[test]
    fn test_loopback_names_always_present() {
        let names = loopback_interfaces();
        assert!(names.contains("lo"));
        assert!(names.contains("lo0"));
    }
}

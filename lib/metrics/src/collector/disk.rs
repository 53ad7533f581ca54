use crate::error::ReadError;
use crate::sample::DiskSample;
use getset::Getters;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sysinfo::Disks;
use tracing::{instrument, trace};

/// A reference-counted, lockable handle to the [`Disks`] list.
pub type DisksRef = Arc<Mutex<Disks>>;

/// Reads capacity of the volume backing a mount point (the root volume by default).
#[derive(Debug, Clone, Getters)]
pub struct DiskReader {
    disks: DisksRef,
    #[getset(get = "pub")]
    mount_point: PathBuf,
}

impl DiskReader {
    pub fn new(mount_point: impl Into<PathBuf>) -> Self {
        Self {
            disks: Arc::new(Mutex::new(Disks::new_with_refreshed_list())),
            mount_point: mount_point.into(),
        }
    }

    #[instrument(skip(self), fields(mount_point = %self.mount_point.display()))]
    pub fn read(&self) -> Result<DiskSample, ReadError> {
        let mut disks = self.disks.lock();
        // Volumes can be mounted and unmounted while we run.
        disks.refresh_list();

        let sample = select_volume(
            disks.list().iter().map(|disk| {
                (
                    disk.mount_point(),
                    disk.total_space(),
                    disk.available_space(),
                )
            }),
            &self.mount_point,
        )
        .ok_or(ReadError::Unavailable("volume for the configured mount point"))?;

        trace!(?sample, "Read disk capacity");
        Ok(sample)
    }
}

/// Picks the volume whose mount point is the longest prefix of `target` and
/// converts its `(total, available)` capacity into a [`DiskSample`].
pub fn select_volume<'a>(
    volumes: impl IntoIterator<Item = (&'a Path, u64, u64)>,
    target: &Path,
) -> Option<DiskSample> {
    volumes
        .into_iter()
        .filter(|(mount_point, _, _)| target.starts_with(mount_point))
        .max_by_key(|(mount_point, _, _)| mount_point.components().count())
        .map(|(_, total, available)| DiskSample::from_capacity(total, available))
}

#[cfg(test)]
mod disk_tests {
    use super::*;
    use pretty_assertions_sorted::assert_eq;

    #[test]
    fn test_select_root_volume() {
        let volumes = vec![
            (Path::new("/boot"), 1_000, 900),
            (Path::new("/"), 500_000, 120_000),
            (Path::new("/home"), 2_000_000, 1_000_000),
        ];

        let sample = select_volume(volumes, Path::new("/")).unwrap();
        assert_eq!(sample, DiskSample::from_capacity(500_000, 120_000));
    }

    #[test]
    fn test_select_longest_prefix() {
        let volumes = vec![
            (Path::new("/"), 500_000, 120_000),
            (Path::new("/home"), 2_000_000, 1_000_000),
        ];

        let sample = select_volume(volumes, Path::new("/home/user")).unwrap();
        assert_eq!(sample.total_bytes, 2_000_000);
        assert_eq!(sample.used_bytes, 1_000_000);
    }

    #[test]
    fn test_select_skips_sibling_prefixes() {
        // `/homework` must not match `/home`.
        let volumes = vec![
            (Path::new("/"), 100, 40),
            (Path::new("/home"), 2_000, 1_000),
        ];

        let sample = select_volume(volumes, Path::new("/homework")).unwrap();
        assert_eq!(sample.total_bytes, 100);
    }

    #[test]
    fn test_select_nothing_mounted() {
        let volumes: Vec<(&Path, u64, u64)> = vec![];
        assert!(select_volume(volumes, Path::new("/")).is_none());
    }

    #[test]
    fn test_available_exceeding_total_clamps() {
        let volumes = vec![(Path::new("/"), 100, 400)];
        let sample = select_volume(volumes, Path::new("/")).unwrap();
        assert_eq!(sample.used_bytes, 0);
    }
}

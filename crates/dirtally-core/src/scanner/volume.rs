/// Whole-volume scans with free-space and inaccessible-space buckets.
///
/// A volume scan is a directory scan of the volume root in
/// [`SizeMode::Allocated`], framed by the volume's own accounting:
///
/// - capacity and free space are read once, before the walk, and give the
///   occupied baseline used for percentage progress;
/// - after the walk, whatever part of the occupied space no readable file
///   accounted for becomes the `[Inaccessible]` bucket, shown next to a
///   `[Free space]` bucket.
use super::session::{CancelFlag, ScanSession};
use super::tree::TreeScanner;
use crate::error::ScanError;
use crate::model::{display_threshold, FsNode, SizeMode, VolumeSpace};
use crate::platform::{volume_label, volume_root, ListingSource, PlatformListing};
use crate::platform::{SystemVolumes, VolumeInfo};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub const FREE_SPACE_NODE: &str = "[Free space]";
pub const INACCESSIBLE_NODE: &str = "[Inaccessible]";

/// Scanner front end for both volume and directory scans.
///
/// Holds the last volume snapshot so the presentation layer can ask for
/// display thresholds after the scan.
pub struct VolumeScanner<S = PlatformListing, V = SystemVolumes> {
    tree: TreeScanner<S>,
    volumes: V,
}

impl VolumeScanner<PlatformListing, SystemVolumes> {
    /// A scanner on the platform's native listing source.
    ///
    /// `directory_mode` is the size mode for [`scan_directory`](Self::scan_directory);
    /// volume scans always count allocated size.
    pub fn new(directory_mode: SizeMode) -> Self {
        Self::with_parts(TreeScanner::new(directory_mode), SystemVolumes)
    }
}

impl<S: ListingSource, V: VolumeInfo> VolumeScanner<S, V> {
    pub fn with_parts(tree: TreeScanner<S>, volumes: V) -> Self {
        Self { tree, volumes }
    }

    pub fn session(&self) -> Arc<ScanSession> {
        self.tree.session()
    }

    /// Scan a whole volume, e.g. `"C:"` or `"/"`.
    ///
    /// Fails only when the volume's capacity cannot be read; everything
    /// after that is recovered inside the walk.
    pub fn scan_volume(&mut self, drive_id: &str, cancel: &CancelFlag) -> Result<FsNode, ScanError> {
        let root_path = volume_root(drive_id);
        let space = self.volumes.space(&root_path).map_err(|source| {
            warn!("Cannot read space for volume {drive_id}: {source}");
            ScanError::VolumeInfo {
                volume: drive_id.to_string(),
                source,
            }
        })?;
        info!(
            "Volume {drive_id}: total {} bytes, free {} bytes, occupied {} bytes",
            space.total,
            space.free,
            space.occupied()
        );

        let session = self.tree.session();
        session.reset(drive_id, space);

        let directory_mode = self.tree.mode();
        self.tree.set_mode(SizeMode::Allocated);
        let outcome = self.tree.scan_unit(&root_path, volume_label(drive_id), cancel);
        self.tree.set_mode(directory_mode);

        if outcome.cancelled {
            info!("Volume {drive_id}: buckets reflect a partial walk");
        }

        Ok(attach_buckets(outcome.root, space, outcome.processed))
    }

    /// Scan a directory subtree in the scanner's directory size mode.
    pub fn scan_directory(&mut self, path: impl AsRef<Path>, cancel: &CancelFlag) -> FsNode {
        self.tree.scan_directory(path, cancel)
    }

    /// Byte cutoff below which the presentation layer should bucket nodes,
    /// based on the last volume scan. Directory scans have no baseline and
    /// yield 0.
    pub fn compute_display_threshold(&self, fraction: f64, include_free_space: bool) -> i64 {
        display_threshold(fraction, include_free_space, self.tree.session().space())
    }
}

/// Prepend the free-space and inaccessible buckets to a volume root.
///
/// The root's size is raised by both bucket sizes so it keeps equalling
/// the sum of its children.
pub fn attach_buckets(mut root: FsNode, space: VolumeSpace, processed: i64) -> FsNode {
    let inaccessible = (space.occupied() - processed).max(0);
    let buckets = [
        FsNode::new_synthetic(FREE_SPACE_NODE, space.free),
        FsNode::new_synthetic(INACCESSIBLE_NODE, inaccessible),
    ];

    let mut children = root.children.take().unwrap_or_default();
    children.splice(0..0, buckets);
    root.size = children.iter().map(|c| c.size).sum();
    root.children = Some(children);
    root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{DirEntry, RawRecord};
    use std::collections::HashMap;
    use std::io;
    use std::path::PathBuf;

    struct FixedSpace(io::Result<VolumeSpace>);

    impl VolumeInfo for FixedSpace {
        fn space(&self, _root: &Path) -> io::Result<VolumeSpace> {
            match &self.0 {
                Ok(space) => Ok(*space),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            }
        }
    }

    #[derive(Default)]
    struct MemFs(HashMap<PathBuf, Vec<RawRecord>>);

    impl MemFs {
        fn dir(mut self, path: PathBuf, entries: &[(&str, i64, i64, bool)]) -> Self {
            let records = entries
                .iter()
                .map(|&(name, logical, allocated, is_dir)| RawRecord {
                    entry: DirEntry {
                        name: name.into(),
                        os_name: name.into(),
                        logical_size: logical,
                        allocated_size: allocated,
                        is_directory: is_dir,
                        last_modified_raw: 0,
                    },
                    reparse_point: false,
                    offline: false,
                })
                .collect();
            self.0.insert(path, records);
            self
        }
    }

    impl ListingSource for MemFs {
        type Records<'a>
            = std::iter::Map<
            std::vec::IntoIter<RawRecord>,
            fn(RawRecord) -> Result<RawRecord, ScanError>,
        >
        where
            Self: 'a;

        fn open<'a>(&'a mut self, dir: &Path) -> Result<Self::Records<'a>, ScanError> {
            let records = self.0.get(dir).cloned().ok_or_else(|| {
                ScanError::access_denied(dir, io::Error::from(io::ErrorKind::PermissionDenied))
            })?;
            Ok(records.into_iter().map(Ok as fn(_) -> _))
        }
    }

    /// `C:\` holding 750 allocated bytes, with one denied directory.
    fn scanner(space: io::Result<VolumeSpace>) -> VolumeScanner<MemFs, FixedSpace> {
        let root = volume_root("C:");
        let fs = MemFs::default()
            .dir(
                root.clone(),
                &[
                    ("Windows", 0, 0, true),
                    ("pagefile.sys", 300, 512, false),
                    ("System Volume Information", 0, 0, true),
                ],
            )
            .dir(root.join("Windows"), &[("explorer.exe", 200, 238, false)]);
        VolumeScanner::with_parts(
            TreeScanner::with_source(fs, SizeMode::Logical),
            FixedSpace(space),
        )
    }

    #[test]
    fn test_volume_buckets() {
        let mut scanner = scanner(Ok(VolumeSpace::new(1000, 200)));
        let root = scanner.scan_volume("C:", &CancelFlag::new()).unwrap();

        let children = root.children();
        assert_eq!(children[0].name, FREE_SPACE_NODE);
        assert_eq!(children[0].size, 200);
        assert!(!children[0].is_dir() && children[0].children.is_none());
        assert_eq!(children[1].name, INACCESSIBLE_NODE);
        assert_eq!(children[1].size, 50);
        assert_eq!(children[2].name, "Windows");
        assert_eq!(children[2].size, 238);

        assert_eq!(root.name, "C:");
        assert_eq!(root.size, 1000);
        assert!(root.sizes_are_consistent());

        let session = scanner.session();
        assert_eq!(session.processed_bytes(), 750);
        assert_eq!(session.progress_percent(), 93.75);
        assert_eq!(session.target(), "C:");
        assert_eq!(session.inaccessible_paths().len(), 1);
    }

    #[test]
    fn test_volume_scan_uses_allocated_then_restores_mode() {
        let mut scanner = scanner(Ok(VolumeSpace::new(1000, 200)));
        scanner.scan_volume("C:", &CancelFlag::new()).unwrap();
        assert_eq!(scanner.tree.mode(), SizeMode::Logical);
    }

    #[test]
    fn test_inaccessible_bucket_never_negative() {
        let mut scanner = scanner(Ok(VolumeSpace::new(1000, 600)));
        let root = scanner.scan_volume("C:", &CancelFlag::new()).unwrap();
        assert_eq!(root.child(INACCESSIBLE_NODE).unwrap().size, 0);
    }

    #[test]
    fn test_volume_info_failure() {
        let mut scanner = scanner(Err(io::Error::from(io::ErrorKind::NotFound)));
        let err = scanner.scan_volume("Q:", &CancelFlag::new()).unwrap_err();
        assert!(matches!(err, ScanError::VolumeInfo { ref volume, .. } if volume == "Q:"));
    }

    #[test]
    fn test_display_threshold_from_last_volume() {
        let mut scanner = scanner(Ok(VolumeSpace::new(1000, 200)));
        assert_eq!(scanner.compute_display_threshold(0.01, false), 0);
        scanner.scan_volume("C:", &CancelFlag::new()).unwrap();
        assert_eq!(scanner.compute_display_threshold(0.01, false), 8);
        assert_eq!(scanner.compute_display_threshold(0.01, true), 10);
    }

    #[test]
    fn test_cancelled_volume_scan_still_has_buckets() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let mut scanner = scanner(Ok(VolumeSpace::new(1000, 200)));
        let root = scanner.scan_volume("C:", &cancel).unwrap();

        assert_eq!(root.children().len(), 2);
        assert_eq!(root.child(INACCESSIBLE_NODE).unwrap().size, 800);
        assert!(root.sizes_are_consistent());
        assert!(scanner.session().inaccessible_paths().is_empty());
    }

    #[test]
    fn test_attach_buckets_example_figures() {
        let mut root = FsNode::new_dir("D:", chrono::Utc::now());
        root.children = Some(vec![FsNode::new_synthetic("data", 750)]);
        root.size = 750;
        let root = attach_buckets(root, VolumeSpace::new(1000, 200), 750);

        assert_eq!(root.child(FREE_SPACE_NODE).unwrap().size, 200);
        assert_eq!(root.child(INACCESSIBLE_NODE).unwrap().size, 50);
        assert_eq!(root.size, 1000);
    }
}

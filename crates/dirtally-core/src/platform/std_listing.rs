/// Portable listing source on top of `std::fs::read_dir`.
///
/// Used where no batched native primitive is wired up. `read_dir` already
/// batches internally (`getdents64` on Linux), and `DirEntry::metadata`
/// does not follow symlinks, so links are reported rather than traversed.
///
/// On Unix an entry living on a different device than its parent is a mount
/// point. It is reported as a reparse point, the same way Windows reports
/// volume mount points, so a walk never crosses into another filesystem.
use super::listing::{DirEntry, ListingSource, RawRecord};
use crate::error::ScanError;
use crate::model::utc_to_filetime;
use chrono::{DateTime, Utc};
use compact_str::CompactString;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::trace;

#[derive(Debug, Default, Clone, Copy)]
pub struct StdListing;

impl StdListing {
    pub fn new() -> Self {
        Self
    }
}

impl ListingSource for StdListing {
    type Records<'a>
        = StdRecords
    where
        Self: 'a;

    fn open<'a>(&'a mut self, dir: &Path) -> Result<StdRecords, ScanError> {
        let inner = fs::read_dir(dir).map_err(|e| ScanError::access_denied(dir, e))?;
        let device = fs::metadata(dir).ok().and_then(|meta| device_of(&meta));
        Ok(StdRecords {
            dir: dir.to_path_buf(),
            inner,
            device,
            done: false,
        })
    }
}

pub struct StdRecords {
    dir: PathBuf,
    inner: fs::ReadDir,
    /// Device of the listed directory, where the platform exposes one.
    device: Option<u64>,
    done: bool,
}

impl Iterator for StdRecords {
    type Item = Result<RawRecord, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    self.done = true;
                    return Some(Err(ScanError::access_denied(self.dir.clone(), err)));
                }
            };

            match entry.metadata() {
                Ok(meta) => {
                    let record = record_from_metadata(entry.file_name(), &meta, self.device);
                    return Some(Ok(record));
                }
                // Removed between the listing and the stat.
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    trace!("entry vanished during listing: {}", entry.path().display());
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(ScanError::access_denied(self.dir.clone(), err)));
                }
            }
        }
        None
    }
}

fn record_from_metadata(os_name: OsString, meta: &fs::Metadata, device: Option<u64>) -> RawRecord {
    let file_type = meta.file_type();
    let modified = meta
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or(DateTime::UNIX_EPOCH);
    let logical = meta.len() as i64;
    let (link, offline) = link_flags(meta);
    let mount_point = device.is_some_and(|parent| device_of(meta) != Some(parent));

    RawRecord {
        entry: DirEntry {
            name: CompactString::new(os_name.to_string_lossy()),
            os_name,
            logical_size: logical,
            allocated_size: allocated_size(meta, logical),
            is_directory: file_type.is_dir(),
            last_modified_raw: utc_to_filetime(modified),
        },
        reparse_point: link || mount_point,
        offline,
    }
}

#[cfg(unix)]
fn device_of(meta: &fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(meta.dev())
}

#[cfg(not(unix))]
fn device_of(_meta: &fs::Metadata) -> Option<u64> {
    None
}

#[cfg(unix)]
fn allocated_size(meta: &fs::Metadata, _logical: i64) -> i64 {
    use std::os::unix::fs::MetadataExt;
    // st_blocks is always in 512-byte units.
    (meta.blocks() as i64).saturating_mul(512)
}

#[cfg(not(unix))]
fn allocated_size(_meta: &fs::Metadata, logical: i64) -> i64 {
    logical
}

#[cfg(windows)]
fn link_flags(meta: &fs::Metadata) -> (bool, bool) {
    use super::nt_records::{FILE_ATTRIBUTE_OFFLINE, FILE_ATTRIBUTE_REPARSE_POINT};
    use std::os::windows::fs::MetadataExt;
    let attrs = meta.file_attributes();
    (
        attrs & FILE_ATTRIBUTE_REPARSE_POINT != 0,
        attrs & FILE_ATTRIBUTE_OFFLINE != 0,
    )
}

#[cfg(not(windows))]
fn link_flags(meta: &fs::Metadata) -> (bool, bool) {
    (meta.file_type().is_symlink(), false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_lists_files_and_dirs() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::File::create(tmp.path().join("data.bin"))
            .unwrap()
            .write_all(&[7u8; 321])
            .unwrap();

        let mut source = StdListing::new();
        let mut records: Vec<RawRecord> = source
            .open(tmp.path())
            .unwrap()
            .map(Result::unwrap)
            .collect();
        records.sort_by(|a, b| a.entry.name.cmp(&b.entry.name));

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].entry.name, "data.bin");
        assert_eq!(records[0].entry.logical_size, 321);
        assert!(!records[0].entry.is_directory);
        assert!(!records[0].reparse_point);
        assert_eq!(records[1].entry.name, "sub");
        assert!(records[1].entry.is_directory);
    }

    #[test]
    fn test_missing_directory_is_access_denied() {
        let tmp = TempDir::new().unwrap();
        let mut source = StdListing::new();
        let err = source.open(&tmp.path().join("nope")).err().unwrap();
        assert!(matches!(err, ScanError::AccessDenied { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_name_is_kept_raw() {
        use std::os::unix::ffi::{OsStrExt, OsStringExt};

        let tmp = TempDir::new().unwrap();
        let raw = std::ffi::OsStr::from_bytes(b"caf\xe9");
        fs::create_dir(tmp.path().join(raw)).unwrap();

        let mut source = StdListing::new();
        let record = source.open(tmp.path()).unwrap().next().unwrap().unwrap();
        assert_eq!(record.entry.name, "caf\u{FFFD}");
        assert_eq!(record.entry.os_name.clone().into_vec(), b"caf\xe9");
        assert!(record.entry.is_directory);
        assert!(!record.reparse_point);
    }

    #[cfg(unix)]
    #[test]
    fn test_entry_on_other_device_is_a_mount_point() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("mnt")).unwrap();
        let meta = fs::symlink_metadata(tmp.path().join("mnt")).unwrap();
        let own = device_of(&meta);

        let same = record_from_metadata("mnt".into(), &meta, own);
        assert!(!same.reparse_point);
        let other = own.map(|dev| dev.wrapping_add(1));
        let crossed = record_from_metadata("mnt".into(), &meta, other);
        assert!(crossed.reparse_point);
        assert!(!crossed.offline);
        assert!(crossed.entry.is_directory);
    }

    #[cfg(unix)]
    #[test]
    fn test_mount_points_are_reported_as_reparse_points() {
        use std::os::unix::fs::MetadataExt;

        let root_dev = fs::metadata("/").unwrap().dev();
        let mut source = StdListing::new();
        let records: Vec<RawRecord> = source
            .open(Path::new("/"))
            .unwrap()
            .filter_map(Result::ok)
            .collect();

        for record in &records {
            let path = Path::new("/").join(&record.entry.os_name);
            let Ok(meta) = fs::symlink_metadata(&path) else {
                continue;
            };
            if meta.dev() != root_dev {
                assert!(record.reparse_point, "{} crosses devices", path.display());
            } else if !meta.file_type().is_symlink() {
                assert!(!record.reparse_point, "{} is on the root device", path.display());
            }
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_is_reported_as_reparse_point() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("real")).unwrap();
        std::os::unix::fs::symlink(tmp.path().join("real"), tmp.path().join("alias")).unwrap();

        let mut source = StdListing::new();
        let alias = source
            .open(tmp.path())
            .unwrap()
            .map(Result::unwrap)
            .find(|r| r.entry.name == "alias")
            .unwrap();
        assert!(alias.reparse_point);
        assert!(!alias.offline);
        assert!(!alias.entry.is_directory);
    }
}

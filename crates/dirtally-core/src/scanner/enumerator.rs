/// Single-directory enumeration with link filtering.
///
/// Wraps a [`ListingSource`] and applies the entry policy every scan relies on:
///
/// - `.` and `..` are never returned;
/// - reparse points (symlinks, junctions, mount points) are skipped so a walk
///   never leaves its subtree or loops;
/// - reparse points that are also *offline* are kept. Those are hierarchical
///   storage placeholders whose data still occupies the volume's accounting,
///   and dropping them would shrink reported totals.
use crate::error::ScanError;
use crate::platform::{DirEntry, ListingSource, PlatformListing, RawRecord};
use std::path::Path;

/// The immediate children of one directory.
#[derive(Debug, Default)]
pub struct Listing {
    pub entries: Vec<DirEntry>,
    /// Set when listing stopped part-way. `entries` then holds what was read
    /// before the failure.
    pub interrupted: Option<ScanError>,
}

pub struct DirectoryEnumerator<S = PlatformListing> {
    source: S,
}

impl DirectoryEnumerator<PlatformListing> {
    pub fn new() -> Self {
        Self::with_source(PlatformListing::default())
    }
}

impl Default for DirectoryEnumerator<PlatformListing> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ListingSource> DirectoryEnumerator<S> {
    pub fn with_source(source: S) -> Self {
        Self { source }
    }

    /// The underlying listing source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// List `dir` without recursing.
    ///
    /// `Err` only when the directory cannot be opened; any later failure is
    /// reported through [`Listing::interrupted`].
    pub fn list(&mut self, dir: &Path) -> Result<Listing, ScanError> {
        let mut listing = Listing::default();
        for record in self.source.open(dir)? {
            match record {
                Ok(record) if is_counted(&record) => listing.entries.push(record.entry),
                Ok(_) => {}
                Err(err) => {
                    listing.interrupted = Some(err);
                    break;
                }
            }
        }
        Ok(listing)
    }
}

/// Whether a raw record becomes a child in the tree.
pub fn is_counted(record: &RawRecord) -> bool {
    let name = record.entry.name.as_str();
    if name == "." || name == ".." {
        return false;
    }
    !record.reparse_point || record.offline
}

#[cfg(test)]
mod tests {
    use super::*;
    use compact_str::CompactString;
    use std::collections::VecDeque;
    use std::io;
    use std::path::PathBuf;

    /// Replays a fixed record sequence, optionally failing to open.
    struct Scripted {
        records: VecDeque<Result<RawRecord, ScanError>>,
        deny: bool,
    }

    impl ListingSource for Scripted {
        type Records<'a>
            = std::collections::vec_deque::Drain<'a, Result<RawRecord, ScanError>>
        where
            Self: 'a;

        fn open<'a>(&'a mut self, dir: &Path) -> Result<Self::Records<'a>, ScanError> {
            if self.deny {
                return Err(ScanError::access_denied(
                    dir,
                    io::Error::from(io::ErrorKind::PermissionDenied),
                ));
            }
            Ok(self.records.drain(..))
        }
    }

    fn record(name: &str, size: i64, dir: bool, reparse: bool, offline: bool) -> RawRecord {
        RawRecord {
            entry: DirEntry {
                name: CompactString::new(name),
                os_name: name.into(),
                logical_size: size,
                allocated_size: (size + 4095).div_euclid(4096) * 4096,
                is_directory: dir,
                last_modified_raw: 0,
            },
            reparse_point: reparse,
            offline,
        }
    }

    fn enumerate(records: Vec<Result<RawRecord, ScanError>>) -> Listing {
        let mut en = DirectoryEnumerator::with_source(Scripted {
            records: records.into(),
            deny: false,
        });
        en.list(Path::new("/x")).unwrap()
    }

    fn names(listing: &Listing) -> Vec<&str> {
        listing.entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_skips_dot_entries() {
        let listing = enumerate(vec![
            Ok(record(".", 0, true, false, false)),
            Ok(record("..", 0, true, false, false)),
            Ok(record("a.txt", 5, false, false, false)),
        ]);
        assert_eq!(names(&listing), ["a.txt"]);
        assert!(listing.interrupted.is_none());
    }

    #[test]
    fn test_skips_links_but_keeps_offline_placeholders() {
        let listing = enumerate(vec![
            Ok(record("junction", 0, true, true, false)),
            Ok(record("symlink.txt", 0, false, true, false)),
            Ok(record("archived.iso", 7_000, false, true, true)),
            Ok(record("plain.bin", 10, false, false, false)),
        ]);
        assert_eq!(names(&listing), ["archived.iso", "plain.bin"]);
        assert_eq!(listing.entries[0].logical_size, 7_000);
        assert_eq!(listing.entries[0].allocated_size, 8_192);
    }

    #[test]
    fn test_keeps_platform_order() {
        let listing = enumerate(vec![
            Ok(record("zeta", 1, false, false, false)),
            Ok(record("alpha", 1, false, false, false)),
            Ok(record("mid", 0, true, false, false)),
        ]);
        assert_eq!(names(&listing), ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_mid_listing_failure_keeps_partial_entries() {
        let listing = enumerate(vec![
            Ok(record("first", 1, false, false, false)),
            Err(ScanError::access_denied(
                PathBuf::from("/x"),
                io::Error::other("NTSTATUS 0xc0000022"),
            )),
            Ok(record("never", 1, false, false, false)),
        ]);
        assert_eq!(names(&listing), ["first"]);
        assert!(matches!(
            listing.interrupted,
            Some(ScanError::AccessDenied { .. })
        ));
    }

    #[test]
    fn test_open_failure_is_access_denied() {
        let mut en = DirectoryEnumerator::with_source(Scripted {
            records: VecDeque::new(),
            deny: true,
        });
        let err = en.list(Path::new("/locked")).unwrap_err();
        assert!(matches!(err, ScanError::AccessDenied { ref path, .. } if path == Path::new("/locked")));
    }
}

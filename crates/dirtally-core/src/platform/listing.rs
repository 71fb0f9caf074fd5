/// The directory-listing capability the enumerator is built on.
///
/// A [`ListingSource`] opens one directory and yields its raw records lazily,
/// in platform order, exactly once. Buffer management and record layout stay
/// behind this trait; everything above it sees owned [`RawRecord`]s.
use crate::error::ScanError;
use compact_str::CompactString;
use std::ffi::OsString;
use std::path::Path;

/// Size of the reusable buffer batched listing calls write into.
///
/// Large enough that a directory with tens of thousands of entries is read
/// in a handful of calls.
pub const LISTING_BUFFER_SIZE: usize = 1024 * 1024;

/// One immediate child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Display name. Lossy when the platform name is not valid Unicode.
    pub name: CompactString,
    /// The name exactly as the platform returned it; child paths are built
    /// from this, never from `name`.
    pub os_name: OsString,
    /// End-of-file length in bytes.
    pub logical_size: i64,
    /// Bytes allocated on the media.
    pub allocated_size: i64,
    pub is_directory: bool,
    /// Last write time as NT ticks (100 ns since 1601-01-01 UTC).
    pub last_modified_raw: i64,
}

/// A record as the platform reported it, before link filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub entry: DirEntry,
    /// Symbolic link, junction, or any other reparse point.
    pub reparse_point: bool,
    /// Data lives on secondary storage (hierarchical storage placeholder).
    pub offline: bool,
}

/// Platform primitive: open a directory and stream its records.
///
/// An `Err` from [`open`](ListingSource::open) means the directory could not
/// be opened at all. An `Err` item from the iterator means listing stopped
/// part-way; sources yield nothing after it.
pub trait ListingSource {
    type Records<'a>: Iterator<Item = Result<RawRecord, ScanError>>
    where
        Self: 'a;

    fn open<'a>(&'a mut self, dir: &Path) -> Result<Self::Records<'a>, ScanError>;
}

/// A single node in the aggregated size tree.
///
/// Unlike an arena tree, every `FsNode` owns its children outright: there are
/// no parent back-references and no shared ownership, so a finished scan is a
/// plain value that can be moved to another thread, serialised, or dropped in
/// one go.
use chrono::{DateTime, TimeZone, Utc};
use compact_str::CompactString;
use serde::Serialize;

/// Number of 100 ns ticks between 1601-01-01 (NT epoch) and 1970-01-01.
const NT_TO_UNIX_EPOCH_TICKS: i64 = 116_444_736_000_000_000;

/// A single file or directory in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FsNode {
    /// File or directory name only (NOT the full path).
    pub name: CompactString,

    /// Size in bytes under the scan's [`SizeMode`](super::SizeMode).
    /// For directories this is the sum of all descendant sizes.
    pub size: i64,

    /// `true` if this node represents a directory. Fixed at construction.
    #[serde(rename = "is_dir")]
    dir: bool,

    /// Last-write timestamp. Synthetic nodes use the time they were built.
    pub last_modified: DateTime<Utc>,

    /// `None` means the directory was never listed (access denied, cancelled
    /// before the visit, or a plain file). `Some(vec![])` means it was listed
    /// and is empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FsNode>>,
}

impl FsNode {
    /// Create a file node with the given size.
    pub fn new_file(name: impl Into<CompactString>, size: i64, modified: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            size,
            dir: false,
            last_modified: modified,
            children: None,
        }
    }

    /// Create an unscanned directory node. Its size stays 0 until the
    /// scanner lists it.
    pub fn new_dir(name: impl Into<CompactString>, modified: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            size: 0,
            dir: true,
            last_modified: modified,
            children: None,
        }
    }

    /// Create a synthetic leaf such as the free-space bucket of a volume scan.
    pub fn new_synthetic(name: impl Into<CompactString>, size: i64) -> Self {
        Self::new_file(name, size, Utc::now())
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.dir
    }

    /// A directory that was never listed.
    ///
    /// This covers both denied directories and directories skipped because
    /// the scan was cancelled; the session's inaccessible list tells them apart.
    #[inline]
    pub fn is_unscanned_dir(&self) -> bool {
        self.dir && self.children.is_none()
    }

    /// Direct children, or an empty slice for files and unscanned directories.
    pub fn children(&self) -> &[FsNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// Look up a direct child by name.
    pub fn child(&self, name: &str) -> Option<&FsNode> {
        self.children().iter().find(|c| c.name == name)
    }

    /// Follow a `/`-separated relative path of child names.
    pub fn descend(&self, relative: &str) -> Option<&FsNode> {
        relative
            .split('/')
            .filter(|s| !s.is_empty())
            .try_fold(self, |node, segment| node.child(segment))
    }

    /// Total number of descendant files (not directories).
    pub fn file_count(&self) -> u64 {
        self.children()
            .iter()
            .map(|c| if c.dir { c.file_count() } else { 1 })
            .sum()
    }

    /// Total number of descendant directories, scanned or not.
    pub fn dir_count(&self) -> u64 {
        self.children()
            .iter()
            .filter(|c| c.dir)
            .map(|c| 1 + c.dir_count())
            .sum()
    }

    /// Check the aggregation invariant for this node and every descendant:
    /// a listed node's size equals the sum of its children's sizes.
    pub fn sizes_are_consistent(&self) -> bool {
        match &self.children {
            None => true,
            Some(children) => {
                self.size == children.iter().map(|c| c.size).sum::<i64>()
                    && children.iter().all(FsNode::sizes_are_consistent)
            }
        }
    }
}

/// Convert a raw NT timestamp (100 ns ticks since 1601-01-01 UTC) into a
/// `DateTime<Utc>`. Out-of-range values clamp to the Unix epoch.
pub fn filetime_to_utc(raw: i64) -> DateTime<Utc> {
    let since_unix = raw.saturating_sub(NT_TO_UNIX_EPOCH_TICKS);
    let secs = since_unix.div_euclid(10_000_000);
    let nanos = (since_unix.rem_euclid(10_000_000) * 100) as u32;
    Utc.timestamp_opt(secs, nanos)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Inverse of [`filetime_to_utc`], used by listing sources that read
/// timestamps as `SystemTime`.
pub fn utc_to_filetime(time: DateTime<Utc>) -> i64 {
    let ticks = time
        .timestamp()
        .saturating_mul(10_000_000)
        .saturating_add(i64::from(time.timestamp_subsec_nanos() / 100));
    ticks.saturating_add(NT_TO_UNIX_EPOCH_TICKS)
}

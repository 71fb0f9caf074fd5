/// Scan progress reporting: lightweight messages sent from the scan
/// thread to an observer via a crossbeam channel.
///
/// The tree itself is only handed over when the scan returns; these messages
/// carry counters and paths. Observers that prefer polling read the
/// [`ScanSession`](super::session::ScanSession) instead.
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum ScanProgress {
    /// A scan of `target` has begun. `occupied` is 0 for directory scans.
    Started { target: String, occupied: i64 },
    /// A directory has been listed; sent once per visited directory.
    Directory { path: String, processed_bytes: i64 },
    /// A directory could not be opened, or its listing stopped early.
    AccessDenied { path: String, message: String },
    /// The walk finished.
    Complete {
        duration: Duration,
        processed_bytes: i64,
        inaccessible: usize,
    },
    /// The walk stopped at a directory boundary because cancellation was requested.
    Cancelled { processed_bytes: i64 },
}

/// Scanner module: builds size-aggregated trees from directory listings.
///
/// A scan runs depth-first on a single background thread. Each directory is
/// listed exactly once through a [`DirectoryEnumerator`] and its size is
/// the sum of its children, computed on the way back up.
///
/// Observers follow a running scan through the shared [`ScanSession`]
/// (polling) and, optionally, a bounded channel of [`ScanProgress`] events.
/// The finished tree is handed over only when the worker returns.
pub mod enumerator;
pub mod progress;
pub mod session;
pub mod tree;
pub mod volume;

pub use enumerator::{is_counted, DirectoryEnumerator, Listing};
pub use progress::ScanProgress;
pub use session::{CancelFlag, ScanSession, SessionSnapshot};
pub use tree::{root_display_name, ScanOutcome, TreeScanner};
pub use volume::{attach_buckets, VolumeScanner, FREE_SPACE_NODE, INACCESSIBLE_NODE};

use crate::error::ScanError;
use crate::model::{FsNode, SizeMode};
use crate::platform::SystemVolumes;
use crossbeam_channel::{Receiver, Sender};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tracing::info;

/// Maximum number of progress events that may queue up in the channel.
///
/// Events beyond this are dropped; the session counters stay exact.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 4_096;

/// Handle to a scan running on a background thread.
pub struct ScanHandle {
    /// Live counters and paths of the running scan.
    pub session: Arc<ScanSession>,
    cancel: CancelFlag,
    thread: thread::JoinHandle<Result<FsNode, ScanError>>,
}

impl ScanHandle {
    /// Request the scan to stop at the next directory boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether the worker has returned. `join` will not block once true.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the worker and take the finished (or partial) tree.
    pub fn join(self) -> Result<FsNode, ScanError> {
        self.thread.join().map_err(|_| ScanError::WorkerPanicked)?
    }
}

/// What a background scan should walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanTarget {
    /// A directory subtree, counted in the given size mode.
    Directory { path: PathBuf, mode: SizeMode },
    /// A whole volume by drive identifier (`"C:"`, `"/"`), always allocated.
    Volume { drive_id: String },
}

impl ScanTarget {
    fn describe(&self) -> String {
        match self {
            ScanTarget::Directory { path, .. } => path.display().to_string(),
            ScanTarget::Volume { drive_id } => drive_id.clone(),
        }
    }
}

/// Start a directory scan on a background thread.
pub fn start_directory_scan(
    path: impl Into<PathBuf>,
    mode: SizeMode,
) -> Result<ScanHandle, ScanError> {
    spawn_scan(
        ScanTarget::Directory {
            path: path.into(),
            mode,
        },
        Arc::new(ScanSession::new()),
    )
}

/// Start a whole-volume scan on a background thread.
pub fn start_volume_scan(drive_id: impl Into<String>) -> Result<ScanHandle, ScanError> {
    spawn_scan(
        ScanTarget::Volume {
            drive_id: drive_id.into(),
        },
        Arc::new(ScanSession::new()),
    )
}

/// Start a scan that also publishes [`ScanProgress`] events.
///
/// Returns the handle together with the receiving end of a bounded channel
/// of [`PROGRESS_CHANNEL_CAPACITY`] events.
pub fn start_scan_with_events(
    target: ScanTarget,
) -> Result<(ScanHandle, Receiver<ScanProgress>), ScanError> {
    let (progress_tx, progress_rx): (Sender<ScanProgress>, _) =
        crossbeam_channel::bounded(PROGRESS_CHANNEL_CAPACITY);
    let handle = spawn_scan(target, Arc::new(ScanSession::with_events(progress_tx)))?;
    Ok((handle, progress_rx))
}

fn spawn_scan(target: ScanTarget, session: Arc<ScanSession>) -> Result<ScanHandle, ScanError> {
    let cancel = CancelFlag::new();
    let cancel_clone = cancel.clone();
    let session_clone = Arc::clone(&session);

    let thread = thread::Builder::new()
        .name("dirtally-scanner".into())
        .spawn(move || {
            info!("Starting scan of {}", target.describe());
            match target {
                ScanTarget::Directory { path, mode } => {
                    let mut scanner = TreeScanner::new(mode).with_session(session_clone);
                    Ok(scanner.scan_directory(&path, &cancel_clone))
                }
                ScanTarget::Volume { drive_id } => {
                    let tree = TreeScanner::new(SizeMode::Allocated).with_session(session_clone);
                    let mut scanner = VolumeScanner::with_parts(tree, SystemVolumes);
                    scanner.scan_volume(&drive_id, &cancel_clone)
                }
            }
        })
        .map_err(ScanError::Spawn)?;

    Ok(ScanHandle {
        session,
        cancel,
        thread,
    })
}

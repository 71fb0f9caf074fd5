/// Live, cross-thread scan state.
///
/// The scanning thread is the only writer. Observers on other threads read
/// any field at any time:
///
/// - counters are atomics, so a 64-bit value is never seen half-written;
/// - strings and lists are swapped or appended under a `parking_lot` lock
///   held only for that pointer-sized operation, never across I/O.
///
/// Fields are independent. An observer may see a current path that is one
/// directory ahead of the byte counter; nothing relies on them agreeing.
use super::progress::ScanProgress;
use crate::model::{progress_percent, VolumeSpace};
use crossbeam_channel::Sender;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

/// Cooperative cancellation signal, shared between the caller and the walk.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the scan to stop at the next directory boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Everything an observer can read, captured in one call.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub target: String,
    pub current_path: Arc<str>,
    pub processed_bytes: i64,
    pub space: VolumeSpace,
    pub progress_percent: f32,
    pub inaccessible_paths: Vec<String>,
}

#[derive(Debug)]
pub struct ScanSession {
    processed: AtomicI64,
    total: AtomicI64,
    free: AtomicI64,
    current_path: RwLock<Arc<str>>,
    inaccessible: RwLock<Vec<String>>,
    target: RwLock<String>,
    events: Option<Sender<ScanProgress>>,
}

impl Default for ScanSession {
    fn default() -> Self {
        Self {
            processed: AtomicI64::new(0),
            total: AtomicI64::new(0),
            free: AtomicI64::new(0),
            current_path: RwLock::new(Arc::from("")),
            inaccessible: RwLock::new(Vec::new()),
            target: RwLock::new(String::new()),
            events: None,
        }
    }
}

impl ScanSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// A session that also publishes [`ScanProgress`] events.
    ///
    /// Events are sent with `try_send`: when a bounded channel is full the
    /// event is dropped rather than stalling the walk.
    pub fn with_events(events: Sender<ScanProgress>) -> Self {
        Self {
            events: Some(events),
            ..Self::default()
        }
    }

    // ── Observer side ────────────────────────────────────────────────────

    /// Bytes counted so far under the scan's size mode.
    pub fn processed_bytes(&self) -> i64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// `processed / occupied * 100`, or 0 without a volume baseline.
    pub fn progress_percent(&self) -> f32 {
        progress_percent(self.processed_bytes(), self.space().occupied())
    }

    /// Full path of the directory most recently entered.
    pub fn current_path(&self) -> Arc<str> {
        self.current_path.read().clone()
    }

    /// Directories that could not be listed (fully or partially), in visit order.
    pub fn inaccessible_paths(&self) -> Vec<String> {
        self.inaccessible.read().clone()
    }

    /// Drive identifier or directory path of the current / last scan.
    pub fn target(&self) -> String {
        self.target.read().clone()
    }

    /// Capacity and free space of the scanned volume; zero for directory scans.
    pub fn space(&self) -> VolumeSpace {
        VolumeSpace::new(
            self.total.load(Ordering::Relaxed),
            self.free.load(Ordering::Relaxed),
        )
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let processed_bytes = self.processed_bytes();
        let space = self.space();
        SessionSnapshot {
            target: self.target(),
            current_path: self.current_path(),
            processed_bytes,
            space,
            progress_percent: progress_percent(processed_bytes, space.occupied()),
            inaccessible_paths: self.inaccessible_paths(),
        }
    }

    // ── Scanner side ─────────────────────────────────────────────────────

    /// Clear all state for a new scan of `target`.
    pub(crate) fn reset(&self, target: &str, space: VolumeSpace) {
        self.processed.store(0, Ordering::Relaxed);
        self.total.store(space.total, Ordering::Relaxed);
        self.free.store(space.free, Ordering::Relaxed);
        *self.current_path.write() = Arc::from("");
        self.inaccessible.write().clear();
        *self.target.write() = target.to_string();
        self.emit(ScanProgress::Started {
            target: target.to_string(),
            occupied: space.occupied(),
        });
    }

    pub(crate) fn enter_directory(&self, path: &str) {
        *self.current_path.write() = Arc::from(path);
    }

    /// Publish the bytes one directory visit contributed.
    pub(crate) fn add_processed(&self, bytes: i64) {
        let processed = self.processed.fetch_add(bytes, Ordering::Relaxed) + bytes;
        if self.events.is_some() {
            self.emit(ScanProgress::Directory {
                path: self.current_path().to_string(),
                processed_bytes: processed,
            });
        }
    }

    pub(crate) fn record_inaccessible(&self, path: String, message: String) {
        self.inaccessible.write().push(path.clone());
        self.emit(ScanProgress::AccessDenied { path, message });
    }

    pub(crate) fn emit(&self, event: ScanProgress) {
        if let Some(tx) = &self.events {
            let _ = tx.try_send(event);
        }
    }
}

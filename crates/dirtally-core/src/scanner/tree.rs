/// Recursive tree builder with bottom-up size aggregation.
///
/// The walk is depth-first on the calling thread. Each directory visit:
///
/// 1. stops immediately if cancellation was requested;
/// 2. publishes its path as the session's current path;
/// 3. lists the directory once through the [`DirectoryEnumerator`];
/// 4. recurses into child directories in listing order;
/// 5. sets its size to the sum of its children.
///
/// Every visit returns the number of bytes it processed and the caller adds
/// it to its own count, so the only shared state touched deep in recursion
/// is the published session counter.
use super::enumerator::DirectoryEnumerator;
use super::progress::ScanProgress;
use super::session::{CancelFlag, ScanSession};
use crate::model::{filetime_to_utc, FsNode, SizeMode, VolumeSpace};
use crate::platform::{ListingSource, PlatformListing};
use chrono::Utc;
use compact_str::CompactString;
use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Result of walking one scan root.
#[derive(Debug)]
pub struct ScanOutcome {
    pub root: FsNode,
    /// Bytes attributed to files under the scan's size mode.
    pub processed: i64,
    pub cancelled: bool,
}

pub struct TreeScanner<S = PlatformListing> {
    enumerator: DirectoryEnumerator<S>,
    session: Arc<ScanSession>,
    mode: SizeMode,
}

impl TreeScanner<PlatformListing> {
    pub fn new(mode: SizeMode) -> Self {
        Self::with_source(PlatformListing::default(), mode)
    }
}

impl<S: ListingSource> TreeScanner<S> {
    pub fn with_source(source: S, mode: SizeMode) -> Self {
        Self {
            enumerator: DirectoryEnumerator::with_source(source),
            session: Arc::new(ScanSession::new()),
            mode,
        }
    }

    /// Replace the session, e.g. with one created by
    /// [`ScanSession::with_events`].
    pub fn with_session(mut self, session: Arc<ScanSession>) -> Self {
        self.session = session;
        self
    }

    /// Shared handle observers use to read live progress.
    pub fn session(&self) -> Arc<ScanSession> {
        Arc::clone(&self.session)
    }

    pub fn mode(&self) -> SizeMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: SizeMode) {
        self.mode = mode;
    }

    /// Scan a directory subtree.
    ///
    /// Always returns a root. If the root itself cannot be listed it has
    /// `children = None` and its path is in the session's inaccessible list.
    pub fn scan_directory(&mut self, path: impl AsRef<Path>, cancel: &CancelFlag) -> FsNode {
        let path = path.as_ref();
        let target = path.to_string_lossy();
        self.session.reset(&target, VolumeSpace::default());
        self.scan_unit(path, root_display_name(path), cancel).root
    }

    /// Walk `path` into a root named `root_name` without resetting the
    /// session. Callers reset it with their own target and baseline first.
    pub(crate) fn scan_unit(
        &mut self,
        path: &Path,
        root_name: impl Into<CompactString>,
        cancel: &CancelFlag,
    ) -> ScanOutcome {
        let start = Instant::now();
        info!("Starting {:?} scan of {}", self.mode, path.display());

        let mut root = FsNode::new_dir(root_name, Utc::now());
        let processed = self.visit(path, &mut root, cancel);
        let cancelled = cancel.is_cancelled();

        let duration = start.elapsed();
        if cancelled {
            info!("Scan of {} cancelled after {duration:?}", path.display());
            self.session.emit(ScanProgress::Cancelled {
                processed_bytes: processed,
            });
        } else {
            let inaccessible = self.session.inaccessible_paths().len();
            info!(
                "Scan of {} complete: {} bytes, {} inaccessible in {duration:?}",
                path.display(),
                processed,
                inaccessible
            );
            self.session.emit(ScanProgress::Complete {
                duration,
                processed_bytes: processed,
                inaccessible,
            });
        }

        ScanOutcome {
            root,
            processed,
            cancelled,
        }
    }

    /// List `dir` into `node` and recurse. Returns the bytes processed in
    /// this subtree; `node.size` ends up equal to it.
    fn visit(&mut self, dir: &Path, node: &mut FsNode, cancel: &CancelFlag) -> i64 {
        if cancel.is_cancelled() {
            return 0;
        }

        let dir_display = dir.to_string_lossy();
        self.session.enter_directory(&dir_display);

        let listing = match self.enumerator.list(dir) {
            Ok(listing) => listing,
            Err(err) => {
                debug!("{err}");
                self.session
                    .record_inaccessible(dir_display.into_owned(), error_message(&err));
                return 0;
            }
        };

        if let Some(err) = &listing.interrupted {
            debug!("Listing of {dir_display} stopped early: {err}");
            self.session
                .record_inaccessible(dir_display.to_string(), error_message(err));
        }

        let mode = self.mode;
        let mut file_bytes: i64 = 0;
        let mut subdirs: Vec<(usize, OsString)> = Vec::new();
        let mut children: Vec<FsNode> = Vec::with_capacity(listing.entries.len());
        for entry in listing.entries {
            let modified = filetime_to_utc(entry.last_modified_raw);
            if entry.is_directory {
                subdirs.push((children.len(), entry.os_name));
                children.push(FsNode::new_dir(entry.name, modified));
            } else {
                let size = mode.pick(entry.logical_size, entry.allocated_size);
                file_bytes += size;
                children.push(FsNode::new_file(entry.name, size, modified));
            }
        }
        self.session.add_processed(file_bytes);

        // Display names may be lossy; recurse through the platform's own names.
        let mut processed = file_bytes;
        for (index, os_name) in subdirs {
            let child_path = dir.join(os_name);
            processed += self.visit(&child_path, &mut children[index], cancel);
        }

        node.size = children.iter().map(|c| c.size).sum();
        node.children = Some(children);
        processed
    }
}

fn error_message(err: &crate::error::ScanError) -> String {
    match std::error::Error::source(err) {
        Some(source) => source.to_string(),
        None => err.to_string(),
    }
}

/// Derive a display name for the scan root.
///
/// For drive roots like `C:\` this is `C:`; for folders, the last segment.
pub fn root_display_name(path: &Path) -> String {
    if let Some(name) = path.file_name() {
        name.to_string_lossy().to_string()
    } else {
        let s = path.to_string_lossy();
        let trimmed = s.trim_end_matches('\\');
        if trimmed.is_empty() {
            s.to_string()
        } else {
            trimmed.to_string()
        }
    }
}

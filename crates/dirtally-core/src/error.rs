/// Error types for the scanning engine.
///
/// Only [`ScanError::VolumeInfo`], [`ScanError::Spawn`] and
/// [`ScanError::WorkerPanicked`] ever reach a caller. `AccessDenied` is
/// produced by the enumerator and always absorbed by the tree scanner.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    /// A directory could not be opened, or listing it stopped early.
    #[error("access denied: {}", path.display())]
    AccessDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Capacity / free space of a volume could not be read.
    #[error("cannot read space information for volume {volume}")]
    VolumeInfo {
        volume: String,
        #[source]
        source: io::Error,
    },

    /// The background worker thread could not be started.
    #[error("failed to spawn scanner thread")]
    Spawn(#[source] io::Error),

    /// The background worker thread panicked before returning a tree.
    #[error("scanner thread panicked")]
    WorkerPanicked,
}

impl ScanError {
    pub(crate) fn access_denied(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::AccessDenied {
            path: path.into(),
            source,
        }
    }
}

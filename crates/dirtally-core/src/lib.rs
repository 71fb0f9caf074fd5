/// DirTally Core: directory enumeration, size aggregation and volume accounting.
///
/// This crate contains all scanning logic with zero UI dependencies. The
/// console binary is one front end; anything that can poll a
/// [`scanner::ScanSession`] can be another.
///
/// # Modules
///
/// - [`model`]: the owned size tree and size/space helpers.
/// - [`platform`]: batched directory listing and volume space queries.
/// - [`scanner`]: enumeration, recursive aggregation, volume buckets and the
///   background scan handle.
/// - [`error`]: the [`ScanError`] type.
pub mod error;
pub mod model;
pub mod platform;
pub mod scanner;

pub use error::ScanError;
pub use model::{FsNode, SizeMode, VolumeSpace};
pub use scanner::{start_directory_scan, start_volume_scan, CancelFlag, ScanHandle, ScanSession};

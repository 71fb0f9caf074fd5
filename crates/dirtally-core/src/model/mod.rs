/// Data model for the DirTally size tree.
///
/// Re-exports the owned tree node and the size/space helpers.
pub mod fs_node;
pub mod size;

pub use fs_node::{filetime_to_utc, utc_to_filetime, FsNode};
pub use size::{display_threshold, progress_percent, SizeMode, VolumeSpace};

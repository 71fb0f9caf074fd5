/// Platform-specific functionality: batched directory listing and
/// volume space queries.
pub mod listing;
#[cfg(windows)]
pub mod nt_listing;
pub mod nt_records;
pub mod std_listing;
pub mod volumes;

pub use listing::{DirEntry, ListingSource, RawRecord, LISTING_BUFFER_SIZE};
pub use std_listing::StdListing;
pub use volumes::{volume_label, volume_root, SystemVolumes, VolumeInfo};

#[cfg(windows)]
pub use nt_listing::NtListing;

/// The listing source used when none is supplied explicitly.
#[cfg(windows)]
pub type PlatformListing = NtListing;

/// The listing source used when none is supplied explicitly.
#[cfg(not(windows))]
pub type PlatformListing = StdListing;

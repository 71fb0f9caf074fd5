/// Size semantics and volume-space arithmetic.
///
/// All sizes are `i64` bytes, matching what the platform reports.
/// Floating point only appears in percentages and the display threshold.
use serde::Serialize;

/// Which of an entry's two sizes a scan counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum SizeMode {
    /// End-of-file length.
    #[default]
    Logical,
    /// Bytes reserved on the media (cluster-rounded, after compression or
    /// sparseness). Whole-volume scans always use this mode.
    Allocated,
}

impl SizeMode {
    /// Select the size this mode counts.
    #[inline]
    pub fn pick(self, logical: i64, allocated: i64) -> i64 {
        match self {
            Self::Logical => logical,
            Self::Allocated => allocated,
        }
    }
}

/// Capacity and free space of one volume, captured once before a scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VolumeSpace {
    pub total: i64,
    pub free: i64,
}

impl VolumeSpace {
    pub fn new(total: i64, free: i64) -> Self {
        Self { total, free }
    }

    /// Used space: the 100 % baseline for volume-scan progress.
    #[inline]
    pub fn occupied(&self) -> i64 {
        self.total.saturating_sub(self.free)
    }
}

/// Convert a fraction into an absolute byte cutoff for bucketing small nodes.
///
/// The base is the whole volume when free space is shown alongside the
/// tree, otherwise only the occupied part. The result truncates toward zero.
pub fn display_threshold(fraction: f64, include_free_space: bool, space: VolumeSpace) -> i64 {
    let base = if include_free_space {
        space.total
    } else {
        space.occupied()
    };
    (fraction * base as f64) as i64
}

/// Percentage of `occupied` covered by `processed`; 0 when there is no baseline.
pub fn progress_percent(processed: i64, occupied: i64) -> f32 {
    if occupied == 0 {
        0.0
    } else {
        (processed as f64 * 100.0 / occupied as f64) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick() {
        assert_eq!(SizeMode::Logical.pick(10, 4096), 10);
        assert_eq!(SizeMode::Allocated.pick(10, 4096), 4096);
    }

    #[test]
    fn test_threshold_uses_occupied_by_default() {
        let space = VolumeSpace::new(1000, 200);
        assert_eq!(space.occupied(), 800);
        assert_eq!(display_threshold(0.01, false, space), 8);
        assert_eq!(display_threshold(0.01, true, space), 10);
    }

    #[test]
    fn test_threshold_zero_volume() {
        assert_eq!(display_threshold(0.5, false, VolumeSpace::default()), 0);
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(progress_percent(0, 0), 0.0);
        assert_eq!(progress_percent(400, 800), 50.0);
        assert_eq!(progress_percent(800, 800), 100.0);
    }
}

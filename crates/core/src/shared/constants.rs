/// Minimum overlap ratio for a detection to match a blob, and for two blobs
/// to count as duplicates.
pub const DEFAULT_OVERLAP_THRESHOLD: f64 = 0.6;

/// Run the detector every Nth frame; the frames in between are tracked.
pub const DEFAULT_DETECTION_INTERVAL: usize = 10;

/// Detection rounds a blob may go unmatched before it is evicted.
pub const DEFAULT_MAX_CONSECUTIVE_DETECTION_FAILURES: usize = 3;

/// Minimum class score for a detector candidate (strictly greater than).
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Frames between progress log lines.
pub const PROGRESS_THROTTLE_FRAMES: usize = 50;

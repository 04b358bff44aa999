use crate::shared::frame::Frame;

use super::blob::Blob;

/// Advances `blob` to `frame` through its own tracker handle.
///
/// Returns `true` when the tracker located the object. On failure, or when
/// the blob has no tracker, the tracking failure counter grows and the
/// geometry is left as it was.
pub fn advance(blob: &mut Blob, frame: &Frame) -> bool {
    let located = blob.tracker_mut().and_then(|tracker| tracker.update(frame));

    match located {
        Some(bbox) => {
            blob.consecutive_tracking_failures = 0;
            blob.update(bbox, None, None, None);
            log::debug!(
                "Tracker updated: id={} bbox={:?}",
                blob.id().short(),
                bbox
            );
            true
        }
        None => {
            blob.consecutive_tracking_failures += 1;
            log::debug!(
                "Tracker lost: id={} frame={} failures={}",
                blob.id().short(),
                frame.index(),
                blob.consecutive_tracking_failures
            );
            false
        }
    }
}

use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Source of decoded frames for the tracking loop.
///
/// Frames are yielded in decode order with consecutive indices starting at
/// 0. A yielded `Err` means the stream broke mid-way; callers stop reading
/// at that point.
pub trait VideoReader: Send {
    /// Opens a video file and returns its metadata.
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>>;

    /// Returns an iterator over frames in decode order.
    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;

    /// Releases any resources held by the reader. Safe to call twice.
    fn close(&mut self);
}

use std::path::PathBuf;

/// Stream properties reported by a [`VideoReader`](crate::video::domain::video_reader::VideoReader)
/// when a source is opened.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Frame count advertised by the container; 0 when unknown.
    pub total_frames: usize,
    pub source_path: Option<PathBuf>,
}

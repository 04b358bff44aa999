use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// One object found by a detector.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub label: String,
    /// Class score in `[0, 1]`.
    pub confidence: f64,
}

impl Detection {
    pub fn new(bbox: BoundingBox, label: impl Into<String>, confidence: f64) -> Self {
        Self {
            bbox,
            label: label.into(),
            confidence,
        }
    }
}

/// Domain interface for object detection.
///
/// Returned order carries no meaning to the caller; the association rules
/// consume detections exactly in the order given. Implementations filter
/// classes of interest themselves.
pub trait ObjectDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>>;
}

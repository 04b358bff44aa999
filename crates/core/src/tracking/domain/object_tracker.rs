use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// A single-object visual tracker seeded at one box.
///
/// Each blob owns exactly one handle; it is only ever advanced through
/// [`advance`](super::tracker_adapter::advance).
pub trait ObjectTracker: Send {
    /// Locates the object in `frame`. `None` means the object was lost on
    /// this frame; the tracker stays usable for later frames.
    fn update(&mut self, frame: &Frame) -> Option<BoundingBox>;
}

/// Creates tracker handles seeded at a detection box.
pub trait TrackerFactory: Send {
    fn create(&self, bbox: BoundingBox, frame: &Frame) -> Box<dyn ObjectTracker>;
}

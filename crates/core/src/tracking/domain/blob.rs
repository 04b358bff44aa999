use std::fmt;

use uuid::Uuid;

use crate::shared::bounding_box::{BoundingBox, Point};

use super::object_tracker::ObjectTracker;

/// Opaque blob identity. Never reused, even after the blob is evicted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlobId(Uuid);

impl BlobId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// A tracked object as it moves through a video.
///
/// `centroid` and `area` are derived from `bounding_box` and only change
/// together with it, through [`Blob::new`] and [`Blob::update`].
pub struct Blob {
    id: BlobId,
    bounding_box: BoundingBox,
    label: Option<String>,
    confidence: Option<f64>,
    centroid: Point,
    area: i64,
    position_first_detected: Point,
    pub(crate) consecutive_detection_failures: usize,
    pub(crate) consecutive_tracking_failures: usize,
    tracker: Option<Box<dyn ObjectTracker>>,
}

impl Blob {
    pub fn new(
        bounding_box: BoundingBox,
        label: Option<String>,
        confidence: Option<f64>,
        tracker: Option<Box<dyn ObjectTracker>>,
    ) -> Self {
        let centroid = bounding_box.centroid();
        Self {
            id: BlobId::generate(),
            bounding_box,
            label,
            confidence,
            centroid,
            area: bounding_box.area(),
            position_first_detected: centroid,
            consecutive_detection_failures: 0,
            consecutive_tracking_failures: 0,
            tracker,
        }
    }

    /// Moves the blob to `bounding_box`. Optional fields are only
    /// overwritten when a value is supplied.
    pub fn update(
        &mut self,
        bounding_box: BoundingBox,
        label: Option<String>,
        confidence: Option<f64>,
        tracker: Option<Box<dyn ObjectTracker>>,
    ) {
        self.bounding_box = bounding_box;
        if let Some(label) = label {
            self.label = Some(label);
        }
        if let Some(confidence) = confidence {
            self.confidence = Some(confidence);
        }
        if let Some(tracker) = tracker {
            self.tracker = Some(tracker);
        }
        self.centroid = bounding_box.centroid();
        self.area = bounding_box.area();
    }

    /// Overlap ratio of this blob's box against `other`; see
    /// [`BoundingBox::overlap`].
    pub fn overlap(&self, other: &BoundingBox) -> f64 {
        self.bounding_box.overlap(other)
    }

    pub fn contains_point(&self, point: Point) -> bool {
        self.bounding_box.contains_point(point)
    }

    pub fn id(&self) -> BlobId {
        self.id
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn confidence(&self) -> Option<f64> {
        self.confidence
    }

    pub fn centroid(&self) -> Point {
        self.centroid
    }

    pub fn area(&self) -> i64 {
        self.area
    }

    pub fn position_first_detected(&self) -> Point {
        self.position_first_detected
    }

    pub fn consecutive_detection_failures(&self) -> usize {
        self.consecutive_detection_failures
    }

    pub fn consecutive_tracking_failures(&self) -> usize {
        self.consecutive_tracking_failures
    }

    pub fn has_tracker(&self) -> bool {
        self.tracker.is_some()
    }

    pub(crate) fn tracker_mut(&mut self) -> Option<&mut (dyn ObjectTracker + 'static)> {
        self.tracker.as_deref_mut()
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("id", &self.id)
            .field("bounding_box", &self.bounding_box)
            .field("label", &self.label)
            .field("confidence", &self.confidence)
            .field("centroid", &self.centroid)
            .field("area", &self.area)
            .field("position_first_detected", &self.position_first_detected)
            .field(
                "consecutive_detection_failures",
                &self.consecutive_detection_failures,
            )
            .field(
                "consecutive_tracking_failures",
                &self.consecutive_tracking_failures,
            )
            .field("has_tracker", &self.tracker.is_some())
            .finish()
    }
}

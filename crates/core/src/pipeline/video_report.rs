use serde::{Deserialize, Serialize};

use crate::tracking::domain::blob::Blob;
use crate::tracking::domain::spatial_aggregator::{
    aggregate_counts, export_trajectories, QuadrantCounts, ReferencePoint,
};

/// Per-video artifact: one trajectory line per surviving blob and the
/// quadrant counts over the same blobs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoReport {
    pub vectors: Vec<String>,
    pub counts: QuadrantCounts,
}

impl VideoReport {
    pub fn from_blobs(
        blobs: &[Blob],
        frame_width: u32,
        frame_height: u32,
        reference: ReferencePoint,
    ) -> Self {
        Self {
            vectors: export_trajectories(blobs)
                .iter()
                .map(ToString::to_string)
                .collect(),
            counts: aggregate_counts(blobs, frame_width, frame_height, reference),
        }
    }
}

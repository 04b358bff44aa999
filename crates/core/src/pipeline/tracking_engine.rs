use std::time::Instant;

use crate::detection::domain::object_detector::ObjectDetector;
use crate::shared::config::TrackingConfig;
use crate::shared::frame::Frame;
use crate::tracking::domain::association_engine::{AssociationEngine, RoundSummary};
use crate::tracking::domain::blob::Blob;
use crate::tracking::domain::duplicate_resolver::DuplicateResolver;
use crate::tracking::domain::object_tracker::TrackerFactory;
use crate::tracking::domain::tracker_adapter;

use super::pipeline_logger::PipelineLogger;

/// What happened to the blob set on one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameRound {
    Detection {
        detections: usize,
        summary: RoundSummary,
        duplicates_removed: usize,
    },
    Tracking {
        located: usize,
        lost: usize,
    },
}

/// Owns the detector, the tracker factory and the association rules.
///
/// Built once and reused for every video of a batch; per-video state lives
/// in the blob collection the caller passes in.
pub struct TrackingEngine {
    detector: Box<dyn ObjectDetector>,
    tracker_factory: Box<dyn TrackerFactory>,
    association: AssociationEngine,
    duplicates: Option<DuplicateResolver>,
    detection_interval: usize,
}

impl TrackingEngine {
    pub fn new(
        detector: Box<dyn ObjectDetector>,
        tracker_factory: Box<dyn TrackerFactory>,
        config: &TrackingConfig,
    ) -> Self {
        Self {
            detector,
            tracker_factory,
            association: AssociationEngine::new(
                config.overlap_threshold,
                config.max_consecutive_detection_failures,
            ),
            duplicates: config
                .remove_duplicates
                .then(|| DuplicateResolver::new(config.overlap_threshold)),
            detection_interval: config.detection_interval.max(1),
        }
    }

    pub fn is_detection_round(&self, frame_index: usize) -> bool {
        frame_index % self.detection_interval == 0
    }

    /// Runs detection + association (+ de-duplication) on detection rounds
    /// and advances every blob's tracker otherwise.
    ///
    /// A detector error leaves `blobs` untouched and is returned as is.
    pub fn process_frame(
        &mut self,
        frame: &Frame,
        blobs: &mut Vec<Blob>,
        logger: &mut dyn PipelineLogger,
    ) -> Result<FrameRound, Box<dyn std::error::Error>> {
        if !self.is_detection_round(frame.index()) {
            let t0 = Instant::now();
            let mut located = 0;
            for blob in blobs.iter_mut() {
                if tracker_adapter::advance(blob, frame) {
                    located += 1;
                }
            }
            logger.timing("track", t0.elapsed().as_secs_f64() * 1000.0);
            return Ok(FrameRound::Tracking {
                located,
                lost: blobs.len() - located,
            });
        }

        let t0 = Instant::now();
        let detections = self.detector.detect(frame)?;
        logger.timing("detect", t0.elapsed().as_secs_f64() * 1000.0);

        let t0 = Instant::now();
        let summary = self.association.reconcile(
            &detections,
            blobs,
            frame,
            self.tracker_factory.as_ref(),
        );
        let duplicates_removed = self
            .duplicates
            .as_ref()
            .map_or(0, |resolver| resolver.remove_duplicates(blobs));
        logger.timing("associate", t0.elapsed().as_secs_f64() * 1000.0);

        log::debug!(
            "Frame {}: {} detections, {} matched, {} created, {} evicted, {} duplicates",
            frame.index(),
            detections.len(),
            summary.matched,
            summary.created,
            summary.evicted,
            duplicates_removed
        );

        Ok(FrameRound::Detection {
            detections: detections.len(),
            summary,
            duplicates_removed,
        })
    }
}

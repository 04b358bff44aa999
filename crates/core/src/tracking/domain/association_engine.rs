use std::collections::HashSet;

use crate::detection::domain::object_detector::Detection;
use crate::shared::constants::{
    DEFAULT_MAX_CONSECUTIVE_DETECTION_FAILURES, DEFAULT_OVERLAP_THRESHOLD,
};
use crate::shared::frame::Frame;

use super::blob::{Blob, BlobId};
use super::object_tracker::TrackerFactory;

/// Outcome counts of one detection round.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RoundSummary {
    pub matched: usize,
    pub created: usize,
    pub evicted: usize,
}

/// Reconciles a detection round into the blob collection.
///
/// Matching is first-match-wins in collection order, not best-match: the
/// first blob whose overlap with a detection reaches the threshold takes it.
pub struct AssociationEngine {
    overlap_threshold: f64,
    max_consecutive_detection_failures: usize,
}

impl AssociationEngine {
    pub fn new(overlap_threshold: f64, max_consecutive_detection_failures: usize) -> Self {
        Self {
            overlap_threshold,
            max_consecutive_detection_failures,
        }
    }

    pub fn reconcile(
        &self,
        detections: &[Detection],
        blobs: &mut Vec<Blob>,
        frame: &Frame,
        tracker_factory: &dyn TrackerFactory,
    ) -> RoundSummary {
        let mut matched_ids: HashSet<BlobId> = HashSet::new();
        let mut summary = RoundSummary::default();

        for detection in detections {
            let tracker = tracker_factory.create(detection.bbox, frame);

            let matched = blobs
                .iter_mut()
                .find(|blob| blob.overlap(&detection.bbox) >= self.overlap_threshold);

            match matched {
                Some(blob) => {
                    if matched_ids.insert(blob.id()) {
                        blob.consecutive_detection_failures = 0;
                        summary.matched += 1;
                    }
                    blob.update(
                        detection.bbox,
                        Some(detection.label.clone()),
                        Some(detection.confidence),
                        Some(tracker),
                    );
                    log::debug!(
                        "Blob updated: id={} bbox={:?} type={} confidence={:.2}",
                        blob.id().short(),
                        blob.bounding_box(),
                        detection.label,
                        detection.confidence
                    );
                }
                None => {
                    let blob = Blob::new(
                        detection.bbox,
                        Some(detection.label.clone()),
                        Some(detection.confidence),
                        Some(tracker),
                    );
                    log::debug!(
                        "Blob created: id={} bbox={:?} type={} confidence={:.2}",
                        blob.id().short(),
                        blob.bounding_box(),
                        detection.label,
                        detection.confidence
                    );
                    blobs.push(blob);
                    summary.created += 1;
                }
            }
        }

        summary.evicted = self.remove_stray_blobs(blobs, &matched_ids);
        summary
    }

    /// Ages every blob not matched this round (blobs created this round
    /// included) and evicts those past the failure limit.
    fn remove_stray_blobs(&self, blobs: &mut Vec<Blob>, matched_ids: &HashSet<BlobId>) -> usize {
        for blob in blobs.iter_mut() {
            if !matched_ids.contains(&blob.id()) {
                blob.consecutive_detection_failures += 1;
            }
        }

        let before = blobs.len();
        let limit = self.max_consecutive_detection_failures;
        blobs.retain(|blob| {
            let keep = blob.consecutive_detection_failures <= limit;
            if !keep {
                log::debug!(
                    "Blob evicted: id={} after {} unmatched detection rounds",
                    blob.id().short(),
                    blob.consecutive_detection_failures
                );
            }
            keep
        });
        before - blobs.len()
    }
}

impl Default for AssociationEngine {
    fn default() -> Self {
        Self::new(
            DEFAULT_OVERLAP_THRESHOLD,
            DEFAULT_MAX_CONSECUTIVE_DETECTION_FAILURES,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::bounding_box::{BoundingBox, Point};
    use crate::tracking::domain::object_tracker::ObjectTracker;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StaticTracker(BoundingBox);

    impl ObjectTracker for StaticTracker {
        fn update(&mut self, _frame: &Frame) -> Option<BoundingBox> {
            Some(self.0)
        }
    }

    struct CountingFactory {
        created: Arc<AtomicUsize>,
    }

    impl CountingFactory {
        fn new() -> Self {
            Self {
                created: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl TrackerFactory for CountingFactory {
        fn create(&self, bbox: BoundingBox, _frame: &Frame) -> Box<dyn ObjectTracker> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Box::new(StaticTracker(bbox))
        }
    }

    fn frame() -> Frame {
        Frame::filled(200, 200, [0, 0, 0], 0)
    }

    fn det(x: i32, y: i32, w: i32, h: i32) -> Detection {
        Detection::new(BoundingBox::new(x, y, w, h), "car", 0.9)
    }

    fn blob(x: i32, y: i32, w: i32, h: i32) -> Blob {
        Blob::new(BoundingBox::new(x, y, w, h), None, None, None)
    }

    #[test]
    fn test_unmatched_detection_creates_blob() {
        let engine = AssociationEngine::new(0.6, 3);
        let factory = CountingFactory::new();
        let mut blobs = Vec::new();

        let summary = engine.reconcile(&[det(10, 10, 20, 20)], &mut blobs, &frame(), &factory);

        assert_eq!(blobs.len(), 1);
        assert_eq!(summary.created, 1);
        assert_eq!(blobs[0].label(), Some("car"));
        assert_eq!(blobs[0].confidence(), Some(0.9));
        assert!(blobs[0].has_tracker());
    }

    #[test]
    fn test_new_blob_counts_as_unmatched_in_its_creation_round() {
        let engine = AssociationEngine::new(0.6, 3);
        let mut blobs = Vec::new();

        engine.reconcile(&[det(10, 10, 20, 20)], &mut blobs, &frame(), &CountingFactory::new());

        assert_eq!(blobs[0].consecutive_detection_failures(), 1);
    }

    #[test]
    fn test_every_detection_gets_a_fresh_tracker() {
        let engine = AssociationEngine::new(0.6, 3);
        let factory = CountingFactory::new();
        let created = factory.created.clone();
        let mut blobs = vec![blob(10, 10, 20, 20)];

        engine.reconcile(
            &[det(10, 10, 20, 20), det(100, 100, 20, 20)],
            &mut blobs,
            &frame(),
            &factory,
        );

        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert!(blobs[0].has_tracker());
    }

    #[test]
    fn test_matching_detection_updates_existing_blob() {
        let engine = AssociationEngine::new(0.6, 3);
        let mut blobs = vec![blob(10, 10, 20, 20)];
        let id = blobs[0].id();
        blobs[0].consecutive_detection_failures = 2;

        let factory = CountingFactory::new();
        let summary = engine.reconcile(&[det(12, 10, 20, 20)], &mut blobs, &frame(), &factory);

        assert_eq!(blobs.len(), 1);
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.created, 0);
        assert_eq!(blobs[0].id(), id);
        assert_eq!(blobs[0].bounding_box(), BoundingBox::new(12, 10, 20, 20));
        assert_eq!(blobs[0].consecutive_detection_failures(), 0);
        assert_eq!(blobs[0].position_first_detected(), Point::new(20, 20));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let existing = BoundingBox::new(0, 0, 10, 10);
        let incoming = BoundingBox::new(4, 0, 10, 10);
        let exact = existing.overlap(&incoming);

        let engine = AssociationEngine::new(exact, 3);
        let mut blobs = vec![Blob::new(existing, None, None, None)];
        let summary = engine.reconcile(
            &[Detection::new(incoming, "car", 0.9)],
            &mut blobs,
            &frame(),
            &CountingFactory::new(),
        );

        assert_eq!(summary.matched, 1);
        assert_eq!(blobs.len(), 1);
    }

    #[test]
    fn test_just_below_threshold_does_not_match() {
        let existing = BoundingBox::new(0, 0, 10, 10);
        let incoming = BoundingBox::new(4, 0, 10, 10);
        let exact = existing.overlap(&incoming);

        let engine = AssociationEngine::new(exact + 1e-9, 3);
        let mut blobs = vec![Blob::new(existing, None, None, None)];
        let summary = engine.reconcile(
            &[Detection::new(incoming, "car", 0.9)],
            &mut blobs,
            &frame(),
            &CountingFactory::new(),
        );

        assert_eq!(summary.matched, 0);
        assert_eq!(summary.created, 1);
        assert_eq!(blobs.len(), 2);
    }

    #[test]
    fn test_default_threshold_rejects_sixty_percent_by_epsilon() {
        // 60/100 geometrically, but the epsilon in the denominator pulls it
        // just under 0.6.
        let engine = AssociationEngine::default();
        let mut blobs = vec![blob(0, 0, 10, 10)];
        engine.reconcile(&[det(4, 0, 10, 10)], &mut blobs, &frame(), &CountingFactory::new());
        assert_eq!(blobs.len(), 2);
    }

    #[test]
    fn test_first_match_wins_not_best_match() {
        let engine = AssociationEngine::new(0.6, 3);
        // First blob overlaps the detection at ~0.8, second is identical.
        let mut blobs = vec![blob(2, 0, 10, 10), blob(0, 0, 10, 10)];
        let first = blobs[0].id();
        let second_box = blobs[1].bounding_box();

        engine.reconcile(&[det(0, 0, 10, 10)], &mut blobs, &frame(), &CountingFactory::new());

        assert_eq!(blobs[0].id(), first);
        assert_eq!(blobs[0].bounding_box(), BoundingBox::new(0, 0, 10, 10));
        assert_eq!(blobs[1].bounding_box(), second_box);
        assert_eq!(blobs[0].consecutive_detection_failures(), 0);
        assert_eq!(blobs[1].consecutive_detection_failures(), 1);
    }

    #[test]
    fn test_detection_order_is_preserved_for_creation() {
        let engine = AssociationEngine::new(0.6, 3);
        let mut blobs = Vec::new();

        engine.reconcile(
            &[det(100, 100, 10, 10), det(0, 0, 10, 10)],
            &mut blobs,
            &frame(),
            &CountingFactory::new(),
        );

        assert_eq!(blobs[0].bounding_box(), BoundingBox::new(100, 100, 10, 10));
        assert_eq!(blobs[1].bounding_box(), BoundingBox::new(0, 0, 10, 10));
    }

    #[test]
    fn test_later_detection_can_match_blob_created_this_round() {
        let engine = AssociationEngine::new(0.6, 3);
        let mut blobs = Vec::new();

        let summary = engine.reconcile(
            &[det(0, 0, 10, 10), det(1, 0, 10, 10)],
            &mut blobs,
            &frame(),
            &CountingFactory::new(),
        );

        assert_eq!(blobs.len(), 1);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.matched, 1);
        assert_eq!(blobs[0].bounding_box(), BoundingBox::new(1, 0, 10, 10));
        assert_eq!(blobs[0].consecutive_detection_failures(), 0);
    }

    #[test]
    fn test_blob_matched_twice_in_one_round_takes_last_detection() {
        let engine = AssociationEngine::new(0.6, 3);
        let mut blobs = vec![blob(0, 0, 10, 10)];

        let summary = engine.reconcile(
            &[det(1, 0, 10, 10), det(2, 0, 10, 10)],
            &mut blobs,
            &frame(),
            &CountingFactory::new(),
        );

        assert_eq!(summary.matched, 1);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].bounding_box(), BoundingBox::new(2, 0, 10, 10));
    }

    #[test]
    fn test_empty_round_ages_all_blobs() {
        let engine = AssociationEngine::new(0.6, 3);
        let mut blobs = vec![blob(0, 0, 10, 10), blob(50, 50, 10, 10)];

        let summary = engine.reconcile(&[], &mut blobs, &frame(), &CountingFactory::new());

        assert_eq!(summary, RoundSummary::default());
        assert!(blobs.iter().all(|b| b.consecutive_detection_failures() == 1));
    }

    #[test]
    fn test_eviction_is_strictly_greater_than_limit() {
        let max = 2;
        let engine = AssociationEngine::new(0.6, max);
        let mut blobs = vec![blob(0, 0, 10, 10)];

        for _ in 0..max {
            engine.reconcile(&[], &mut blobs, &frame(), &CountingFactory::new());
        }
        assert_eq!(blobs.len(), 1, "retained after exactly max unmatched rounds");
        assert_eq!(blobs[0].consecutive_detection_failures(), max);

        let summary = engine.reconcile(&[], &mut blobs, &frame(), &CountingFactory::new());
        assert!(blobs.is_empty(), "evicted after max + 1 unmatched rounds");
        assert_eq!(summary.evicted, 1);
    }

    #[test]
    fn test_zero_limit_evicts_unmatched_new_blob_immediately() {
        let engine = AssociationEngine::new(0.6, 0);
        let mut blobs = Vec::new();

        let factory = CountingFactory::new();
        let summary = engine.reconcile(&[det(0, 0, 10, 10)], &mut blobs, &frame(), &factory);

        assert_eq!(summary.created, 1);
        assert_eq!(summary.evicted, 1);
        assert!(blobs.is_empty());
    }

    #[test]
    fn test_evicted_blob_is_not_rematched() {
        let engine = AssociationEngine::new(0.6, 0);
        let mut blobs = vec![blob(0, 0, 10, 10)];
        let evicted = blobs[0].id();

        engine.reconcile(&[], &mut blobs, &frame(), &CountingFactory::new());
        assert!(blobs.is_empty());

        let engine = AssociationEngine::new(0.6, 3);
        engine.reconcile(&[det(0, 0, 10, 10)], &mut blobs, &frame(), &CountingFactory::new());
        assert_eq!(blobs.len(), 1);
        assert_ne!(blobs[0].id(), evicted);
    }

    #[test]
    fn test_eviction_preserves_order_of_survivors() {
        let engine = AssociationEngine::new(0.6, 1);
        let mut blobs = vec![blob(0, 0, 10, 10), blob(50, 0, 10, 10), blob(100, 0, 10, 10)];
        let ids: Vec<BlobId> = blobs.iter().map(Blob::id).collect();
        blobs[1].consecutive_detection_failures = 1;

        engine.reconcile(&[], &mut blobs, &frame(), &CountingFactory::new());

        let remaining: Vec<BlobId> = blobs.iter().map(Blob::id).collect();
        assert_eq!(remaining, vec![ids[0], ids[2]]);
    }
}

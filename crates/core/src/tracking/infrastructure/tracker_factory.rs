use crate::shared::config::TrackerKind;
use crate::tracking::domain::object_tracker::TrackerFactory;

use super::histogram_tracker::HistogramTrackerFactory;
use super::template_tracker::TemplateTrackerFactory;

/// Creates the tracker factory for `kind` with its default tuning.
pub fn create_tracker_factory(kind: TrackerKind) -> Box<dyn TrackerFactory> {
    log::info!("Using {kind} tracker");
    match kind {
        TrackerKind::Template => Box::new(TemplateTrackerFactory::default()),
        TrackerKind::Histogram => Box::new(HistogramTrackerFactory::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::bounding_box::BoundingBox;
    use crate::shared::frame::Frame;

    fn scene(x: i32) -> Frame {
        let mut frame = Frame::filled(80, 80, [10, 20, 180], 0);
        frame.fill_rect(&BoundingBox::new(x, 20, 12, 12), [230, 230, 40]);
        frame
    }

    #[test]
    fn test_every_kind_tracks_a_shift() {
        for kind in TrackerKind::ALL {
            let factory = create_tracker_factory(*kind);
            let mut tracker = factory.create(BoundingBox::new(20, 20, 12, 12), &scene(20));
            assert_eq!(
                tracker.update(&scene(24)),
                Some(BoundingBox::new(24, 20, 12, 12)),
                "{kind} tracker"
            );
        }
    }
}

/// Grayscale template-matching tracker.
///
/// Keeps the luma patch under the seed box and, on every frame, looks for
/// the placement with the lowest mean absolute difference inside a search
/// window around the last known box. The template is never refreshed, so
/// the tracker does not drift onto the background.
use ndarray::{s, Array2, ArrayView2, Zip};

use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;
use crate::tracking::domain::object_tracker::{ObjectTracker, TrackerFactory};

use super::window_search::{coarse_to_fine, search_radius};

/// Largest mean absolute luma difference (0..=255) still counted as a hit.
pub const DEFAULT_MAX_MEAN_DIFFERENCE: f64 = 30.0;

pub struct TemplateTracker {
    template: Option<Array2<f32>>,
    last: BoundingBox,
    max_mean_difference: f64,
}

impl TemplateTracker {
    /// Seeds from the visible part of `bbox`; a box entirely outside the
    /// frame yields a tracker that never reports a hit.
    pub fn new(bbox: BoundingBox, frame: &Frame, max_mean_difference: f64) -> Self {
        let seed = bbox.clamp_to(frame.width(), frame.height());
        let template = match seed {
            Some(seed) => Some(patch(frame.luma().view(), &seed).to_owned()),
            None => {
                log::debug!("Template seed {bbox:?} lies outside the frame");
                None
            }
        };
        Self {
            template,
            last: seed.unwrap_or(bbox),
            max_mean_difference,
        }
    }
}

impl ObjectTracker for TemplateTracker {
    fn update(&mut self, frame: &Frame) -> Option<BoundingBox> {
        let template = self.template.as_ref()?;
        let luma = frame.luma();
        let luma = luma.view();

        let (found, score) = coarse_to_fine(
            self.last,
            search_radius(&self.last),
            frame.width(),
            frame.height(),
            |candidate| mean_absolute_difference(patch(luma, candidate), template.view()),
        )?;

        if score > self.max_mean_difference {
            return None;
        }
        self.last = found;
        Some(found)
    }
}

pub struct TemplateTrackerFactory {
    max_mean_difference: f64,
}

impl TemplateTrackerFactory {
    pub fn new(max_mean_difference: f64) -> Self {
        Self {
            max_mean_difference,
        }
    }
}

impl Default for TemplateTrackerFactory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MEAN_DIFFERENCE)
    }
}

impl TrackerFactory for TemplateTrackerFactory {
    fn create(&self, bbox: BoundingBox, frame: &Frame) -> Box<dyn ObjectTracker> {
        Box::new(TemplateTracker::new(bbox, frame, self.max_mean_difference))
    }
}

fn patch<'a>(luma: ArrayView2<'a, f32>, bbox: &BoundingBox) -> ArrayView2<'a, f32> {
    let y = bbox.y as usize;
    let x = bbox.x as usize;
    luma.slice_move(s![
        y..y + bbox.height as usize,
        x..x + bbox.width as usize
    ])
}

fn mean_absolute_difference(a: ArrayView2<f32>, b: ArrayView2<f32>) -> f64 {
    let n = a.len();
    if n == 0 || a.dim() != b.dim() {
        return f64::INFINITY;
    }
    let total = Zip::from(&a)
        .and(&b)
        .fold(0.0f64, |acc, &pa, &pb| acc + f64::from((pa - pb).abs()));
    total / n as f64
}

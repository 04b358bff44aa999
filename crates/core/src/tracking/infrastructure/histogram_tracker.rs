/// HSV histogram tracker.
///
/// Describes the seed patch by its 2D Hue-Saturation histogram and, on each
/// frame, picks the nearby placement whose histogram correlates best with
/// it (Pearson). Tolerates deformation and lighting better than template
/// matching, at the cost of locking onto same-colored background.
use std::sync::{Arc, Mutex, PoisonError};

use ndarray::Array2;

use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;
use crate::tracking::domain::object_tracker::{ObjectTracker, TrackerFactory};

use super::window_search::{coarse_to_fine, search_radius};

pub const DEFAULT_MIN_CORRELATION: f64 = 0.5;

const HUE_BINS: usize = 32;
const SAT_BINS: usize = 32;

pub struct HistogramTracker {
    reference: Option<Vec<f64>>,
    last: BoundingBox,
    min_correlation: f64,
    bins: BinMapCache,
}

impl HistogramTracker {
    pub fn new(bbox: BoundingBox, frame: &Frame, min_correlation: f64) -> Self {
        Self::with_cache(bbox, frame, min_correlation, BinMapCache::default())
    }

    /// Seeds from the visible part of `bbox`; a box entirely outside the
    /// frame yields a tracker that never reports a hit.
    pub fn with_cache(
        bbox: BoundingBox,
        frame: &Frame,
        min_correlation: f64,
        bins: BinMapCache,
    ) -> Self {
        let seed = bbox.clamp_to(frame.width(), frame.height());
        let reference = match seed {
            Some(seed) => Some(histogram(&bins.get(frame), &seed)),
            None => {
                log::debug!("Histogram seed {bbox:?} lies outside the frame");
                None
            }
        };
        Self {
            reference,
            last: seed.unwrap_or(bbox),
            min_correlation,
            bins,
        }
    }
}

impl ObjectTracker for HistogramTracker {
    fn update(&mut self, frame: &Frame) -> Option<BoundingBox> {
        let reference = self.reference.as_ref()?;
        let bins = self.bins.get(frame);

        let (found, cost) = coarse_to_fine(
            self.last,
            search_radius(&self.last),
            frame.width(),
            frame.height(),
            |candidate| 1.0 - pearson_correlation(&histogram(&bins, candidate), reference),
        )?;

        if 1.0 - cost < self.min_correlation {
            return None;
        }
        self.last = found;
        Some(found)
    }
}

/// Bin map of the most recently seen frame.
///
/// Clones share one slot, so every tracker a factory hands out converts a
/// given frame to HSV only once.
#[derive(Clone, Default)]
pub struct BinMapCache {
    slot: Arc<Mutex<Option<(u64, Arc<Array2<u16>>)>>>,
}

impl BinMapCache {
    fn get(&self, frame: &Frame) -> Arc<Array2<u16>> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((revision, bins)) = slot.as_ref() {
            if *revision == frame.revision() {
                return Arc::clone(bins);
            }
        }
        let bins = Arc::new(bin_map(frame));
        *slot = Some((frame.revision(), Arc::clone(&bins)));
        bins
    }
}

pub struct HistogramTrackerFactory {
    min_correlation: f64,
    bins: BinMapCache,
}

impl HistogramTrackerFactory {
    pub fn new(min_correlation: f64) -> Self {
        Self {
            min_correlation,
            bins: BinMapCache::default(),
        }
    }
}

impl Default for HistogramTrackerFactory {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CORRELATION)
    }
}

impl TrackerFactory for HistogramTrackerFactory {
    fn create(&self, bbox: BoundingBox, frame: &Frame) -> Box<dyn ObjectTracker> {
        Box::new(HistogramTracker::with_cache(
            bbox,
            frame,
            self.min_correlation,
            self.bins.clone(),
        ))
    }
}

/// Histogram bin index of every pixel, computed once per frame.
fn bin_map(frame: &Frame) -> Array2<u16> {
    let rgb = frame.as_ndarray();
    Array2::from_shape_fn(
        (frame.height() as usize, frame.width() as usize),
        |(y, x)| {
            let r = rgb[[y, x, 0]] as f64 / 255.0;
            let g = rgb[[y, x, 1]] as f64 / 255.0;
            let b = rgb[[y, x, 2]] as f64 / 255.0;

            let (h, s, _v) = rgb_to_hsv(r, g, b);

            let h_bin = ((h / 360.0) * HUE_BINS as f64).min(HUE_BINS as f64 - 1.0) as usize;
            let s_bin = (s * SAT_BINS as f64).min(SAT_BINS as f64 - 1.0) as usize;
            (h_bin * SAT_BINS + s_bin) as u16
        },
    )
}

/// Normalized histogram of the pixels under `bbox`, which must fit the frame.
fn histogram(bins: &Array2<u16>, bbox: &BoundingBox) -> Vec<f64> {
    let mut hist = vec![0.0f64; HUE_BINS * SAT_BINS];
    let x0 = bbox.x as usize;
    let y0 = bbox.y as usize;
    let x1 = x0 + bbox.width as usize;
    let y1 = y0 + bbox.height as usize;

    for y in y0..y1 {
        for x in x0..x1 {
            hist[bins[[y, x]] as usize] += 1.0;
        }
    }

    let total = ((x1 - x0) * (y1 - y0)) as f64;
    if total > 0.0 {
        for v in &mut hist {
            *v /= total;
        }
    }
    hist
}

fn rgb_to_hsv(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let v = max;
    let s = if max > 0.0 { delta / max } else { 0.0 };

    let h = if delta == 0.0 {
        0.0
    } else if (max - r).abs() < f64::EPSILON {
        60.0 * (((g - b) / delta) % 6.0)
    } else if (max - g).abs() < f64::EPSILON {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    let h = if h < 0.0 { h + 360.0 } else { h };

    (h, s, v)
}

/// Pearson correlation coefficient.
///
/// Returns 1.0 when both inputs have zero variance and 0.0 when only one
/// does.
fn pearson_correlation(a: &[f64], b: &[f64]) -> f64 {
    let len = a.len().min(b.len());
    if len == 0 {
        return 0.0;
    }
    let n = len as f64;

    let mean_a = a[..len].iter().sum::<f64>() / n;
    let mean_b = b[..len].iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;

    for (x, y) in a[..len].iter().zip(&b[..len]) {
        let da = x - mean_a;
        let db = y - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    let denom = (var_a * var_b).sqrt();
    if denom < f64::EPSILON {
        return if var_a < f64::EPSILON && var_b < f64::EPSILON {
            1.0
        } else {
            0.0
        };
    }

    cov / denom
}

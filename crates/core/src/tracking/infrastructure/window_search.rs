use crate::shared::bounding_box::BoundingBox;

/// Smallest search radius in pixels, whatever the box size.
pub const MIN_SEARCH_RADIUS: i32 = 8;

/// Search radius for a box: one box size in every direction.
pub fn search_radius(bbox: &BoundingBox) -> i32 {
    bbox.width.max(bbox.height).max(MIN_SEARCH_RADIUS)
}

/// Coarse-to-fine search for the lowest-cost placement of `origin` within
/// `radius` pixels.
///
/// Starts on a grid of roughly a quarter radius, then halves the step
/// around the best candidate until it reaches single pixels. Candidates
/// that do not fit entirely inside the frame are skipped. Ties keep the
/// candidate evaluated first, so a stationary object stays put.
pub fn coarse_to_fine<F>(
    origin: BoundingBox,
    radius: i32,
    frame_width: u32,
    frame_height: u32,
    mut cost: F,
) -> Option<(BoundingBox, f64)>
where
    F: FnMut(&BoundingBox) -> f64,
{
    let mut best: Option<(i32, i32, f64)> = None;
    let mut evaluate = |dx: i32, dy: i32, best: &mut Option<(i32, i32, f64)>| {
        let candidate = origin.translated(dx, dy);
        if !fits_inside(&candidate, frame_width, frame_height) {
            return;
        }
        let c = cost(&candidate);
        if best.map_or(true, |(_, _, b)| c < b) {
            *best = Some((dx, dy, c));
        }
    };

    evaluate(0, 0, &mut best);

    let mut step = (radius / 4).max(1);
    let mut dy = -radius;
    while dy <= radius {
        let mut dx = -radius;
        while dx <= radius {
            evaluate(dx, dy, &mut best);
            dx += step;
        }
        dy += step;
    }

    while step > 1 {
        step /= 2;
        let (cx, cy, _) = best?;
        for oy in [-step, 0, step] {
            for ox in [-step, 0, step] {
                evaluate(cx + ox, cy + oy, &mut best);
            }
        }
    }

    best.map(|(dx, dy, c)| (origin.translated(dx, dy), c))
}

fn fits_inside(bbox: &BoundingBox, frame_width: u32, frame_height: u32) -> bool {
    bbox.width > 0
        && bbox.height > 0
        && bbox.x >= 0
        && bbox.y >= 0
        && bbox.right() <= frame_width as i32
        && bbox.bottom() <= frame_height as i32
}

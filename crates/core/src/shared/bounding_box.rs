use std::fmt;

use serde::{Deserialize, Serialize};

/// Guards the overlap ratio against division by zero for degenerate boxes.
pub const OVERLAP_EPSILON: f64 = 1e-5;

/// An integer pixel coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Axis-aligned box in pixel units, stored as top-left corner plus size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Center point, rounding exact halves to the nearest even integer.
    pub fn centroid(&self) -> Point {
        let cx = self.x as f64 + self.width as f64 / 2.0;
        let cy = self.y as f64 + self.height as f64 / 2.0;
        Point::new(cx.round_ties_even() as i32, cy.round_ties_even() as i32)
    }

    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    /// Intersection area over the *smaller* box's area (not IoU).
    ///
    /// A negative intersection extent on either axis short-circuits to
    /// exactly `0.0`.
    pub fn overlap(&self, other: &BoundingBox) -> f64 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = self.right().min(other.right());
        let iy2 = self.bottom().min(other.bottom());

        let iw = ix2 as i64 - ix1 as i64;
        let ih = iy2 as i64 - iy1 as i64;
        if iw < 0 || ih < 0 {
            return 0.0;
        }

        let smaller = self.area().min(other.area()) as f64;
        (iw * ih) as f64 / (smaller + OVERLAP_EPSILON)
    }

    /// Strict containment: points on the boundary are outside.
    pub fn contains_point(&self, point: Point) -> bool {
        self.x < point.x && point.x < self.right() && self.y < point.y && point.y < self.bottom()
    }

    /// Clips the box to a `frame_w` × `frame_h` frame. Returns `None` when
    /// nothing of the box remains visible.
    pub fn clamp_to(&self, frame_w: u32, frame_h: u32) -> Option<BoundingBox> {
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = self.right().min(frame_w as i32);
        let y2 = self.bottom().min(frame_h as i32);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(BoundingBox::new(x1, y1, x2 - x1, y2 - y1))
    }

    pub fn translated(&self, dx: i32, dy: i32) -> BoundingBox {
        BoundingBox::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

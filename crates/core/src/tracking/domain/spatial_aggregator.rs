use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::shared::bounding_box::Point;
use crate::shared::config::ConfigurationError;

use super::blob::Blob;

/// One of the four frame regions split at the midlines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Quadrant {
    /// Top-left.
    Q1,
    /// Top-right.
    Q2,
    /// Bottom-left.
    Q3,
    /// Bottom-right.
    Q4,
}

/// Which point of a blob decides its quadrant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferencePoint {
    #[serde(rename = "first")]
    FirstDetected,
    #[default]
    #[serde(rename = "current")]
    Current,
}

impl FromStr for ReferencePoint {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(ReferencePoint::FirstDetected),
            "current" => Ok(ReferencePoint::Current),
            _ => Err(ConfigurationError::UnknownReferencePoint(s.to_string())),
        }
    }
}

impl fmt::Display for ReferencePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferencePoint::FirstDetected => write!(f, "first"),
            ReferencePoint::Current => write!(f, "current"),
        }
    }
}

/// Blob counts per quadrant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuadrantCounts {
    #[serde(rename = "quarter_1")]
    pub q1: usize,
    #[serde(rename = "quarter_2")]
    pub q2: usize,
    #[serde(rename = "quarter_3")]
    pub q3: usize,
    #[serde(rename = "quarter_4")]
    pub q4: usize,
}

impl QuadrantCounts {
    pub fn total(&self) -> usize {
        self.q1 + self.q2 + self.q3 + self.q4
    }

    fn increment(&mut self, quadrant: Quadrant) {
        match quadrant {
            Quadrant::Q1 => self.q1 += 1,
            Quadrant::Q2 => self.q2 += 1,
            Quadrant::Q3 => self.q3 += 1,
            Quadrant::Q4 => self.q4 += 1,
        }
    }
}

/// Where a blob was first seen and where it is now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Trajectory {
    pub first: Point,
    pub last: Point,
}

impl fmt::Display for Trajectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.first, self.last)
    }
}

/// Points exactly on a midline fall to the right/bottom side.
pub fn quadrant_of(point: Point, frame_width: u32, frame_height: u32) -> Quadrant {
    let half_w = f64::from(frame_width) / 2.0;
    let half_h = f64::from(frame_height) / 2.0;
    let x = f64::from(point.x);
    let y = f64::from(point.y);

    if x < half_w && y < half_h {
        Quadrant::Q1
    } else if y < half_h {
        Quadrant::Q2
    } else if x < half_w {
        Quadrant::Q3
    } else {
        Quadrant::Q4
    }
}

pub fn export_trajectories(blobs: &[Blob]) -> Vec<Trajectory> {
    blobs
        .iter()
        .map(|blob| Trajectory {
            first: blob.position_first_detected(),
            last: blob.centroid(),
        })
        .collect()
}

pub fn aggregate_counts(
    blobs: &[Blob],
    frame_width: u32,
    frame_height: u32,
    reference: ReferencePoint,
) -> QuadrantCounts {
    let mut counts = QuadrantCounts::default();
    for blob in blobs {
        let point = match reference {
            ReferencePoint::FirstDetected => blob.position_first_detected(),
            ReferencePoint::Current => blob.centroid(),
        };
        counts.increment(quadrant_of(point, frame_width, frame_height));
    }
    counts
}

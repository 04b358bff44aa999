use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tracking::domain::spatial_aggregator::ReferencePoint;

use super::constants::{
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_DETECTION_INTERVAL,
    DEFAULT_MAX_CONSECUTIVE_DETECTION_FAILURES, DEFAULT_OVERLAP_THRESHOLD,
};

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("unknown detector '{0}' (options: {options})", options = option_list(DetectorKind::ALL))]
    UnknownDetector(String),
    #[error("unknown tracker '{0}' (options: {options})", options = option_list(TrackerKind::ALL))]
    UnknownTracker(String),
    #[error("unknown reference point '{0}' (options: first, current)")]
    UnknownReferencePoint(String),
    #[error("detection interval must be >= 1, got {0}")]
    InvalidDetectionInterval(usize),
    #[error("overlap threshold must be in (0.0, 1.0], got {0}")]
    InvalidOverlapThreshold(f64),
    #[error("confidence threshold must be in [0.0, 1.0], got {0}")]
    InvalidConfidence(f64),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("class list {0} is empty")]
    EmptyClassList(PathBuf),
}

fn option_list<T: fmt::Display>(kinds: &[T]) -> String {
    kinds
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Object detector implementations that can be selected by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    /// Darknet-style YOLO export (objectness column, normalized coordinates).
    Yolo,
    /// Ultralytics YOLOv8 export (no objectness, letterboxed pixels).
    Yolov8,
}

impl DetectorKind {
    pub const ALL: &[DetectorKind] = &[DetectorKind::Yolo, DetectorKind::Yolov8];
}

impl FromStr for DetectorKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        DetectorKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.to_string() == name)
            .ok_or_else(|| ConfigurationError::UnknownDetector(s.to_string()))
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectorKind::Yolo => write!(f, "yolo"),
            DetectorKind::Yolov8 => write!(f, "yolov8"),
        }
    }
}

/// Single-object visual trackers that can be selected by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerKind {
    Template,
    Histogram,
}

impl TrackerKind {
    pub const ALL: &[TrackerKind] = &[TrackerKind::Template, TrackerKind::Histogram];
}

impl FromStr for TrackerKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        TrackerKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.to_string() == name)
            .ok_or_else(|| ConfigurationError::UnknownTracker(s.to_string()))
    }
}

impl fmt::Display for TrackerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerKind::Template => write!(f, "template"),
            TrackerKind::Histogram => write!(f, "histogram"),
        }
    }
}

/// Resolved settings for one tracking run.
///
/// Every field has a default, so a JSON file only needs the keys it
/// changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub detector: DetectorKind,
    pub tracker: TrackerKind,
    pub detection_interval: usize,
    pub max_consecutive_detection_failures: usize,
    /// Reserved. Tracking failures are counted per blob but never evict it;
    /// this limit is carried for callers that want to act on the counter
    /// and is not enforced by the engine.
    pub max_consecutive_tracking_failures: Option<usize>,
    pub overlap_threshold: f64,
    pub confidence_threshold: f64,
    /// Empty means every class the model knows.
    pub classes_of_interest: Vec<String>,
    pub remove_duplicates: bool,
    pub max_frames: Option<usize>,
    pub reference_point: ReferencePoint,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            detector: DetectorKind::Yolov8,
            tracker: TrackerKind::Template,
            detection_interval: DEFAULT_DETECTION_INTERVAL,
            max_consecutive_detection_failures: DEFAULT_MAX_CONSECUTIVE_DETECTION_FAILURES,
            max_consecutive_tracking_failures: None,
            overlap_threshold: DEFAULT_OVERLAP_THRESHOLD,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            classes_of_interest: Vec::new(),
            remove_duplicates: true,
            max_frames: None,
            reference_point: ReferencePoint::Current,
        }
    }
}

impl TrackingConfig {
    /// Loads a JSON config file; missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let json = fs::read_to_string(path).map_err(|e| ConfigurationError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: TrackingConfig =
            serde_json::from_str(&json).map_err(|e| ConfigurationError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.detection_interval < 1 {
            return Err(ConfigurationError::InvalidDetectionInterval(
                self.detection_interval,
            ));
        }
        if !(self.overlap_threshold > 0.0 && self.overlap_threshold <= 1.0) {
            return Err(ConfigurationError::InvalidOverlapThreshold(
                self.overlap_threshold,
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigurationError::InvalidConfidence(
                self.confidence_threshold,
            ));
        }
        Ok(())
    }
}

/// Reads class names, one per line. Blank lines are skipped.
pub fn read_class_names(path: &Path) -> Result<Vec<String>, ConfigurationError> {
    let text = fs::read_to_string(path).map_err(|e| ConfigurationError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    let names: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();
    if names.is_empty() {
        return Err(ConfigurationError::EmptyClassList(path.to_path_buf()));
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("yolo", DetectorKind::Yolo)]
    #[case("yolov8", DetectorKind::Yolov8)]
    #[case(" YOLOv8 ", DetectorKind::Yolov8)]
    fn test_detector_kind_parses(#[case] input: &str, #[case] expected: DetectorKind) {
        assert_eq!(input.parse::<DetectorKind>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_detector_is_configuration_error() {
        let err = "ssd".parse::<DetectorKind>().unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownDetector(ref name) if name == "ssd"));
        assert!(err.to_string().contains("options: yolo, yolov8"));
    }

    #[test]
    fn test_unknown_tracker_is_configuration_error() {
        let err = "kcf".parse::<TrackerKind>().unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownTracker(_)));
        assert!(err.to_string().contains("options: template, histogram"));
        assert_eq!(" Histogram ".parse::<TrackerKind>().unwrap(), TrackerKind::Histogram);
    }

    #[test]
    fn test_kinds_display_roundtrip() {
        for kind in DetectorKind::ALL {
            assert_eq!(kind.to_string().parse::<DetectorKind>().unwrap(), *kind);
        }
        for kind in TrackerKind::ALL {
            assert_eq!(kind.to_string().parse::<TrackerKind>().unwrap(), *kind);
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = TrackingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.overlap_threshold, DEFAULT_OVERLAP_THRESHOLD);
        assert!(config.max_consecutive_tracking_failures.is_none());
    }

    #[test]
    fn test_zero_detection_interval_rejected() {
        let config = TrackingConfig {
            detection_interval: 0,
            ..TrackingConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidDetectionInterval(0))
        ));
    }

    #[rstest]
    #[case(0.0)]
    #[case(1.5)]
    #[case(-0.1)]
    fn test_out_of_range_overlap_threshold_rejected(#[case] threshold: f64) {
        let config = TrackingConfig {
            overlap_threshold: threshold,
            ..TrackingConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidOverlapThreshold(_))
        ));
    }

    #[test]
    fn test_load_partial_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"detector": "yolo", "tracker": "histogram", "detection_interval": 3,
                "classes_of_interest": ["car", "truck"], "reference_point": "first"}"#,
        )
        .unwrap();

        let config = TrackingConfig::load(&path).unwrap();
        assert_eq!(config.detector, DetectorKind::Yolo);
        assert_eq!(config.tracker, TrackerKind::Histogram);
        assert_eq!(config.detection_interval, 3);
        assert_eq!(config.classes_of_interest, vec!["car", "truck"]);
        assert_eq!(config.reference_point, ReferencePoint::FirstDetected);
        assert_eq!(
            config.max_consecutive_detection_failures,
            DEFAULT_MAX_CONSECUTIVE_DETECTION_FAILURES
        );
    }

    #[test]
    fn test_load_rejects_unknown_detector_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"detector": "ssd"}"#).unwrap();
        assert!(matches!(
            TrackingConfig::load(&path),
            Err(ConfigurationError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            TrackingConfig::load(Path::new("/nonexistent/config.json")),
            Err(ConfigurationError::Read { .. })
        ));
    }

    #[test]
    fn test_read_class_names_trims_and_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classes.txt");
        fs::write(&path, "person\n  car \n\ntruck\n").unwrap();
        assert_eq!(
            read_class_names(&path).unwrap(),
            vec!["person", "car", "truck"]
        );
    }

    #[test]
    fn test_read_class_names_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classes.txt");
        fs::write(&path, "\n\n").unwrap();
        assert!(matches!(
            read_class_names(&path),
            Err(ConfigurationError::EmptyClassList(_))
        ));
    }
}

use std::path::Path;

use crate::detection::domain::object_detector::ObjectDetector;
use crate::shared::config::{read_class_names, DetectorKind};

use super::onnx_yolo_detector::OnnxYoloDetector;

/// Loads the detector selected by `kind`.
///
/// Class names are read from `classes_path`, one per line, in the order the
/// model indexes them.
pub fn create_detector(
    kind: DetectorKind,
    model_path: &Path,
    classes_path: &Path,
    classes_of_interest: &[String],
    confidence: f64,
) -> Result<Box<dyn ObjectDetector>, Box<dyn std::error::Error>> {
    let class_names = read_class_names(classes_path)?;
    if classes_of_interest.is_empty() {
        log::info!("Using {kind} detector for all {} classes", class_names.len());
    } else {
        for name in classes_of_interest {
            if !class_names.contains(name) {
                log::warn!("Class of interest '{name}' is not in {}", classes_path.display());
            }
        }
        log::info!("Using {kind} detector for {}", classes_of_interest.join(", "));
    }
    Ok(Box::new(OnnxYoloDetector::new(
        model_path,
        kind,
        class_names,
        classes_of_interest,
        confidence,
    )?))
}

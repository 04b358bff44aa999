/// YOLO object detector using ONNX Runtime via `ort`.
///
/// Handles both supported export layouts: Darknet-style models (stretched
/// input, objectness column, coordinates normalized to the frame) and
/// Ultralytics YOLOv8 models (letterboxed input, no objectness, coordinates
/// in letterbox pixels).
use std::collections::HashSet;
use std::path::Path;

use crate::detection::domain::object_detector::{Detection, ObjectDetector};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::config::DetectorKind;
use crate::shared::frame::Frame;

use super::execution_provider::preferred_execution_providers;

/// Fallback model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Darknet models are conventionally run at 416×416.
const DEFAULT_DARKNET_INPUT_SIZE: u32 = 416;

const DARKNET_NMS_IOU_THRESH: f64 = 0.4;
const YOLOV8_NMS_IOU_THRESH: f64 = 0.45;

/// YOLO detector backed by an ONNX Runtime session.
pub struct OnnxYoloDetector {
    session: ort::session::Session,
    layout: DetectorKind,
    filter: ClassFilter,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Load a YOLO ONNX model and prepare for inference.
    ///
    /// The input resolution is read from the model's input shape (expecting
    /// NCHW) and falls back to the layout's conventional size when dynamic.
    pub fn new(
        model_path: &Path,
        layout: DetectorKind,
        class_names: Vec<String>,
        classes_of_interest: &[String],
        confidence: f64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;

        let fallback = match layout {
            DetectorKind::Yolo => DEFAULT_DARKNET_INPUT_SIZE,
            DetectorKind::Yolov8 => DEFAULT_INPUT_SIZE,
        };
        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(fallback);

        log::info!(
            "Loaded {layout} model {} (input {input_size}x{input_size}, {} classes)",
            model_path.display(),
            class_names.len()
        );

        Ok(Self {
            session,
            layout,
            filter: ClassFilter::new(class_names, classes_of_interest, confidence),
            input_size,
        })
    }
}

impl ObjectDetector for OnnxYoloDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        // 1. Preprocess → NCHW float32
        let (input_tensor, mapping) = match self.layout {
            DetectorKind::Yolo => (
                stretch(frame, self.input_size),
                InputMapping::Normalized {
                    frame_width: frame.width() as f64,
                    frame_height: frame.height() as f64,
                },
            ),
            DetectorKind::Yolov8 => {
                let (tensor, scale, pad_x, pad_y) = letterbox(frame, self.input_size);
                (tensor, InputMapping::Letterbox { scale, pad_x, pad_y })
            }
        };

        // 2. Inference
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape();

        // Output is [1, features, detections] (transposed) or
        // [1, detections, features]. Handle both.
        let (num_dets, num_feats, transposed) = match shape {
            [_, a, b] if a < b => (*b, *a, true),
            [_, a, b] => (*a, *b, false),
            [a, b] => (*a, *b, false),
            _ => return Err(format!("Unexpected YOLO output shape: {shape:?}").into()),
        };

        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;

        // 3. Parse candidates
        let mut candidates = Vec::new();
        for i in 0..num_dets {
            let row = if transposed {
                (0..num_feats)
                    .map(|f| data[f * num_dets + i])
                    .collect::<Vec<f32>>()
            } else {
                data[i * num_feats..(i + 1) * num_feats].to_vec()
            };

            if let Some(candidate) = decode_row(&row, self.layout, &mapping, &self.filter) {
                candidates.push(candidate);
            }
        }

        // 4. NMS
        let kept = match self.layout {
            DetectorKind::Yolo => nms(&mut candidates, DARKNET_NMS_IOU_THRESH, false),
            DetectorKind::Yolov8 => nms(&mut candidates, YOLOV8_NMS_IOU_THRESH, true),
        };

        let detections: Vec<Detection> = kept.into_iter().filter_map(to_detection).collect();
        log::trace!(
            "Frame {}: {} detections after NMS",
            frame.index(),
            detections.len()
        );
        Ok(detections)
    }
}

// ---------------------------------------------------------------------------
// Class filtering
// ---------------------------------------------------------------------------

/// Maps class ids to names and applies the confidence and class-of-interest
/// filters.
struct ClassFilter {
    class_names: Vec<String>,
    of_interest: HashSet<String>,
    confidence: f64,
}

impl ClassFilter {
    fn new(class_names: Vec<String>, classes_of_interest: &[String], confidence: f64) -> Self {
        Self {
            class_names,
            of_interest: classes_of_interest.iter().cloned().collect(),
            confidence,
        }
    }

    /// Label for an accepted candidate. Scores must strictly exceed the
    /// threshold; an empty interest list accepts every class.
    fn accept(&self, class_id: usize, score: f64) -> Option<String> {
        if score <= self.confidence {
            return None;
        }
        let label = self
            .class_names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{class_id}"));
        if !self.of_interest.is_empty() && !self.of_interest.contains(&label) {
            return None;
        }
        Some(label)
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// How model output coordinates map back onto the source frame.
#[derive(Clone, Copy, Debug)]
enum InputMapping {
    /// Coordinates are fractions of the frame size.
    Normalized { frame_width: f64, frame_height: f64 },
    /// Coordinates are pixels of a letterboxed square input.
    Letterbox { scale: f64, pad_x: u32, pad_y: u32 },
}

impl InputMapping {
    fn to_frame(&self, cx: f64, cy: f64, w: f64, h: f64) -> [f64; 4] {
        match *self {
            InputMapping::Normalized {
                frame_width,
                frame_height,
            } => {
                // Center and size become whole pixels before the corner is
                // derived, so the box keeps the truncated width and height.
                let cx = (cx * frame_width).trunc();
                let cy = (cy * frame_height).trunc();
                let w = (w * frame_width).trunc();
                let h = (h * frame_height).trunc();
                let x1 = (cx - w / 2.0).trunc();
                let y1 = (cy - h / 2.0).trunc();
                [x1, y1, x1 + w, y1 + h]
            }
            InputMapping::Letterbox {
                scale,
                pad_x,
                pad_y,
            } => [
                ((cx - w / 2.0) - pad_x as f64) / scale,
                ((cy - h / 2.0) - pad_y as f64) / scale,
                ((cx + w / 2.0) - pad_x as f64) / scale,
                ((cy + h / 2.0) - pad_y as f64) / scale,
            ],
        }
    }
}

/// Letterbox-resize a frame to `target_size` × `target_size`.
///
/// Returns `(NCHW float32 tensor, scale, pad_x, pad_y)`.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, f64, u32, u32) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = (fw * scale).round() as u32;
    let new_h = (fh * scale).round() as u32;
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // Padded area is 114/255 gray (YOLO convention)
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    // Nearest-neighbor resize into the padded region
    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x, pad_y)
}

/// Stretch-resize a frame to `target_size` × `target_size`, ignoring aspect
/// ratio (Darknet convention).
fn stretch(frame: &Frame, target_size: u32) -> ndarray::Array4<f32> {
    let size = target_size as usize;
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let sx = src_w as f64 / target_size as f64;
    let sy = src_h as f64 / target_size as f64;

    ndarray::Array4::<f32>::from_shape_fn((1, 3, size, size), |(_, c, y, x)| {
        let src_y = ((y as f64 * sy) as usize).min(src_h - 1);
        let src_x = ((x as f64 * sx) as usize).min(src_w - 1);
        src[[src_y, src_x, c]] as f32 / 255.0
    })
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct Candidate {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    class_id: usize,
    label: String,
    confidence: f64,
}

/// Decodes one output row.
///
/// Darknet rows are `[cx, cy, w, h, objectness, scores...]`, YOLOv8 rows are
/// `[cx, cy, w, h, scores...]`. The confidence is the best class score on
/// its own; objectness is not folded in.
fn decode_row(
    row: &[f32],
    layout: DetectorKind,
    mapping: &InputMapping,
    filter: &ClassFilter,
) -> Option<Candidate> {
    let scores_start = match layout {
        DetectorKind::Yolo => 5,
        DetectorKind::Yolov8 => 4,
    };
    if row.len() <= scores_start {
        return None;
    }

    let (class_id, score) = row[scores_start..]
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))?;
    let confidence = *score as f64;
    let label = filter.accept(class_id, confidence)?;

    let [x1, y1, x2, y2] = mapping.to_frame(
        row[0] as f64,
        row[1] as f64,
        row[2] as f64,
        row[3] as f64,
    );

    Some(Candidate {
        x1,
        y1,
        x2,
        y2,
        class_id,
        label,
        confidence,
    })
}

/// Truncates to integer pixels; degenerate boxes are dropped.
fn to_detection(candidate: Candidate) -> Option<Detection> {
    let x = candidate.x1 as i32;
    let y = candidate.y1 as i32;
    let width = candidate.x2 as i32 - x;
    let height = candidate.y2 as i32 - y;
    if width <= 0 || height <= 0 {
        return None;
    }
    Some(Detection::new(
        BoundingBox::new(x, y, width, height),
        candidate.label,
        candidate.confidence,
    ))
}

// ---------------------------------------------------------------------------
// NMS
// ---------------------------------------------------------------------------

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes.
/// With `per_class`, only boxes of the same class suppress each other.
fn nms(dets: &mut [Candidate], iou_thresh: f64, per_class: bool) -> Vec<Candidate> {
    dets.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i].clone());
        for j in (i + 1)..dets.len() {
            if suppressed[j] || (per_class && dets[i].class_id != dets[j].class_id) {
                continue;
            }
            let iou = bbox_iou(
                &[dets[i].x1, dets[i].y1, dets[i].x2, dets[i].y2],
                &[dets[j].x1, dets[j].y1, dets[j].x2, dets[j].y2],
            );
            if iou > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}

fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

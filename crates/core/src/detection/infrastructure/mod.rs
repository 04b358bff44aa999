pub mod detector_factory;
mod execution_provider;
pub mod onnx_yolo_detector;

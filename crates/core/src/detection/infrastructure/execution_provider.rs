use ort::execution_providers::ExecutionProviderDispatch;

/// ONNX execution providers to try for the detector session, in order.
///
/// ONNX Runtime falls back to its CPU provider when none of these can be
/// registered, so an empty list simply means CPU.
pub fn preferred_execution_providers() -> Vec<ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        log::debug!("Requesting CoreML execution provider");
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        log::debug!("Requesting DirectML execution provider");
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        log::debug!("Using CPU execution provider");
        Vec::new()
    }
}

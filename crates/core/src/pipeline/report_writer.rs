use std::path::{Path, PathBuf};

use super::video_report::VideoReport;

/// Persists the report produced for one source video.
pub trait ReportWriter: Send {
    /// Writes `report` for the video at `source` and returns where it went.
    fn write(
        &self,
        source: &Path,
        report: &VideoReport,
    ) -> Result<PathBuf, Box<dyn std::error::Error>>;
}

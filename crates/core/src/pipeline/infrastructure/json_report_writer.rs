use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::pipeline::report_writer::ReportWriter;
use crate::pipeline::video_report::VideoReport;

/// Writes `<output_dir>/<source stem>.json` as pretty-printed JSON.
///
/// Files left by earlier runs are overwritten. Within one writer, a second
/// source with an already used stem gets `<stem>-1.json`, then `-2`, and so on.
pub struct JsonReportWriter {
    output_dir: PathBuf,
    written: Mutex<HashSet<PathBuf>>,
}

impl JsonReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            written: Mutex::new(HashSet::new()),
        }
    }

    pub fn report_path(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report".to_string());
        self.output_dir.join(format!("{stem}.json"))
    }

    fn unused_path(&self, source: &Path, written: &HashSet<PathBuf>) -> PathBuf {
        let path = self.report_path(source);
        if !written.contains(&path) {
            return path;
        }
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        (1..)
            .map(|n| self.output_dir.join(format!("{stem}-{n}.json")))
            .find(|candidate| !written.contains(candidate))
            .unwrap_or(path)
    }
}

impl ReportWriter for JsonReportWriter {
    fn write(
        &self,
        source: &Path,
        report: &VideoReport,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let mut written = self.written.lock().unwrap_or_else(PoisonError::into_inner);
        fs::create_dir_all(&self.output_dir)?;
        let path = self.unused_path(source, &written);
        let json = serde_json::to_string_pretty(report)?;
        fs::write(&path, json)?;
        log::info!("Report written to {}", path.display());
        written.insert(path.clone());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::domain::spatial_aggregator::QuadrantCounts;

    fn report() -> VideoReport {
        VideoReport {
            vectors: vec!["(1, 2),(3, 4)".to_string()],
            counts: QuadrantCounts {
                q1: 1,
                q2: 0,
                q3: 0,
                q4: 0,
            },
        }
    }

    #[test]
    fn test_writes_json_named_after_source_stem() {
        let dir = tempfile::tempdir().unwrap();
        let writer = JsonReportWriter::new(dir.path());

        let path = writer.write(Path::new("/videos/traffic.mp4"), &report()).unwrap();

        assert_eq!(path, dir.path().join("traffic.json"));
        let text = fs::read_to_string(&path).unwrap();
        let parsed: VideoReport = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, report());
        assert!(text.contains("\"quarter_1\": 1"));
    }

    #[test]
    fn test_creates_missing_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("out").join("reports");
        let writer = JsonReportWriter::new(&nested);

        let path = writer.write(Path::new("clip.avi"), &report()).unwrap();

        assert!(path.exists());
        assert_eq!(path.parent().unwrap(), nested);
    }

    #[test]
    fn test_overwrites_existing_report() {
        let dir = tempfile::tempdir().unwrap();
        let writer = JsonReportWriter::new(dir.path());
        fs::write(dir.path().join("clip.json"), "stale").unwrap();

        let path = writer.write(Path::new("clip.mp4"), &report()).unwrap();

        assert!(fs::read_to_string(path).unwrap().contains("vectors"));
    }

    #[test]
    fn test_same_stem_from_different_dirs_gets_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = JsonReportWriter::new(dir.path());

        let first = writer.write(Path::new("/cam_a/clip.mp4"), &report()).unwrap();
        let second = writer.write(Path::new("/cam_b/clip.mp4"), &report()).unwrap();
        let third = writer.write(Path::new("/cam_c/clip.avi"), &report()).unwrap();

        assert_eq!(first, dir.path().join("clip.json"));
        assert_eq!(second, dir.path().join("clip-1.json"));
        assert_eq!(third, dir.path().join("clip-2.json"));
        assert!(first.exists() && second.exists() && third.exists());
    }

    #[test]
    fn test_failed_write_does_not_claim_name() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, "").unwrap();
        let writer = JsonReportWriter::new(&blocker);

        assert!(writer.write(Path::new("clip.mp4"), &report()).is_err());
        assert!(writer.written.lock().unwrap().is_empty());
    }

    #[test]
    fn test_report_path_without_extension() {
        let writer = JsonReportWriter::new("/tmp/out");
        assert_eq!(
            writer.report_path(Path::new("/data/camera01")),
            PathBuf::from("/tmp/out/camera01.json")
        );
    }
}

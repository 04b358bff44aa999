use std::collections::BTreeMap;
use std::time::Instant;

use crate::shared::constants::PROGRESS_THROTTLE_FRAMES;

/// Observer for one video's frame loop.
///
/// The tracking loop reports through this trait only, so the batch driver
/// decides where progress, stage timings and blob counts end up.
pub trait PipelineLogger: Send {
    /// `current` frames done out of `total`; `total` is 0 when the
    /// container does not advertise a frame count.
    fn progress(&mut self, current: usize, total: usize);

    /// Time spent in one stage (`detect`, `associate`, `track`) on one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Point-in-time value, such as the number of live blobs.
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// Called once the video is finished. Default: no-op.
    fn summary(&self) {}
}

/// Discards everything.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Running aggregate of one stage or metric.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Stat {
    count: usize,
    sum: f64,
    last: f64,
}

impl Stat {
    fn record(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.last = value;
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Logs progress through `log` every `throttle_frames` frames and prints a
/// per-stage breakdown when the video ends.
pub struct StdoutPipelineLogger {
    throttle_frames: usize,
    stages: BTreeMap<String, Stat>,
    metrics: BTreeMap<String, Stat>,
    started: Instant,
    frames_done: usize,
    messages: Vec<String>,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            stages: BTreeMap::new(),
            metrics: BTreeMap::new(),
            started: Instant::now(),
            frames_done: 0,
            messages: Vec::new(),
        }
    }

    /// Multi-line summary, or `None` when nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.stages.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed = self.started.elapsed().as_secs_f64();
        let mut out = format!(
            "Processed {} frames in {elapsed:.1}s",
            self.frames_done
        );
        if self.frames_done > 0 && elapsed > 0.0 {
            out += &format!(" ({:.1} fps)", self.frames_done as f64 / elapsed);
        }

        for (name, stat) in &self.stages {
            let share = if elapsed > 0.0 {
                stat.sum / (elapsed * 1000.0) * 100.0
            } else {
                0.0
            };
            out += &format!(
                "\n  {name:<10} {:>8.2} ms/frame {:>9.0} ms {share:>5.1}%",
                stat.mean(),
                stat.sum
            );
        }
        for (name, stat) in &self.metrics {
            out += &format!("\n  {name}: mean {:.1}, last {:.0}", stat.mean(), stat.last);
        }
        Some(out)
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(PROGRESS_THROTTLE_FRAMES)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames_done = current;
        let last_frame = total > 0 && current == total;
        if current % self.throttle_frames != 0 && !last_frame {
            return;
        }
        match total {
            0 => log::info!("Frame {current}"),
            _ => log::info!(
                "Frame {current}/{total} ({:.0}%)",
                current as f64 * 100.0 / total as f64
            ),
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.stages
            .entry(stage.to_owned())
            .or_default()
            .record(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_owned()).or_default().record(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
        self.messages.push(message.to_owned());
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_null_logger_accepts_everything() {
        let mut logger = NullPipelineLogger;
        logger.progress(1, 10);
        logger.timing("detect", 5.0);
        logger.metric("blobs", 3.0);
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_stage_timings_aggregate() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.timing("detect", 20.0);
        logger.timing("detect", 30.0);
        logger.timing("track", 5.0);

        let detect = logger.stages.get("detect").unwrap();
        assert_eq!(detect.count, 2);
        assert_relative_eq!(detect.sum, 50.0);
        assert_relative_eq!(detect.mean(), 25.0);
        assert_eq!(logger.stages.get("track").unwrap().count, 1);
        assert!(logger.stages.get("associate").is_none());
    }

    #[test]
    fn test_metric_keeps_last_value() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.metric("blobs", 3.0);
        logger.metric("blobs", 4.0);

        let blobs = logger.metrics.get("blobs").unwrap();
        assert_relative_eq!(blobs.mean(), 3.5);
        assert_relative_eq!(blobs.last, 4.0);
    }

    #[test]
    fn test_summary_lists_stages_and_metrics() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.progress(10, 0);
        logger.timing("detect", 20.0);
        logger.timing("associate", 1.0);
        logger.metric("blobs", 3.0);
        logger.metric("blobs", 4.0);

        let summary = logger.summary_string().unwrap();

        assert!(summary.starts_with("Processed 10 frames"));
        assert!(summary.contains("detect"));
        assert!(summary.contains("associate"));
        assert!(summary.contains("blobs: mean 3.5, last 4"));
        // Stages come out sorted by name.
        assert!(summary.find("associate").unwrap() < summary.find("detect").unwrap());
    }

    #[test]
    fn test_nothing_recorded_means_no_summary() {
        assert!(StdoutPipelineLogger::new(10).summary_string().is_none());
    }

    #[test]
    fn test_progress_counts_frames_without_total() {
        let mut logger = StdoutPipelineLogger::new(10);
        for i in 1..=25 {
            logger.progress(i, 0);
        }
        assert_eq!(logger.frames_done, 25);
    }

    #[test]
    fn test_info_is_kept() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.info("hello world");
        assert_eq!(logger.messages, vec!["hello world"]);
    }

    #[test]
    fn test_zero_throttle_is_clamped() {
        assert_eq!(StdoutPipelineLogger::new(0).throttle_frames, 1);
        assert_eq!(
            StdoutPipelineLogger::default().throttle_frames,
            PROGRESS_THROTTLE_FRAMES
        );
    }
}

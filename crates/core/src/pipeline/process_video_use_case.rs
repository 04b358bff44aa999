use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use crate::shared::config::TrackingConfig;
use crate::shared::video_metadata::VideoMetadata;
use crate::tracking::domain::blob::Blob;
use crate::tracking::domain::spatial_aggregator::ReferencePoint;
use crate::video::domain::video_reader::VideoReader;

use super::pipeline_logger::PipelineLogger;
use super::tracking_engine::TrackingEngine;
use super::video_report::VideoReport;

#[derive(Error, Debug)]
pub enum ProcessVideoError {
    #[error("video source {path} is unavailable: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error>,
    },
}

/// Why the frame loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndReason {
    EndOfStream,
    Cancelled,
    FrameLimit,
    ReadFailure,
    DetectorFailure,
}

#[derive(Debug)]
pub struct ProcessOutcome {
    pub report: VideoReport,
    pub metadata: VideoMetadata,
    pub frames_processed: usize,
    pub blobs_alive: usize,
    pub end_reason: EndReason,
}

/// Closes the reader on every exit path.
struct ReaderGuard<'a> {
    reader: &'a mut dyn VideoReader,
}

impl Drop for ReaderGuard<'_> {
    fn drop(&mut self) {
        self.reader.close();
    }
}

/// Runs the tracking loop over one video at a time.
///
/// The blob set starts empty for every video. Whatever ends the loop
/// (end of stream, cancellation, frame limit, a read or detector failure),
/// the report is still built from the blobs alive at that point.
pub struct ProcessVideoUseCase {
    engine: TrackingEngine,
    max_frames: Option<usize>,
    reference_point: ReferencePoint,
    cancelled: Arc<AtomicBool>,
}

impl ProcessVideoUseCase {
    pub fn new(
        engine: TrackingEngine,
        config: &TrackingConfig,
        cancelled: Option<Arc<AtomicBool>>,
    ) -> Self {
        Self {
            engine,
            max_frames: config.max_frames,
            reference_point: config.reference_point,
            cancelled: cancelled.unwrap_or_else(|| Arc::new(AtomicBool::new(false))),
        }
    }

    pub fn execute(
        &mut self,
        reader: &mut dyn VideoReader,
        source: &Path,
        logger: &mut dyn PipelineLogger,
    ) -> Result<ProcessOutcome, ProcessVideoError> {
        let mut guard = ReaderGuard { reader };
        let metadata =
            guard
                .reader
                .open(source)
                .map_err(|e| ProcessVideoError::SourceUnavailable {
                    path: source.to_path_buf(),
                    source: e,
                })?;

        logger.info(&format!(
            "Processing {} ({}x{}, {:.2} fps)",
            source.display(),
            metadata.width,
            metadata.height,
            metadata.fps
        ));

        let start = Instant::now();
        let mut blobs: Vec<Blob> = Vec::new();
        let (frames_processed, end_reason) = self.run_loop(guard, &metadata, &mut blobs, logger);

        let seconds = start.elapsed().as_secs_f64();
        let fps = if seconds > 0.0 {
            frames_processed as f64 / seconds
        } else {
            0.0
        };
        logger.info(&format!(
            "Processing ended ({end_reason:?}): {frames_processed} frames in {seconds:.2}s \
             ({fps:.1} fps), {} blobs",
            blobs.len()
        ));
        logger.summary();

        let report = VideoReport::from_blobs(
            &blobs,
            metadata.width,
            metadata.height,
            self.reference_point,
        );

        Ok(ProcessOutcome {
            report,
            metadata,
            frames_processed,
            blobs_alive: blobs.len(),
            end_reason,
        })
    }

    /// Consumes the guard, so the reader is closed as soon as the loop ends.
    fn run_loop(
        &mut self,
        mut guard: ReaderGuard<'_>,
        metadata: &VideoMetadata,
        blobs: &mut Vec<Blob>,
        logger: &mut dyn PipelineLogger,
    ) -> (usize, EndReason) {
        let mut frames_processed = 0;
        let mut frames = guard.reader.frames();

        let end_reason = loop {
            if self.max_frames.is_some_and(|limit| frames_processed >= limit) {
                break EndReason::FrameLimit;
            }

            let frame = match frames.next() {
                None => break EndReason::EndOfStream,
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    log::warn!("Frame read failed after {frames_processed} frames: {e}");
                    break EndReason::ReadFailure;
                }
            };

            if let Err(e) = self.engine.process_frame(&frame, blobs, logger) {
                log::error!("Detector failed on frame {}: {e}", frame.index());
                break EndReason::DetectorFailure;
            }

            frames_processed += 1;
            logger.metric("blobs", blobs.len() as f64);
            logger.progress(frames_processed, metadata.total_frames);

            if self.cancelled.load(Ordering::Relaxed) {
                log::info!("Cancelled after {frames_processed} frames");
                break EndReason::Cancelled;
            }
        };

        drop(frames);
        drop(guard);
        (frames_processed, end_reason)
    }
}

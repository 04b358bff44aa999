use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use blobtrack_core::detection::infrastructure::detector_factory::create_detector;
use blobtrack_core::pipeline::infrastructure::json_report_writer::JsonReportWriter;
use blobtrack_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use blobtrack_core::pipeline::process_video_use_case::{
    EndReason, ProcessVideoError, ProcessVideoUseCase,
};
use blobtrack_core::pipeline::report_writer::ReportWriter;
use blobtrack_core::pipeline::tracking_engine::TrackingEngine;
use blobtrack_core::pipeline::video_report::VideoReport;
use blobtrack_core::shared::config::{DetectorKind, TrackerKind, TrackingConfig};
use blobtrack_core::tracking::domain::spatial_aggregator::ReferencePoint;
use blobtrack_core::tracking::infrastructure::tracker_factory::create_tracker_factory;
use blobtrack_core::video::infrastructure::ffmpeg_reader::FfmpegReader;

/// Track detected objects through videos and export their trajectories.
#[derive(Parser)]
#[command(name = "blobtrack")]
struct Cli {
    /// Input video files, processed in order.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// ONNX detector model.
    #[arg(long)]
    model: PathBuf,

    /// Class names file, one per line, in model output order.
    #[arg(long)]
    classes: PathBuf,

    /// Directory for the per-video JSON reports.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// JSON settings file; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Detector output layout: yolo or yolov8.
    #[arg(long)]
    detector: Option<String>,

    /// Visual tracker: template or histogram.
    #[arg(long)]
    tracker: Option<String>,

    /// Only keep these classes (comma-separated). Empty keeps all.
    #[arg(long, value_delimiter = ',')]
    classes_of_interest: Option<Vec<String>>,

    /// Detection confidence threshold (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Run detection every Nth frame (1 = every frame).
    #[arg(long)]
    detection_interval: Option<usize>,

    /// Detection rounds a blob may go unmatched before it is dropped.
    #[arg(long)]
    max_detection_failures: Option<usize>,

    /// Overlap ratio for matching and de-duplication (0.0-1.0].
    #[arg(long)]
    overlap_threshold: Option<f64>,

    /// Stop each video after this many frames.
    #[arg(long)]
    max_frames: Option<usize>,

    /// Point used for quadrant counts: first or current.
    #[arg(long)]
    reference_point: Option<String>,

    /// Keep overlapping blobs instead of merging duplicates.
    #[arg(long)]
    no_dedup: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;
    let config = build_config(&cli)?;

    let detector = create_detector(
        config.detector,
        &cli.model,
        &cli.classes,
        &config.classes_of_interest,
        config.confidence_threshold,
    )?;
    let engine = TrackingEngine::new(detector, create_tracker_factory(config.tracker), &config);
    let mut use_case = ProcessVideoUseCase::new(engine, &config, None);
    let writer = JsonReportWriter::new(&cli.output_dir);

    let mut failed = 0;
    for input in &cli.inputs {
        if !process_one(&mut use_case, &writer, input) {
            failed += 1;
        }
    }

    if failed == cli.inputs.len() {
        return Err(format!("none of the {} input(s) could be processed", failed).into());
    }
    if failed > 0 {
        log::warn!("{failed} of {} input(s) were skipped", cli.inputs.len());
    }
    Ok(())
}

/// Returns `false` when the video could not be opened or its report could
/// not be saved, so the batch moves on to the next input.
fn process_one(
    use_case: &mut ProcessVideoUseCase,
    writer: &dyn ReportWriter,
    input: &Path,
) -> bool {
    let mut reader = FfmpegReader::new();
    let mut logger = StdoutPipelineLogger::default();

    let outcome = match use_case.execute(&mut reader, input, &mut logger) {
        Ok(outcome) => outcome,
        Err(e @ ProcessVideoError::SourceUnavailable { .. }) => {
            log::error!("{e}");
            return false;
        }
    };

    match outcome.end_reason {
        EndReason::ReadFailure | EndReason::DetectorFailure => log::warn!(
            "{} ended early ({:?}) after {} frames; reporting partial results",
            input.display(),
            outcome.end_reason,
            outcome.frames_processed
        ),
        _ => {}
    }

    let counts = outcome.report.counts;
    log::info!(
        "Quadrant counts for {}: Q1={} Q2={} Q3={} Q4={}",
        input.display(),
        counts.q1,
        counts.q2,
        counts.q3,
        counts.q4
    );
    save_report(writer, input, &outcome.report)
}

fn save_report(writer: &dyn ReportWriter, input: &Path, report: &VideoReport) -> bool {
    match writer.write(input, report) {
        Ok(_) => true,
        Err(e) => {
            log::error!("Failed to write report for {}: {e}", input.display());
            false
        }
    }
}

fn build_config(cli: &Cli) -> Result<TrackingConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => TrackingConfig::load(path)?,
        None => TrackingConfig::default(),
    };

    if let Some(name) = &cli.detector {
        config.detector = name.parse::<DetectorKind>()?;
    }
    if let Some(name) = &cli.tracker {
        config.tracker = name.parse::<TrackerKind>()?;
    }
    if let Some(name) = &cli.reference_point {
        config.reference_point = name.parse::<ReferencePoint>()?;
    }
    if let Some(classes) = &cli.classes_of_interest {
        config.classes_of_interest = classes
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
    }
    if let Some(confidence) = cli.confidence {
        config.confidence_threshold = confidence;
    }
    if let Some(interval) = cli.detection_interval {
        config.detection_interval = interval;
    }
    if let Some(max) = cli.max_detection_failures {
        config.max_consecutive_detection_failures = max;
    }
    if let Some(threshold) = cli.overlap_threshold {
        config.overlap_threshold = threshold;
    }
    if cli.max_frames.is_some() {
        config.max_frames = cli.max_frames;
    }
    if cli.no_dedup {
        config.remove_duplicates = false;
    }

    config.validate()?;
    log::debug!("Resolved config: {config:?}");
    Ok(config)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.model.exists() {
        return Err(format!("Model file not found: {}", cli.model.display()).into());
    }
    if !cli.classes.exists() {
        return Err(format!("Class names file not found: {}", cli.classes.display()).into());
    }
    if cli.output_dir.exists() && !cli.output_dir.is_dir() {
        return Err(format!(
            "Output path is not a directory: {}",
            cli.output_dir.display()
        )
        .into());
    }
    Ok(())
}

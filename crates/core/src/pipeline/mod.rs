pub mod infrastructure;
pub mod pipeline_logger;
pub mod process_video_use_case;
pub mod report_writer;
pub mod tracking_engine;
pub mod video_report;

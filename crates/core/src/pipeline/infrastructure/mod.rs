pub mod json_report_writer;

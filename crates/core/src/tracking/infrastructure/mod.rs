pub mod histogram_tracker;
pub mod template_tracker;
pub mod tracker_factory;
mod window_search;

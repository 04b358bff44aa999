pub mod association_engine;
pub mod blob;
pub mod duplicate_resolver;
pub mod object_tracker;
pub mod spatial_aggregator;
pub mod tracker_adapter;

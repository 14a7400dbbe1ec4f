pub mod config;
pub mod error;
pub mod graph;
pub mod import;
pub mod record;
pub mod scoring;
pub mod season;
pub mod store;
pub mod transform;

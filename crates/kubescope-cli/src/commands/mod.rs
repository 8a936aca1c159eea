//! CLI command implementations

pub mod completions;
pub mod config;
pub mod context;
pub mod graph;
pub mod serve;

//! High-level services composing the pipeline components.

pub mod export;
pub mod pipeline;

pub use pipeline::{FailedUrl, Pipeline, RunOptions, RunSummary};

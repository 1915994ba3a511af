pub mod assist;
pub mod categorizer;
pub mod classifier;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod joiner;
pub mod llm;
pub mod notify;
pub mod pipeline;
pub mod records;
pub mod status;
pub mod writer;

pub use config::ReconConfig;
pub use error::{ReconError, Result};
pub use pipeline::{PipelineSummary, ReconPipeline};

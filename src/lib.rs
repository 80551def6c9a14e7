pub mod audio;
pub mod cache;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod transcribe;

pub use cache::TranscriptionCache;
pub use config::{Config, SegmentationConfig};
pub use error::{ChunkscribeError, Result};
pub use pipeline::{
    print_summary, run_pipeline, run_pipeline_with_cancel, PipelineOptions, PipelineOutcome,
};
pub use report::{ChunkMeta, PipelineReport};

pub mod whisper;

pub use whisper::{WhisperClient, WhisperModel};

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Recognition backend contract: turn one segment artifact into text.
///
/// Implementations may perform network I/O and may fail per call; the
/// orchestrator isolates failures per chunk.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, segment_path: &Path) -> Result<String>;
    fn name(&self) -> &'static str;
}

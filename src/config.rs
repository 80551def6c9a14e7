use crate::audio::boundary::BoundaryConfig;
use crate::error::{ChunkscribeError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Segmentation parameters recognized on the configuration surface.
/// Defaults match the long-form recognition profile: 5 minute minimum,
/// 10 minute maximum, 2 minute overrun cap.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SegmentationConfig {
    pub min_chunk_duration_ms: u64,
    pub max_chunk_duration_ms: u64,
    pub max_wait_for_silence_ms: u64,
    pub vad_aggressiveness: u8,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            min_chunk_duration_ms: 300_000,
            max_chunk_duration_ms: 600_000,
            max_wait_for_silence_ms: 120_000,
            vad_aggressiveness: 2,
        }
    }
}

impl SegmentationConfig {
    pub fn boundary_config(&self) -> BoundaryConfig {
        BoundaryConfig {
            min_chunk_duration_ms: self.min_chunk_duration_ms,
            max_chunk_duration_ms: self.max_chunk_duration_ms,
            max_wait_for_silence_ms: self.max_wait_for_silence_ms,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_chunk_duration_ms == 0 {
            return Err(ChunkscribeError::Config(
                "min_chunk_duration_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_chunk_duration_ms < self.min_chunk_duration_ms {
            return Err(ChunkscribeError::Config(
                "max_chunk_duration_ms must be at least min_chunk_duration_ms".to_string(),
            ));
        }
        if self.vad_aggressiveness > 3 {
            return Err(ChunkscribeError::Config(
                "vad_aggressiveness must be between 0 and 3".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub segmentation: SegmentationConfig,
    pub use_cache: bool,
    pub concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            segmentation: SegmentationConfig::default(),
            use_cache: true,
            concurrency: 4,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // Load from config file if it exists
        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                if let Ok(file_config) = toml::from_str::<Config>(&contents) {
                    config = file_config;
                }
            }
        }

        // Override with environment variables
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.openai_api_key = Some(key);
        }
        if let Ok(concurrency) = std::env::var("CHUNKSCRIBE_CONCURRENCY") {
            if let Ok(c) = concurrency.parse() {
                config.concurrency = c;
            }
        }
        if let Ok(use_cache) = std::env::var("CHUNKSCRIBE_USE_CACHE") {
            if let Ok(v) = use_cache.parse() {
                config.use_cache = v;
            }
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.openai_api_key.is_none() {
            return Err(ChunkscribeError::Config(
                "OPENAI_API_KEY not set. Export it with: export OPENAI_API_KEY=sk-..."
                    .to_string(),
            ));
        }

        if self.concurrency == 0 {
            return Err(ChunkscribeError::Config(
                "Concurrency must be greater than 0".to_string(),
            ));
        }

        self.segmentation.validate()
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("chunkscribe").join("config.toml"))
    }
}

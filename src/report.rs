use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Externally visible record for one chunk. Created from a boundary, filled
/// incrementally by materialization, transcoding and transcription, then
/// never mutated again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMeta {
    pub index: usize,
    pub wav_path: PathBuf,
    pub mp3_path: Option<PathBuf>,
    pub start_time_ms: u64,
    pub end_time_ms: u64,
    pub duration_ms: u64,
    pub wav_size: Option<u64>,
    pub mp3_size: Option<u64>,
    pub cached: bool,
    pub transcript: Option<String>,
    pub error: Option<String>,
}

/// Structured summary of one pipeline run, persisted as JSON next to the
/// cache entries after all chunks have been processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub chunks: Vec<ChunkMeta>,
    pub total_chunks: usize,
    pub total_wav_bytes: u64,
    pub total_mp3_bytes: u64,
    pub compression_ratio: f64,
    pub total_transcript_chars: usize,
}

impl PipelineReport {
    /// Derive the aggregate totals from a complete, index-ordered chunk list.
    pub fn from_chunks(chunks: Vec<ChunkMeta>) -> Self {
        let total_chunks = chunks.len();
        let total_wav_bytes: u64 = chunks.iter().filter_map(|c| c.wav_size).sum();
        let total_mp3_bytes: u64 = chunks.iter().filter_map(|c| c.mp3_size).sum();
        let compression_ratio = if total_mp3_bytes > 0 {
            total_wav_bytes as f64 / total_mp3_bytes as f64
        } else {
            0.0
        };
        let total_transcript_chars = chunks
            .iter()
            .filter_map(|c| c.transcript.as_ref())
            .map(|t| t.chars().count())
            .sum();

        Self {
            chunks,
            total_chunks,
            total_wav_bytes,
            total_mp3_bytes,
            compression_ratio,
            total_transcript_chars,
        }
    }

    /// Indices of chunks that failed transcoding or recognition.
    pub fn failed_chunks(&self) -> Vec<usize> {
        self.chunks
            .iter()
            .filter(|c| c.error.is_some())
            .map(|c| c.index)
            .collect()
    }

    /// Write the report as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn meta(index: usize, wav: u64, mp3: u64, transcript: &str) -> ChunkMeta {
        ChunkMeta {
            index,
            wav_path: PathBuf::from(format!("/tmp/chunk_{index:04}.wav")),
            mp3_path: Some(PathBuf::from(format!("/tmp/chunk_{index:04}.mp3"))),
            start_time_ms: index as u64 * 1000,
            end_time_ms: (index as u64 + 1) * 1000,
            duration_ms: 1000,
            wav_size: Some(wav),
            mp3_size: Some(mp3),
            cached: false,
            transcript: Some(transcript.to_string()),
            error: None,
        }
    }

    #[test]
    fn test_aggregates() {
        let report = PipelineReport::from_chunks(vec![
            meta(0, 1000, 100, "hello"),
            meta(1, 3000, 300, "world!"),
        ]);

        assert_eq!(report.total_chunks, 2);
        assert_eq!(report.total_wav_bytes, 4000);
        assert_eq!(report.total_mp3_bytes, 400);
        assert!((report.compression_ratio - 10.0).abs() < f64::EPSILON);
        assert_eq!(report.total_transcript_chars, 11);
    }

    #[test]
    fn test_empty_report() {
        let report = PipelineReport::from_chunks(Vec::new());
        assert_eq!(report.total_chunks, 0);
        assert_eq!(report.compression_ratio, 0.0);
    }

    #[test]
    fn test_failed_chunks_listed() {
        let mut failing = meta(1, 1000, 100, "");
        failing.transcript = None;
        failing.error = Some("backend timeout".to_string());

        let report = PipelineReport::from_chunks(vec![meta(0, 1000, 100, "ok"), failing]);
        assert_eq!(report.failed_chunks(), vec![1]);
    }

    #[test]
    fn test_write_json_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");

        let report = PipelineReport::from_chunks(vec![meta(0, 1000, 100, "hello")]);
        report.write_json(&path).unwrap();

        let loaded: PipelineReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.total_chunks, 1);
        assert_eq!(loaded.chunks[0].transcript.as_deref(), Some("hello"));
    }
}

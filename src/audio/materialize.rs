use std::path::{Path, PathBuf};
use std::process::Command;

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::debug;

use crate::error::{ChunkscribeError, Result};

use super::{Frame, BITS_PER_SAMPLE, CHANNELS, SAMPLE_RATE};

/// Bitrate of the transport-format artifact fed to the recognition backend.
pub const TRANSPORT_BITRATE: &str = "128k";

/// Write a boundary-delimited frame run to a canonical-format WAV artifact.
/// Returns the artifact path and its size in bytes.
pub fn write_segment_wav(frames: &[Frame], output_dir: &Path, index: usize) -> Result<(PathBuf, u64)> {
    let path = output_dir.join(format!("chunk_{index:04}.wav"));

    let spec = WavSpec {
        channels: CHANNELS,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(&path, spec)?;
    for frame in frames {
        for &sample in &frame.samples {
            writer.write_sample(sample)?;
        }
    }
    writer.finalize()?;

    let size = std::fs::metadata(&path)?.len();
    debug!("Wrote segment {}: {} ({} bytes)", index, path.display(), size);
    Ok((path, size))
}

/// Re-encode a canonical segment into the transport format for the
/// recognition backend. Returns the artifact path and its size in bytes.
pub fn transcode_segment(wav_path: &Path, index: usize) -> Result<(PathBuf, u64)> {
    let mp3_path = wav_path.with_extension("mp3");

    let output = Command::new("ffmpeg")
        .args(["-y", "-i"])
        .arg(wav_path)
        .args(["-ar", "16000", "-ac", "1", "-b:a", TRANSPORT_BITRATE])
        .arg(&mp3_path)
        .output()
        .map_err(|e| ChunkscribeError::Transcode(format!("Failed to run FFmpeg: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ChunkscribeError::Transcode(format!(
            "FFmpeg transcode of chunk {index} failed: {}",
            stderr.trim()
        )));
    }

    if !mp3_path.exists() {
        return Err(ChunkscribeError::Transcode(format!(
            "Transport artifact for chunk {index} was not created"
        )));
    }

    let size = std::fs::metadata(&mp3_path)?.len();
    debug!(
        "Transcoded segment {}: {} ({} bytes)",
        index,
        mp3_path.display(),
        size
    );
    Ok((mp3_path, size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{read_frames, SAMPLES_PER_FRAME};
    use tempfile::TempDir;

    fn frames(n: usize) -> Vec<Frame> {
        (0..n)
            .map(|i| Frame::new(vec![(i as i16) * 10; SAMPLES_PER_FRAME]))
            .collect()
    }

    #[test]
    fn test_write_segment_wav_round_trips() {
        let dir = TempDir::new().unwrap();
        let input = frames(4);

        let (path, size) = write_segment_wav(&input, dir.path(), 0).unwrap();
        assert!(path.ends_with("chunk_0000.wav"));
        // 44-byte header plus 4 frames of PCM
        assert_eq!(size, 44 + 4 * 960);

        let read_back = read_frames(&path).unwrap();
        assert_eq!(read_back.len(), 4);
        assert_eq!(read_back[2].samples, input[2].samples);
    }

    #[test]
    fn test_write_segment_names_by_index() {
        let dir = TempDir::new().unwrap();
        let (path, _) = write_segment_wav(&frames(1), dir.path(), 17).unwrap();
        assert!(path.ends_with("chunk_0017.wav"));
    }

    #[test]
    fn test_transcode_missing_input_fails() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("chunk_0000.wav");
        let result = transcode_segment(&missing, 0);
        assert!(result.is_err());
    }
}

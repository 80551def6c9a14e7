use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use hound::{SampleFormat, WavReader};
use tracing::{debug, info};

use crate::error::{ChunkscribeError, Result};

use super::{Frame, BITS_PER_SAMPLE, CHANNELS, SAMPLES_PER_FRAME, SAMPLE_RATE};

/// Check if FFmpeg is installed and accessible.
pub fn check_ffmpeg() -> Result<()> {
    let output = Command::new("ffmpeg").arg("-version").output().map_err(|e| {
        ChunkscribeError::AudioFormat(format!(
            "FFmpeg not found. Please install FFmpeg and ensure it's in your PATH. Error: {e}"
        ))
    })?;

    if !output.status.success() {
        return Err(ChunkscribeError::AudioFormat(
            "FFmpeg check failed".to_string(),
        ));
    }

    debug!("FFmpeg is available");
    Ok(())
}

/// Check if FFprobe is installed and accessible.
pub fn check_ffprobe() -> Result<()> {
    let output = Command::new("ffprobe")
        .arg("-version")
        .output()
        .map_err(|e| {
            ChunkscribeError::AudioFormat(format!(
                "FFprobe not found. Please install FFmpeg (includes FFprobe). Error: {e}"
            ))
        })?;

    if !output.status.success() {
        return Err(ChunkscribeError::AudioFormat(
            "FFprobe check failed".to_string(),
        ));
    }

    debug!("FFprobe is available");
    Ok(())
}

/// Get audio duration using FFprobe.
pub fn get_audio_duration(input: &Path) -> Result<Duration> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(input)
        .output()
        .map_err(|e| ChunkscribeError::AudioFormat(format!("Failed to run FFprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ChunkscribeError::AudioFormat(format!(
            "FFprobe failed: {stderr}"
        )));
    }

    let duration_str = String::from_utf8_lossy(&output.stdout);
    let duration_secs: f64 = duration_str.trim().parse().map_err(|e| {
        ChunkscribeError::AudioFormat(format!(
            "Failed to parse duration '{}': {e}",
            duration_str.trim()
        ))
    })?;

    Ok(Duration::from_secs_f64(duration_secs))
}

/// Check whether a WAV file already matches the canonical profile
/// (mono, 16 kHz, 16-bit integer PCM).
pub fn is_canonical_wav(input: &Path) -> bool {
    match WavReader::open(input) {
        Ok(reader) => {
            let spec = reader.spec();
            spec.sample_rate == SAMPLE_RATE
                && spec.channels == CHANNELS
                && spec.bits_per_sample == BITS_PER_SAMPLE
                && spec.sample_format == SampleFormat::Int
        }
        Err(_) => false,
    }
}

/// Normalize an input audio file to the canonical profile.
///
/// A canonical WAV is used as-is; anything else is converted with FFmpeg
/// into `work_dir`. Conversion failure is fatal for the run.
pub fn ensure_canonical_wav(input: &Path, work_dir: &Path) -> Result<PathBuf> {
    if !input.exists() {
        return Err(ChunkscribeError::FileNotFound(input.display().to_string()));
    }

    if is_canonical_wav(input) {
        debug!("Input is already canonical: {}", input.display());
        return Ok(input.to_path_buf());
    }

    check_ffmpeg()?;

    let converted = work_dir.join("canonical.wav");
    info!(
        "Converting {} to canonical PCM ({} Hz, mono, {}-bit)",
        input.display(),
        SAMPLE_RATE,
        BITS_PER_SAMPLE
    );

    let status = Command::new("ffmpeg")
        .args(["-y", "-i"])
        .arg(input)
        .args(["-vn", "-acodec", "pcm_s16le", "-ar", "16000", "-ac", "1"])
        .arg(&converted)
        .status()
        .map_err(|e| ChunkscribeError::AudioFormat(format!("Failed to run FFmpeg: {e}")))?;

    if !status.success() {
        return Err(ChunkscribeError::AudioFormat(
            "FFmpeg conversion to canonical format failed".to_string(),
        ));
    }

    if !converted.exists() {
        return Err(ChunkscribeError::AudioFormat(
            "Converted file was not created".to_string(),
        ));
    }

    Ok(converted)
}

/// Read a canonical WAV as an ordered sequence of fixed-duration frames.
/// A trailing partial frame is dropped.
pub fn read_frames(input: &Path) -> Result<Vec<Frame>> {
    let mut reader = WavReader::open(input)?;
    let spec = reader.spec();

    if spec.sample_rate != SAMPLE_RATE
        || spec.channels != CHANNELS
        || spec.bits_per_sample != BITS_PER_SAMPLE
        || spec.sample_format != SampleFormat::Int
    {
        return Err(ChunkscribeError::AudioFormat(format!(
            "Not canonical audio: {} Hz, {} channels, {} bits",
            spec.sample_rate, spec.channels, spec.bits_per_sample
        )));
    }

    let mut frames = Vec::new();
    let mut buffer = Vec::with_capacity(SAMPLES_PER_FRAME);

    for sample in reader.samples::<i16>() {
        buffer.push(sample?);
        if buffer.len() == SAMPLES_PER_FRAME {
            frames.push(Frame::new(std::mem::replace(
                &mut buffer,
                Vec::with_capacity(SAMPLES_PER_FRAME),
            )));
        }
    }

    debug!(
        "Read {} frames ({} trailing samples dropped)",
        frames.len(),
        buffer.len()
    );

    Ok(frames)
}

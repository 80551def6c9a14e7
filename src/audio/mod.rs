pub mod boundary;
pub mod materialize;
pub mod reader;
pub mod vad;

pub use boundary::{
    segment_frames, BoundaryConfig, BoundaryEngine, BoundedChunk, ChunkBoundary, CutReason,
};
pub use materialize::{transcode_segment, write_segment_wav, TRANSPORT_BITRATE};
pub use reader::{
    check_ffmpeg, check_ffprobe, ensure_canonical_wav, get_audio_duration, is_canonical_wav,
    read_frames,
};
pub use vad::{EnergyVad, VoiceActivity};

/// Canonical PCM profile all audio is normalized to before segmentation.
pub const SAMPLE_RATE: u32 = 16_000;
pub const CHANNELS: u16 = 1;
pub const BITS_PER_SAMPLE: u16 = 16;

/// Fixed frame duration. Every boundary falls on a frame edge.
pub const FRAME_DURATION_MS: u64 = 30;

/// Samples per 30 ms frame at 16 kHz mono.
pub const SAMPLES_PER_FRAME: usize = (SAMPLE_RATE as usize / 1000) * FRAME_DURATION_MS as usize;

/// Bytes per frame (16-bit samples).
pub const BYTES_PER_FRAME: usize = SAMPLES_PER_FRAME * 2;

/// A 30 ms slice of canonical audio, the atomic unit of classification.
#[derive(Debug, Clone)]
pub struct Frame {
    pub samples: Vec<i16>,
}

impl Frame {
    /// Build a frame from exactly one frame's worth of samples.
    pub fn new(samples: Vec<i16>) -> Self {
        debug_assert_eq!(samples.len(), SAMPLES_PER_FRAME);
        Self { samples }
    }

    /// Raw little-endian PCM bytes, as stored in the canonical WAV data section.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(BYTES_PER_FRAME);
        for s in &self.samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        bytes
    }
}

/// Concatenated raw PCM bytes of a run of frames. This is what the cache
/// fingerprint is computed over.
pub fn frames_to_pcm_bytes(frames: &[Frame]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(frames.len() * BYTES_PER_FRAME);
    for frame in frames {
        bytes.extend_from_slice(&frame.to_le_bytes());
    }
    bytes
}

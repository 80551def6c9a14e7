use tracing::debug;

use super::{Frame, FRAME_DURATION_MS};

/// Why a chunk boundary was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutReason {
    /// Silence arrived after the minimum duration was satisfied.
    NaturalSilence,
    /// The maximum duration had passed and silence eventually arrived.
    ForcedSilence,
    /// The overrun cap expired without any silence.
    ForcedOverrun,
    /// The frame stream ended with frames still buffered.
    EndOfInput,
}

/// A half-open interval over the original timeline. Boundaries are
/// contiguous and gapless: the end of chunk i is the start of chunk i+1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkBoundary {
    pub start_ms: u64,
    pub end_ms: u64,
    pub reason: CutReason,
}

impl ChunkBoundary {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }
}

/// A boundary together with the frames it delimits, ready for materialization.
#[derive(Debug)]
pub struct BoundedChunk {
    pub boundary: ChunkBoundary,
    pub frames: Vec<Frame>,
}

/// Duration constraints for the boundary engine, all in milliseconds.
#[derive(Debug, Clone, Copy)]
pub struct BoundaryConfig {
    /// Lower bound per chunk, except the final chunk.
    pub min_chunk_duration_ms: u64,
    /// Point at which silence-seeking begins.
    pub max_chunk_duration_ms: u64,
    /// Hard cap on overrun past the maximum duration.
    pub max_wait_for_silence_ms: u64,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            min_chunk_duration_ms: 300_000,
            max_chunk_duration_ms: 600_000,
            max_wait_for_silence_ms: 120_000,
        }
    }
}

/// Single-pass state machine that turns a classified frame stream into
/// chunk boundaries honoring min/max duration and silence preference.
///
/// Frames must be fed in time order; the engine is deterministic and does
/// no I/O. Once `max_chunk_duration_ms` is reached without a silence point
/// the engine enters overrun mode and cuts eagerly on the first silence
/// frame, or unconditionally once the overrun cap expires.
#[derive(Debug)]
pub struct BoundaryEngine {
    config: BoundaryConfig,
    current_run: Vec<Frame>,
    current_duration_ms: u64,
    run_start_ms: u64,
    waiting_for_silence: bool,
    overrun_ms: u64,
}

impl BoundaryEngine {
    pub fn new(config: BoundaryConfig) -> Self {
        Self {
            config,
            current_run: Vec::new(),
            current_duration_ms: 0,
            run_start_ms: 0,
            waiting_for_silence: false,
            overrun_ms: 0,
        }
    }

    /// Advance the machine by one classified frame. Returns a completed
    /// chunk when this frame closes a boundary.
    pub fn step(&mut self, frame: Frame, is_speech: bool) -> Option<BoundedChunk> {
        self.current_run.push(frame);
        self.current_duration_ms += FRAME_DURATION_MS;

        if self.waiting_for_silence && is_speech {
            self.overrun_ms += FRAME_DURATION_MS;
        }

        if !is_speech {
            if self.current_duration_ms >= self.config.min_chunk_duration_ms {
                let reason = if self.waiting_for_silence {
                    CutReason::ForcedSilence
                } else {
                    CutReason::NaturalSilence
                };
                return Some(self.emit(reason));
            }
        }

        if self.current_duration_ms >= self.config.max_chunk_duration_ms
            && !self.waiting_for_silence
        {
            debug!(
                at_ms = self.run_start_ms + self.current_duration_ms,
                "max chunk duration reached, waiting for silence"
            );
            self.waiting_for_silence = true;
            self.overrun_ms = 0;
        }

        if self.waiting_for_silence && self.overrun_ms >= self.config.max_wait_for_silence_ms {
            return Some(self.emit(CutReason::ForcedOverrun));
        }

        None
    }

    /// Flush the remaining frames as a final chunk. The final chunk is
    /// exempt from the minimum duration.
    pub fn finish(&mut self) -> Option<BoundedChunk> {
        if self.current_run.is_empty() {
            return None;
        }
        Some(self.emit(CutReason::EndOfInput))
    }

    fn emit(&mut self, reason: CutReason) -> BoundedChunk {
        let end_ms = self.run_start_ms + self.current_duration_ms;
        let boundary = ChunkBoundary {
            start_ms: self.run_start_ms,
            end_ms,
            reason,
        };
        debug!(
            start_ms = boundary.start_ms,
            end_ms = boundary.end_ms,
            frames = self.current_run.len(),
            overrun_ms = self.overrun_ms,
            ?reason,
            "chunk boundary emitted"
        );
        let frames = std::mem::take(&mut self.current_run);
        self.run_start_ms = end_ms;
        self.current_duration_ms = 0;
        self.waiting_for_silence = false;
        self.overrun_ms = 0;
        BoundedChunk { boundary, frames }
    }
}

/// Run the engine over a fully classified frame sequence.
pub fn segment_frames(
    frames: Vec<Frame>,
    speech_flags: &[bool],
    config: BoundaryConfig,
) -> Vec<BoundedChunk> {
    let mut engine = BoundaryEngine::new(config);
    let mut chunks = Vec::new();

    for (frame, &is_speech) in frames.into_iter().zip(speech_flags) {
        if let Some(chunk) = engine.step(frame, is_speech) {
            chunks.push(chunk);
        }
    }
    if let Some(chunk) = engine.finish() {
        chunks.push(chunk);
    }
    chunks
}

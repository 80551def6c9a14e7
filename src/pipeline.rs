use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::audio::{
    check_ffmpeg, check_ffprobe, ensure_canonical_wav, frames_to_pcm_bytes, get_audio_duration,
    read_frames, segment_frames, transcode_segment, write_segment_wav, BoundedChunk, EnergyVad,
    VoiceActivity, FRAME_DURATION_MS,
};
use crate::cache::TranscriptionCache;
use crate::config::SegmentationConfig;
use crate::error::{ChunkscribeError, Result};
use crate::report::{ChunkMeta, PipelineReport};
use crate::transcribe::Transcriber;

/// Run-level options for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub segmentation: SegmentationConfig,
    pub use_cache: bool,
    pub concurrency: usize,
    pub show_progress: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            segmentation: SegmentationConfig::default(),
            use_cache: true,
            concurrency: 4,
            show_progress: true,
        }
    }
}

/// Result of a pipeline run.
#[derive(Debug)]
pub struct PipelineOutcome {
    /// Transcripts concatenated in chunk-index order; failed chunks
    /// contribute an empty string.
    pub transcript: String,
    pub report: PipelineReport,
    pub report_path: PathBuf,
    pub cached_chunks: usize,
    pub processed_chunks: usize,
}

/// Transcribe a long-form recording.
pub async fn run_pipeline(
    input: &Path,
    output_dir: &Path,
    transcriber: Arc<dyn Transcriber>,
    options: PipelineOptions,
) -> Result<PipelineOutcome> {
    run_pipeline_with_cancel(
        input,
        output_dir,
        transcriber,
        options,
        Arc::new(AtomicBool::new(false)),
    )
    .await
}

/// Transcribe a long-form recording with cancellation support.
///
/// Stages:
/// 1. Normalize the input to canonical PCM and read it as 30 ms frames.
/// 2. Classify frames and run the boundary engine (sequential single pass).
/// 3. Per chunk, concurrently: materialize WAV, transcode to the transport
///    format, and resolve the transcript through the cache.
/// 4. Assemble the final transcript and write the report.
///
/// Format and boundary errors abort the run; per-chunk transcode and
/// recognition failures are recorded on that chunk and siblings continue.
pub async fn run_pipeline_with_cancel(
    input: &Path,
    output_dir: &Path,
    transcriber: Arc<dyn Transcriber>,
    options: PipelineOptions,
    cancelled: Arc<AtomicBool>,
) -> Result<PipelineOutcome> {
    let start_time = Instant::now();

    if !input.exists() {
        return Err(ChunkscribeError::FileNotFound(input.display().to_string()));
    }

    std::fs::create_dir_all(output_dir)?;
    let chunk_dir = output_dir.join("chunks");
    std::fs::create_dir_all(&chunk_dir)?;

    let input_stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    let cache_dir = output_dir.join(".cache").join(&input_stem);
    let cache = Arc::new(TranscriptionCache::new(cache_dir, options.use_cache));

    // Conversion scratch space, removed on drop
    let work_dir = TempDir::new()?;

    // FFmpeg is needed even for canonical input (transport transcoding)
    check_ffmpeg()?;

    // ── Stage 1: canonical frames ──────────────────────────────────────
    info!("Stage 1/3: Normalizing {} to canonical PCM", input.display());
    if check_ffprobe().is_ok() {
        if let Ok(duration) = get_audio_duration(input) {
            info!("Input duration: {:.1}s", duration.as_secs_f64());
        }
    }
    let canonical = ensure_canonical_wav(input, work_dir.path())?;
    let frames = read_frames(&canonical)?;
    let total_duration_ms = frames.len() as u64 * FRAME_DURATION_MS;
    info!(
        "Read {} frames ({:.1}s of audio)",
        frames.len(),
        total_duration_ms as f64 / 1000.0
    );

    if cancelled.load(Ordering::Relaxed) {
        return Err(ChunkscribeError::Cancelled);
    }

    // ── Stage 2: classification + boundary detection ───────────────────
    // Single-pass streaming over time-ordered frames; never parallelized.
    info!("Stage 2/3: Detecting chunk boundaries");
    let vad = EnergyVad::new(options.segmentation.vad_aggressiveness);
    let speech_flags: Vec<bool> = frames.iter().map(|f| vad.is_speech(f)).collect();
    let chunks = segment_frames(frames, &speech_flags, options.segmentation.boundary_config());
    info!("Detected {} chunk boundaries", chunks.len());

    if cancelled.load(Ordering::Relaxed) {
        return Err(ChunkscribeError::Cancelled);
    }

    // ── Stage 3: per-chunk materialize/transcode/transcribe ────────────
    info!(
        "Stage 3/3: Processing {} chunks with {} ({} concurrent)",
        chunks.len(),
        transcriber.name(),
        options.concurrency
    );

    let progress_bar = if options.show_progress && !chunks.is_empty() {
        let pb = ProgressBar::new(chunks.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let metas = run_chunk_tasks(
        chunks,
        options.concurrency,
        progress_bar.as_ref(),
        |index, chunk| {
            let transcriber = transcriber.clone();
            let cache = cache.clone();
            let chunk_dir = chunk_dir.clone();
            let cancelled = cancelled.clone();
            async move {
                process_chunk(index, chunk, &chunk_dir, &cache, &*transcriber, &cancelled).await
            }
        },
    )
    .await;

    if let Some(pb) = progress_bar {
        pb.finish_with_message("Chunk processing complete");
    }

    if cancelled.load(Ordering::Relaxed) {
        return Err(ChunkscribeError::Cancelled);
    }

    let transcript = metas
        .iter()
        .map(|m| m.transcript.clone().unwrap_or_default())
        .collect::<Vec<_>>()
        .join("\n");

    let cached_chunks = metas.iter().filter(|m| m.cached).count();
    let processed_chunks = metas
        .iter()
        .filter(|m| !m.cached && m.error.is_none())
        .count();

    let report = PipelineReport::from_chunks(metas);
    let report_path = if cache.is_enabled() {
        cache.dir().join("report.json")
    } else {
        output_dir.join("report.json")
    };
    report.write_json(&report_path)?;

    let failed = report.failed_chunks();
    if !failed.is_empty() {
        warn!("{} chunk(s) failed: {:?}", failed.len(), failed);
    }

    info!(
        "Pipeline complete: {} chunks ({} cached, {} transcribed, {} failed) in {:.2}s",
        report.total_chunks,
        cached_chunks,
        processed_chunks,
        failed.len(),
        start_time.elapsed().as_secs_f64()
    );
    info!(
        "Total transcript length: {} characters",
        report.total_transcript_chars
    );

    Ok(PipelineOutcome {
        transcript,
        report,
        report_path,
        cached_chunks,
        processed_chunks,
    })
}

/// Fan chunks out to `worker` with at most `concurrency` tasks in flight.
/// Tasks complete out of order; the returned metadata is index-ordered.
/// A worker failure is already recorded on its metadata, so one chunk
/// failing never stops the others.
async fn run_chunk_tasks<W, Fut>(
    chunks: Vec<BoundedChunk>,
    concurrency: usize,
    progress_bar: Option<&ProgressBar>,
    worker: W,
) -> Vec<ChunkMeta>
where
    W: Fn(usize, BoundedChunk) -> Fut,
    Fut: Future<Output = ChunkMeta>,
{
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut futures = FuturesUnordered::new();

    for (index, chunk) in chunks.into_iter().enumerate() {
        let sem = semaphore.clone();
        let worker = &worker;

        futures.push(async move {
            let _permit = sem.acquire().await.expect("Semaphore closed");
            let meta = worker(index, chunk).await;
            if let Some(pb) = progress_bar {
                pb.inc(1);
            }
            meta
        });
    }

    let mut metas: Vec<ChunkMeta> = Vec::with_capacity(futures.len());
    while let Some(meta) = futures.next().await {
        metas.push(meta);
    }

    metas.sort_by_key(|m| m.index);
    metas
}

/// Materialize, transcode and transcribe one chunk. Failures are recorded
/// on the returned metadata rather than propagated, so sibling chunks are
/// unaffected.
async fn process_chunk(
    index: usize,
    chunk: BoundedChunk,
    chunk_dir: &Path,
    cache: &TranscriptionCache,
    transcriber: &dyn Transcriber,
    cancelled: &AtomicBool,
) -> ChunkMeta {
    let boundary = chunk.boundary;
    let mut meta = ChunkMeta {
        index,
        wav_path: chunk_dir.join(format!("chunk_{index:04}.wav")),
        mp3_path: None,
        start_time_ms: boundary.start_ms,
        end_time_ms: boundary.end_ms,
        duration_ms: boundary.duration_ms(),
        wav_size: None,
        mp3_size: None,
        cached: false,
        transcript: None,
        error: None,
    };

    if cancelled.load(Ordering::Relaxed) {
        meta.error = Some("cancelled".to_string());
        return meta;
    }

    let segment_bytes = frames_to_pcm_bytes(&chunk.frames);

    let wav_path = match write_segment_wav(&chunk.frames, chunk_dir, index) {
        Ok((path, size)) => {
            meta.wav_path = path.clone();
            meta.wav_size = Some(size);
            path
        }
        Err(e) => {
            warn!("Chunk {index} materialization failed: {e}");
            meta.error = Some(e.to_string());
            return meta;
        }
    };

    let mp3_path = match transcode_segment(&wav_path, index) {
        Ok((path, size)) => {
            meta.mp3_path = Some(path.clone());
            meta.mp3_size = Some(size);
            path
        }
        Err(e) => {
            warn!("Chunk {index} transcoding failed: {e}");
            meta.error = Some(e.to_string());
            return meta;
        }
    };

    debug!(
        "Chunk {index}: {}ms-{}ms, wav {} bytes, mp3 {} bytes",
        boundary.start_ms,
        boundary.end_ms,
        meta.wav_size.unwrap_or(0),
        meta.mp3_size.unwrap_or(0)
    );

    match cache
        .lookup_or_compute(&segment_bytes, || async {
            transcriber.transcribe(&mp3_path).await
        })
        .await
    {
        Ok((text, was_cached)) => {
            meta.cached = was_cached;
            meta.transcript = Some(text);
        }
        Err(e) => {
            warn!("Chunk {index} transcription failed: {e}");
            meta.error = Some(e.to_string());
        }
    }

    meta
}

/// Print a human-readable summary of a pipeline run.
pub fn print_summary(outcome: &PipelineOutcome) {
    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("                      Transcription Complete                    ");
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    println!("  Report:       {}", outcome.report_path.display());
    println!("  Chunks:       {}", outcome.report.total_chunks);
    println!("  Cached:       {}", outcome.cached_chunks);
    println!("  Transcribed:  {}", outcome.processed_chunks);
    println!(
        "  Audio bytes:  {} wav / {} mp3 ({:.1}x compression)",
        outcome.report.total_wav_bytes,
        outcome.report.total_mp3_bytes,
        outcome.report.compression_ratio
    );
    println!(
        "  Transcript:   {} characters",
        outcome.report.total_transcript_chars
    );
    let failed = outcome.report.failed_chunks();
    if !failed.is_empty() {
        println!("  Failed:       {:?}", failed);
    }
    println!();
    println!("═══════════════════════════════════════════════════════════════");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{ChunkBoundary, CutReason};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Mock transcriber for testing.
    struct MockTranscriber {
        call_count: AtomicUsize,
        fail_on_index: Option<usize>,
    }

    impl MockTranscriber {
        fn new() -> Self {
            Self {
                call_count: AtomicUsize::new(0),
                fail_on_index: None,
            }
        }

        fn failing_on(index: usize) -> Self {
            Self {
                call_count: AtomicUsize::new(0),
                fail_on_index: Some(index),
            }
        }
    }

    #[async_trait]
    impl Transcriber for MockTranscriber {
        async fn transcribe(&self, segment_path: &Path) -> crate::error::Result<String> {
            self.call_count.fetch_add(1, Ordering::SeqCst);

            // Simulate some processing time
            tokio::time::sleep(Duration::from_millis(10)).await;

            let name = segment_path.to_string_lossy();
            if let Some(failing) = self.fail_on_index {
                if name.contains(&format!("chunk_{failing:04}")) {
                    return Err(ChunkscribeError::Transcription("Mock error".to_string()));
                }
            }

            Ok(format!("Transcript for {name}"))
        }

        fn name(&self) -> &'static str {
            "Mock"
        }
    }

    fn create_test_chunks(count: usize) -> Vec<BoundedChunk> {
        (0..count)
            .map(|i| BoundedChunk {
                boundary: ChunkBoundary {
                    start_ms: i as u64 * 10_000,
                    end_ms: (i as u64 + 1) * 10_000,
                    reason: CutReason::NaturalSilence,
                },
                frames: Vec::new(),
            })
            .collect()
    }

    /// Chunk worker mirroring the recognition step without touching FFmpeg:
    /// a backend failure is recorded on the metadata, not propagated.
    async fn mock_worker(
        index: usize,
        chunk: BoundedChunk,
        transcriber: &MockTranscriber,
    ) -> ChunkMeta {
        let boundary = chunk.boundary;
        let path = PathBuf::from(format!("chunk_{index:04}.mp3"));
        let mut meta = ChunkMeta {
            index,
            wav_path: PathBuf::from(format!("chunk_{index:04}.wav")),
            mp3_path: Some(path.clone()),
            start_time_ms: boundary.start_ms,
            end_time_ms: boundary.end_ms,
            duration_ms: boundary.duration_ms(),
            wav_size: None,
            mp3_size: None,
            cached: false,
            transcript: None,
            error: None,
        };

        match transcriber.transcribe(&path).await {
            Ok(text) => meta.transcript = Some(text),
            Err(e) => meta.error = Some(e.to_string()),
        }
        meta
    }

    #[test]
    fn test_pipeline_options_default() {
        let options = PipelineOptions::default();
        assert!(options.use_cache);
        assert_eq!(options.concurrency, 4);
        assert!(options.show_progress);
    }

    #[tokio::test]
    async fn test_chunk_tasks_empty_input() {
        let transcriber = MockTranscriber::new();
        let metas = run_chunk_tasks(Vec::new(), 4, None, |index, chunk| {
            mock_worker(index, chunk, &transcriber)
        })
        .await;
        assert!(metas.is_empty());
    }

    #[tokio::test]
    async fn test_maintains_chunk_order() {
        let transcriber = MockTranscriber::new();
        let metas = run_chunk_tasks(create_test_chunks(10), 2, None, |index, chunk| {
            mock_worker(index, chunk, &transcriber)
        })
        .await;

        assert_eq!(metas.len(), 10);
        for (i, meta) in metas.iter().enumerate() {
            assert_eq!(meta.index, i);
            assert_eq!(meta.start_time_ms, i as u64 * 10_000);
        }
        assert_eq!(transcriber.call_count.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_handles_partial_failure() {
        let transcriber = MockTranscriber::failing_on(2);
        let metas = run_chunk_tasks(create_test_chunks(5), 4, None, |index, chunk| {
            mock_worker(index, chunk, &transcriber)
        })
        .await;

        // Siblings complete; only the failing chunk carries an error
        assert_eq!(metas.len(), 5);
        for meta in &metas {
            if meta.index == 2 {
                assert!(meta.transcript.is_none());
                assert!(meta.error.is_some());
            } else {
                assert!(meta.transcript.is_some());
                assert!(meta.error.is_none());
            }
        }

        // The failed chunk contributes an empty transcript slot
        let transcript = metas
            .iter()
            .map(|m| m.transcript.clone().unwrap_or_default())
            .collect::<Vec<_>>()
            .join("\n");
        let lines: Vec<&str> = transcript.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[2].is_empty());
        assert!(!lines[1].is_empty());

        let report = PipelineReport::from_chunks(metas);
        assert_eq!(report.failed_chunks(), vec![2]);
    }

    #[tokio::test]
    async fn test_concurrency_of_one_still_completes_all() {
        let transcriber = MockTranscriber::new();
        let metas = run_chunk_tasks(create_test_chunks(5), 1, None, |index, chunk| {
            mock_worker(index, chunk, &transcriber)
        })
        .await;

        assert_eq!(metas.len(), 5);
        assert!(metas.iter().all(|m| m.error.is_none()));
    }
}

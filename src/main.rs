use anyhow::{Context, Result};
use chunkscribe::config::Config;
use chunkscribe::pipeline::{print_summary, run_pipeline_with_cancel, PipelineOptions};
use chunkscribe::transcribe::WhisperClient;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "chunkscribe")]
#[command(version, about = "Transcribe long-form audio with VAD-aware chunking")]
#[command(
    long_about = "Segment an arbitrarily long recording into speech-aligned chunks, \
transcribe each chunk through a content-addressed cache, and emit the combined \
transcript plus a JSON report."
)]
struct Cli {
    /// Input audio file (any format FFmpeg can decode)
    input: PathBuf,

    /// Output directory for chunk artifacts, cache and report
    #[arg(short, long, default_value = "chunkscribe-out")]
    output_dir: PathBuf,

    /// Minimum chunk duration in milliseconds
    #[arg(long, default_value = "300000")]
    min_chunk_duration: u64,

    /// Maximum chunk duration in milliseconds before silence-seeking begins
    #[arg(long, default_value = "600000")]
    max_chunk_duration: u64,

    /// Hard cap on overrun past the maximum duration, in milliseconds
    #[arg(long, default_value = "120000")]
    max_wait_for_silence: u64,

    /// Voice activity detection aggressiveness (0-3)
    #[arg(long, default_value = "2")]
    vad_aggressiveness: u8,

    /// Disable the transcription cache
    #[arg(long)]
    no_cache: bool,

    /// Number of concurrent chunk tasks
    #[arg(short, long, default_value = "4")]
    concurrency: usize,

    /// Source language code (e.g., en, ja, es)
    #[arg(short, long)]
    language: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    if !cli.input.exists() {
        anyhow::bail!("Input file not found: {}", cli.input.display());
    }

    let mut config = Config::load().context("Failed to load configuration")?;
    config.segmentation.min_chunk_duration_ms = cli.min_chunk_duration;
    config.segmentation.max_chunk_duration_ms = cli.max_chunk_duration;
    config.segmentation.max_wait_for_silence_ms = cli.max_wait_for_silence;
    config.segmentation.vad_aggressiveness = cli.vad_aggressiveness;
    if cli.no_cache {
        config.use_cache = false;
    }
    config.concurrency = cli.concurrency;
    config.validate().context("Configuration validation failed")?;

    let api_key = config
        .openai_api_key
        .clone()
        .context("OPENAI_API_KEY not set")?;

    let mut transcriber = WhisperClient::new(api_key);
    if let Some(ref lang) = cli.language {
        transcriber = transcriber.with_language(lang.clone());
    }

    info!("Input:       {}", cli.input.display());
    info!("Output dir:  {}", cli.output_dir.display());
    info!(
        "Chunking:    min {}ms, max {}ms, wait {}ms, vad {}",
        config.segmentation.min_chunk_duration_ms,
        config.segmentation.max_chunk_duration_ms,
        config.segmentation.max_wait_for_silence_ms,
        config.segmentation.vad_aggressiveness
    );
    info!("Cache:       {}", if config.use_cache { "on" } else { "off" });

    let cancelled = Arc::new(AtomicBool::new(false));
    {
        let cancelled = cancelled.clone();
        ctrlc::set_handler(move || {
            eprintln!("\nCancellation requested, finishing up...");
            cancelled.store(true, Ordering::Relaxed);
        })
        .context("Failed to install Ctrl+C handler")?;
    }

    let options = PipelineOptions {
        segmentation: config.segmentation,
        use_cache: config.use_cache,
        concurrency: config.concurrency,
        show_progress: true,
    };

    let outcome = run_pipeline_with_cancel(
        &cli.input,
        &cli.output_dir,
        Arc::new(transcriber),
        options,
        cancelled,
    )
    .await
    .context("Pipeline failed")?;

    let transcript_path = cli.output_dir.join(format!(
        "{}.txt",
        cli.input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "transcript".to_string())
    ));
    std::fs::write(&transcript_path, &outcome.transcript)
        .with_context(|| format!("Failed to write transcript to {}", transcript_path.display()))?;
    info!("Transcript written to {}", transcript_path.display());

    print_summary(&outcome);

    Ok(())
}

mod audio;
mod cli;
mod config;
mod cues;
mod detect;
mod session;
mod styles;
mod timeline;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use audio::source::{AudioFeatureSource, FileSource};
use cli::Cli;
use config::Config;
use cues::CueSheet;
use session::VisualSession;
use styles::{StyleMap, StylePicker};
use timeline::client::AnalyzerClient;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    let mut cfg = Config::default();
    if let Some(path) = config::discover_config(cli.config.as_deref()) {
        match config::load_config(&path) {
            Ok(loaded) => {
                log::info!("Loaded config from {}", path.display());
                cfg = loaded;
            }
            Err(err) => log::warn!("{:#}; using defaults", err),
        }
    }

    // Merge: config values apply only when CLI is at its default
    if cli.fps == 60 { cli.fps = cfg.capture.fps; }
    if cli.fft_size == 2048 { cli.fft_size = cfg.capture.fft_size; }
    if cli.analyzer_url.is_none() { cli.analyzer_url = cfg.analyzer.url.clone(); }
    cfg.capture.fps = cli.fps;
    cfg.capture.fft_size = cli.fft_size;

    let style_map = StyleMap::with_overrides(&cfg.styles);

    if cli.list_styles {
        println!("Section styles (candidate visual ids):");
        for (label, ids) in style_map.iter() {
            let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
            println!("  {:<10} {}", label.as_str(), ids.join(", "));
        }
        return Ok(());
    }

    if cli.fps == 0 {
        anyhow::bail!("--fps must be at least 1");
    }
    if cli.fft_size < 32 || !cli.fft_size.is_power_of_two() {
        anyhow::bail!("--fft-size must be a power of two >= 32, got {}", cli.fft_size);
    }

    let input = cli.input.as_ref().context("Input audio file is required")?;
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    log::info!("vizcue - music-change detection");
    log::info!("Input: {}", input.display());
    log::info!("Output: {}", cli.output.display());
    log::info!("Analyser: {} fps, FFT {}", cli.fps, cli.fft_size);

    // 1. Decode audio
    log::info!("Decoding audio...");
    let audio_data = audio::decode::decode_audio(input)?;

    // 2. Snapshot pass
    log::info!("Computing frequency snapshots...");
    let source = FileSource::from_audio(&audio_data, &cfg.capture);
    if source.is_empty() {
        log::warn!("{} contains no audio; the cue sheet will be empty", input.display());
    }
    let total_frames = source.len();
    log::info!(
        "Total frames: {}, Duration: {:.1}s",
        total_frames,
        audio_data.duration()
    );

    // 3. Optional precomputed timeline
    let timeline = cli.analyzer_url.as_deref().and_then(|url| {
        let fetched = AnalyzerClient::new(url, Duration::from_secs(cfg.analyzer.timeout_secs))
            .and_then(|client| client.analyze(input));
        match fetched {
            Ok(timeline) if timeline.is_empty() => {
                log::warn!("Analyzer returned an empty timeline; live detection only");
                None
            }
            Ok(timeline) => Some(timeline),
            Err(err) => {
                log::warn!("Analyzer unavailable ({}); live detection only", err);
                None
            }
        }
    });

    // 4. Live session
    let cues = CueSheet::new(Some(input.clone()), cli.fps, source.bin_count());
    let picker = StylePicker::new(style_map, cli.seed);
    let mut session = VisualSession::new(source, cfg.detection.clone(), picker, cues);
    if let Some(timeline) = timeline {
        session = session.with_timeline(timeline);
    }

    let pb = if cli.no_progress {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(total_frames as u64)
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta} remaining)")
            .context("Invalid progress template")?
            .progress_chars("=>-"),
    );

    let processed = session.run(|_| pb.inc(1));
    pb.finish_with_message("Detection complete");

    // 5. Cue sheet
    let cues = session.into_cues();
    cues.write(&cli.output)?;

    let summary = &cues.summary;
    log::info!("Processed {} frames", processed);
    for (reason, count) in &summary.switches {
        log::info!("  {:<16} {} switches", reason, count);
    }
    log::info!("Final BPM estimate: {:.0}", summary.final_bpm);
    for (section, frames) in &summary.sections {
        log::info!(
            "  {:<10} {:.1}s",
            section,
            *frames as f32 / cli.fps as f32
        );
    }

    log::info!("Done! Output: {}", cli.output.display());
    Ok(())
}

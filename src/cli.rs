use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "vizcue", about = "Music-change detection for audio-reactive visuals")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: Option<PathBuf>,

    /// Cue sheet output (JSON)
    #[arg(short, long, default_value = "cues.json")]
    pub output: PathBuf,

    /// Config file (defaults to ./vizcue.toml, then the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Animation frames per second
    #[arg(long, default_value_t = 60)]
    pub fps: u32,

    /// Analyser FFT size; snapshots carry half as many bins
    #[arg(long, default_value_t = 2048)]
    pub fft_size: usize,

    /// Base URL of the offline analysis service (e.g. http://localhost:5000)
    #[arg(long)]
    pub analyzer_url: Option<String>,

    /// Seed for visual selection, for reproducible cue sheets
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print the section style map and exit
    #[arg(long)]
    pub list_styles: bool,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "otw", about = "EDM track analyzer: tempo, key, energy and genre")]
pub struct Cli {
    /// Input audio files (WAV, MP3, FLAC, OGG, AAC); `-` reads from stdin
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Config file path (default: ./otw.toml or ~/.config/otw/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    /// Look up similar reference tracks on YouTube
    #[arg(long)]
    pub similar: bool,

    /// Rank search keywords for each track
    #[arg(long)]
    pub keywords: bool,

    /// Never contact the network; platform features use cached data only
    #[arg(long)]
    pub offline: bool,

    /// Keep platform responses in memory only for this run
    #[arg(long)]
    pub no_cache: bool,

    /// Seconds of audio to analyze per track
    #[arg(long)]
    pub max_duration: Option<f32>,

    /// Analysis sample rate in Hz
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Directory for cached platform responses and key usage
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,
}

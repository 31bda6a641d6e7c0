mod audio;
mod cache;
mod cli;
mod config;
mod keys;
mod report;
mod youtube;

use anyhow::{Context, Result};
use chrono::Datelike;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::io::Read;
use std::path::{Path, PathBuf};

use audio::analysis;
use cache::{FileCache, KeyValueCache, MemoryCache};
use cli::Cli;
use config::Config;
use keys::KeyPool;
use report::TrackReport;
use youtube::client::YoutubeClient;
use youtube::{OfflinePlatform, VideoPlatform};

const API_KEYS_ENV: &str = "YOUTUBE_API_KEYS";
/// Input path that means "read the audio from standard input".
const STDIN_INPUT: &str = "-";

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let mut cfg = match config::find_config(cli.config.as_deref()) {
        Some(path) => match config::load_config(&path) {
            Some(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            None => {
                log::warn!("Failed to load config from {}, using defaults", path.display());
                Config::default()
            }
        },
        None => Config::default(),
    };
    if let Some(secs) = cli.max_duration {
        cfg.analysis.max_duration_secs = secs;
    }
    if let Some(rate) = cli.sample_rate {
        cfg.analysis.sample_rate = rate;
    }
    if cli.cache_dir.is_some() {
        cfg.cache.dir = cli.cache_dir.clone();
    }

    for input in &cli.inputs {
        if !is_stdin(input) && !input.exists() {
            anyhow::bail!("Input file not found: {}", input.display());
        }
    }
    let stdin_bytes = if cli.inputs.iter().any(|p| is_stdin(p)) {
        let mut bytes = Vec::new();
        std::io::stdin()
            .read_to_end(&mut bytes)
            .context("Failed to read audio from stdin")?;
        log::info!("Read {} bytes from stdin", bytes.len());
        Some(bytes)
    } else {
        None
    };

    log::info!("Analyzing {} track(s)", cli.inputs.len());
    let features = analyze_all(&cli.inputs, stdin_bytes.as_deref(), &cfg);
    let mut reports: Vec<TrackReport> = features.into_iter().map(TrackReport::new).collect();

    if cli.similar || cli.keywords {
        let cache_dir = match cfg.cache.dir.clone() {
            Some(dir) => dir,
            None => FileCache::default_dir()?,
        };
        let ttl = chrono::Duration::hours(cfg.cache.ttl_hours);
        let cache: Box<dyn KeyValueCache> = if cli.no_cache {
            Box::new(MemoryCache::new(ttl))
        } else {
            log::debug!("Cache dir: {}", cache_dir.display());
            Box::new(FileCache::new(cache_dir.clone(), ttl))
        };
        let platform = build_platform(&cli, &cfg, cache_dir)?;
        let year = chrono::Local::now().year();

        for report in &mut reports {
            if cli.similar {
                report.similar = Some(youtube::similar::find_similar_tracks(
                    platform.as_ref(),
                    cache.as_ref(),
                    &report.features,
                    &cfg.youtube,
                ));
            }
            if cli.keywords {
                report.keywords = Some(youtube::keywords::analyze_keywords(
                    platform.as_ref(),
                    cache.as_ref(),
                    &report.features,
                    &cfg.youtube,
                    year,
                ));
            }
        }
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            print!("{}", report::render_text(report));
        }
    }
    Ok(())
}

fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == STDIN_INPUT
}

/// Tracks are independent, so they are analyzed in parallel. Output keeps input order.
fn analyze_all(
    inputs: &[PathBuf],
    stdin_bytes: Option<&[u8]>,
    cfg: &Config,
) -> Vec<audio::features::TrackFeatures> {
    let pb = ProgressBar::new(inputs.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tracks ({eta} remaining)")
    {
        pb.set_style(style.progress_chars("=>-"));
    }

    let features = inputs
        .par_iter()
        .map(|path| {
            let f = match stdin_bytes {
                Some(bytes) if is_stdin(path) => {
                    analysis::analyze_bytes_or_fallback("stdin", bytes.to_vec(), &cfg.analysis)
                }
                _ => analysis::analyze_or_fallback(path, &cfg.analysis),
            };
            pb.inc(1);
            f
        })
        .collect();
    pb.finish_and_clear();
    features
}

fn build_platform(
    cli: &Cli,
    cfg: &Config,
    cache_dir: PathBuf,
) -> Result<Box<dyn VideoPlatform>> {
    if cli.offline {
        log::info!("Offline mode: platform data comes from cache only");
        return Ok(Box::new(OfflinePlatform));
    }

    let mut api_keys = cfg.youtube.api_keys.clone();
    if let Ok(env_keys) = std::env::var(API_KEYS_ENV) {
        api_keys.extend(env_keys.split(',').map(str::to_string));
    }
    let pool = if cli.no_cache {
        KeyPool::new(api_keys, chrono::Utc::now())
    } else {
        KeyPool::with_store(
            api_keys,
            cache_dir.join("key_usage.json"),
            chrono::Utc::now(),
        )
    };
    if pool.is_empty() {
        log::warn!(
            "No YouTube API keys configured (set {} or youtube.api_keys)",
            API_KEYS_ENV
        );
    } else {
        log::info!("Using {} YouTube API key(s)", pool.len());
    }

    let client = YoutubeClient::new(&cfg.youtube, pool).context("Failed to build HTTP client")?;
    Ok(Box::new(client))
}

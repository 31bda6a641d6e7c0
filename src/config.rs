use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::audio::features::{Energy, Genre};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub youtube: YoutubeConfig,
}

/// Everything the feature pipeline reads. Immutable once loaded.
#[derive(Clone, Debug, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: f32,
    #[serde(default = "default_n_fft")]
    pub n_fft: usize,
    #[serde(default = "default_hop_length")]
    pub hop_length: usize,
    #[serde(default)]
    pub tempo: TempoConfig,
    #[serde(default)]
    pub key: KeyConfig,
    #[serde(default)]
    pub energy: EnergyConfig,
    #[serde(default)]
    pub genre: GenreConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TempoConfig {
    /// Lag search window, in BPM.
    #[serde(default = "default_min_bpm")]
    pub min_bpm: f32,
    #[serde(default = "default_max_bpm")]
    pub max_bpm: f32,
    #[serde(default = "default_prior_center")]
    pub prior_center_bpm: f32,
    /// Width of the log-normal tempo prior, in octaves.
    #[serde(default = "default_prior_octaves")]
    pub prior_octaves: f32,
    /// Estimates below this are doubled.
    #[serde(default = "default_fold_low")]
    pub fold_low: f32,
    /// Estimates above this are halved.
    #[serde(default = "default_fold_high")]
    pub fold_high: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Correlation {
    Pearson,
    Dot,
}

#[derive(Clone, Debug, Deserialize)]
pub struct KeyConfig {
    #[serde(default = "default_true")]
    pub harmonic_only: bool,
    /// Median filter length across time (frames) for the harmonic estimate.
    #[serde(default = "default_median_kernel")]
    pub harmonic_kernel: usize,
    /// Median filter length across frequency (bins) for the percussive estimate.
    #[serde(default = "default_median_kernel")]
    pub percussive_kernel: usize,
    #[serde(default = "default_chroma_min_hz")]
    pub chroma_min_hz: f32,
    #[serde(default = "default_chroma_max_hz")]
    pub chroma_max_hz: f32,
    #[serde(default = "default_correlation")]
    pub correlation: Correlation,
    #[serde(default = "default_major_profile")]
    pub major_profile: [f32; 12],
    #[serde(default = "default_minor_profile")]
    pub minor_profile: [f32; 12],
}

#[derive(Clone, Debug, Deserialize)]
pub struct EnergyConfig {
    /// Mean RMS that maps to full loudness.
    #[serde(default = "default_loudness_ref")]
    pub loudness_ref: f32,
    /// 95th percentile centroid (Hz) that maps to full brightness.
    #[serde(default = "default_brightness_ref")]
    pub brightness_ref_hz: f32,
    #[serde(default = "default_centroid_percentile")]
    pub centroid_percentile: f32,
    #[serde(default = "default_loudness_weight")]
    pub loudness_weight: f32,
    #[serde(default = "default_brightness_weight")]
    pub brightness_weight: f32,
    #[serde(default = "default_medium_threshold")]
    pub medium_threshold: f32,
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f32,
}

/// One row of the genre decision list. Bounds are inclusive.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct GenreRule {
    pub genre: Genre,
    pub min_bpm: u32,
    pub max_bpm: u32,
    #[serde(default)]
    pub energy: Option<Energy>,
    #[serde(default)]
    pub min_brightness_hz: Option<f32>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GenreConfig {
    #[serde(default = "default_genre_rules")]
    pub rules: Vec<GenreRule>,
    #[serde(default = "default_genre")]
    pub default: Genre,
}

#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    /// Defaults to the platform cache dir when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,
}

#[derive(Debug, Deserialize)]
pub struct YoutubeConfig {
    #[serde(default)]
    pub api_keys: Vec<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_request_delay")]
    pub request_delay_ms: u64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_keyword_results")]
    pub keyword_results: usize,
    /// Genre slug (e.g. "future_house") to allow-listed channel ids.
    #[serde(default)]
    pub channels: HashMap<String, Vec<String>>,
}

impl YoutubeConfig {
    pub fn channels_for(&self, genre: Genre) -> &[String] {
        self.channels
            .get(&genre.slug())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            max_duration_secs: default_max_duration(),
            n_fft: default_n_fft(),
            hop_length: default_hop_length(),
            tempo: TempoConfig::default(),
            key: KeyConfig::default(),
            energy: EnergyConfig::default(),
            genre: GenreConfig::default(),
        }
    }
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            min_bpm: default_min_bpm(),
            max_bpm: default_max_bpm(),
            prior_center_bpm: default_prior_center(),
            prior_octaves: default_prior_octaves(),
            fold_low: default_fold_low(),
            fold_high: default_fold_high(),
        }
    }
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            harmonic_only: true,
            harmonic_kernel: default_median_kernel(),
            percussive_kernel: default_median_kernel(),
            chroma_min_hz: default_chroma_min_hz(),
            chroma_max_hz: default_chroma_max_hz(),
            correlation: default_correlation(),
            major_profile: default_major_profile(),
            minor_profile: default_minor_profile(),
        }
    }
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            loudness_ref: default_loudness_ref(),
            brightness_ref_hz: default_brightness_ref(),
            centroid_percentile: default_centroid_percentile(),
            loudness_weight: default_loudness_weight(),
            brightness_weight: default_brightness_weight(),
            medium_threshold: default_medium_threshold(),
            high_threshold: default_high_threshold(),
        }
    }
}

impl Default for GenreConfig {
    fn default() -> Self {
        Self {
            rules: default_genre_rules(),
            default: default_genre(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            ttl_hours: default_ttl_hours(),
        }
    }
}

impl Default for YoutubeConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            api_base: default_api_base(),
            request_delay_ms: default_request_delay(),
            timeout_secs: default_timeout(),
            max_results: default_max_results(),
            keyword_results: default_keyword_results(),
            channels: HashMap::new(),
        }
    }
}

fn default_sample_rate() -> u32 { 22050 }
fn default_max_duration() -> f32 { 120.0 }
fn default_n_fft() -> usize { 2048 }
fn default_hop_length() -> usize { 256 }
fn default_min_bpm() -> f32 { 60.0 }
fn default_max_bpm() -> f32 { 200.0 }
fn default_prior_center() -> f32 { 120.0 }
fn default_prior_octaves() -> f32 { 1.0 }
fn default_fold_low() -> f32 { 100.0 }
fn default_fold_high() -> f32 { 160.0 }
fn default_true() -> bool { true }
fn default_median_kernel() -> usize { 17 }
fn default_chroma_min_hz() -> f32 { 65.0 }
fn default_chroma_max_hz() -> f32 { 2000.0 }
fn default_correlation() -> Correlation { Correlation::Pearson }
fn default_loudness_ref() -> f32 { 0.2 }
fn default_brightness_ref() -> f32 { 5000.0 }
fn default_centroid_percentile() -> f32 { 95.0 }
fn default_loudness_weight() -> f32 { 0.6 }
fn default_brightness_weight() -> f32 { 0.4 }
fn default_medium_threshold() -> f32 { 0.25 }
fn default_high_threshold() -> f32 { 0.5 }
fn default_genre() -> Genre { Genre::House }
fn default_ttl_hours() -> i64 { 24 }
fn default_api_base() -> String { "https://www.googleapis.com/youtube/v3".into() }
fn default_request_delay() -> u64 { 100 }
fn default_timeout() -> u64 { 30 }
fn default_max_results() -> usize { 5 }
fn default_keyword_results() -> usize { 5 }

// Krumhansl-Kessler probe-tone ratings, tonic at index 0.
fn default_major_profile() -> [f32; 12] {
    [6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88]
}

fn default_minor_profile() -> [f32; 12] {
    [6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17]
}

fn default_genre_rules() -> Vec<GenreRule> {
    vec![
        GenreRule {
            genre: Genre::FutureHouse,
            min_bpm: 124,
            max_bpm: 128,
            energy: Some(Energy::High),
            min_brightness_hz: Some(2000.0),
        },
        GenreRule {
            genre: Genre::TechHouse,
            min_bpm: 124,
            max_bpm: 128,
            energy: None,
            min_brightness_hz: None,
        },
        GenreRule {
            genre: Genre::BassHouse,
            min_bpm: 128,
            max_bpm: 135,
            energy: Some(Energy::High),
            min_brightness_hz: None,
        },
        GenreRule {
            genre: Genre::ProgressiveHouse,
            min_bpm: 126,
            max_bpm: 130,
            energy: None,
            min_brightness_hz: None,
        },
        GenreRule {
            genre: Genre::DeepHouse,
            min_bpm: 118,
            max_bpm: 124,
            energy: Some(Energy::Low),
            min_brightness_hz: None,
        },
    ]
}

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(cfg) => Some(cfg),
        Err(err) => {
            log::warn!("Invalid config {}: {}", path.display(), err);
            None
        }
    }
}

/// Explicit path first, then ./otw.toml, then the per-user config locations.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("otw.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("otw").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("otw").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

use std::path::Path;

use super::decode::{self, DecodeError};
use super::energy;
use super::features::{TrackFeatures, Waveform};
use super::genre;
use super::key;
use super::spectrum::Spectrogram;
use super::tempo;
use crate::config::AnalysisConfig;

/// Runs tempo, key, energy and genre stages over an already decoded waveform.
pub fn analyze_waveform(name: &str, wave: &Waveform, cfg: &AnalysisConfig) -> TrackFeatures {
    log::debug!("STFT: n_fft={}, hop={}", cfg.n_fft, cfg.hop_length);
    let spec = Spectrogram::compute(&wave.samples, wave.sample_rate, cfg.n_fft, cfg.hop_length);

    let bpm = tempo::detect_tempo(&spec, &cfg.tempo);
    let key = key::detect_key(&spec, &cfg.key);
    let energy = energy::measure_energy(&wave.samples, &spec, &cfg.energy);
    let genre = genre::classify_genre(bpm, energy.level, energy.brightness_hz, &cfg.genre);

    let features = TrackFeatures::new(name, bpm, key.key, key.mode, energy.level, genre);
    log::info!(
        "{}: {} BPM, {}, {} energy, {}",
        features.name,
        features.bpm,
        features.key_label(),
        features.energy,
        features.genre
    );
    features
}

pub fn analyze_file(path: &Path, cfg: &AnalysisConfig) -> Result<TrackFeatures, DecodeError> {
    let wave = decode::decode_file(path, cfg)?;
    Ok(analyze_waveform(&track_name(path), &wave, cfg))
}

/// Analyze an uploaded file held in memory. `name` supplies both the reported
/// track name and the format hint.
pub fn analyze_bytes(
    name: &str,
    bytes: Vec<u8>,
    cfg: &AnalysisConfig,
) -> Result<TrackFeatures, DecodeError> {
    let ext = Path::new(name).extension().and_then(|e| e.to_str());
    let wave = decode::decode_bytes(bytes, ext, cfg)?;
    Ok(analyze_waveform(&track_name(Path::new(name)), &wave, cfg))
}

/// Never fails: any decode error is logged and replaced by the fallback record.
pub fn analyze_or_fallback(path: &Path, cfg: &AnalysisConfig) -> TrackFeatures {
    match analyze_file(path, cfg) {
        Ok(features) => features,
        Err(err) => {
            log::warn!("Analysis of {} failed, using defaults: {}", path.display(), err);
            TrackFeatures::fallback(track_name(path))
        }
    }
}

/// [`analyze_bytes`] with the same fallback rule as [`analyze_or_fallback`].
pub fn analyze_bytes_or_fallback(
    name: &str,
    bytes: Vec<u8>,
    cfg: &AnalysisConfig,
) -> TrackFeatures {
    match analyze_bytes(name, bytes, cfg) {
        Ok(features) => features,
        Err(err) => {
            log::warn!("Analysis of {} failed, using defaults: {}", name, err);
            TrackFeatures::fallback(track_name(Path::new(name)))
        }
    }
}

pub fn track_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

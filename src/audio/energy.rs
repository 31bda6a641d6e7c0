use super::features::Energy;
use super::spectrum::Spectrogram;
use crate::config::EnergyConfig;

#[derive(Clone, Debug)]
pub struct EnergyProfile {
    pub mean_rms: f32,
    /// Configured percentile of the per-frame spectral centroid, in Hz.
    pub brightness_hz: f32,
    pub score: f32,
    pub level: Energy,
}

pub fn measure_energy(samples: &[f32], spec: &Spectrogram, cfg: &EnergyConfig) -> EnergyProfile {
    let rms = frame_rms(samples, spec.n_fft, spec.hop);
    let mean_rms = if rms.is_empty() {
        0.0
    } else {
        rms.iter().sum::<f32>() / rms.len() as f32
    };
    let brightness_hz = percentile(&spectral_centroids(spec), cfg.centroid_percentile);
    let score = energy_score(mean_rms, brightness_hz, cfg);
    let level = classify_energy(score, cfg);

    log::debug!(
        "Energy: rms={:.4}, brightness={:.0}Hz, score={:.3} -> {}",
        mean_rms, brightness_hz, score, level
    );

    EnergyProfile {
        mean_rms,
        brightness_hz,
        score,
        level,
    }
}

/// Weighted sum of normalized loudness and brightness, each clamped to [0, 1].
pub fn energy_score(mean_rms: f32, brightness_hz: f32, cfg: &EnergyConfig) -> f32 {
    let loudness = (mean_rms / cfg.loudness_ref.max(1e-9)).clamp(0.0, 1.0);
    let brightness = (brightness_hz / cfg.brightness_ref_hz.max(1e-9)).clamp(0.0, 1.0);
    cfg.loudness_weight * loudness + cfg.brightness_weight * brightness
}

pub fn classify_energy(score: f32, cfg: &EnergyConfig) -> Energy {
    if score >= cfg.high_threshold {
        Energy::High
    } else if score >= cfg.medium_threshold {
        Energy::Medium
    } else {
        Energy::Low
    }
}

/// RMS of centered frames, aligned with the spectrogram frames.
pub fn frame_rms(samples: &[f32], frame_len: usize, hop: usize) -> Vec<f32> {
    if samples.is_empty() || frame_len == 0 || hop == 0 {
        return Vec::new();
    }
    let half = frame_len / 2;
    (0..=samples.len() / hop)
        .map(|t| {
            let center = t * hop;
            let start = center.saturating_sub(half);
            let end = (center + frame_len - half).min(samples.len());
            if start >= end {
                return 0.0;
            }
            // Zero padding still counts towards the frame length
            let sum_sq: f32 = samples[start..end].iter().map(|s| s * s).sum();
            (sum_sq / frame_len as f32).sqrt()
        })
        .collect()
}

/// Magnitude-weighted mean frequency per frame; silent frames give 0.
pub fn spectral_centroids(spec: &Spectrogram) -> Vec<f32> {
    spec.frames
        .iter()
        .map(|frame| {
            let total: f32 = frame.iter().sum();
            if total > 1e-10 {
                frame
                    .iter()
                    .enumerate()
                    .map(|(i, &mag)| spec.bin_hz(i) * mag)
                    .sum::<f32>()
                    / total
            } else {
                0.0
            }
        })
        .collect()
}

/// Linear-interpolated percentile, `p` in [0, 100].
pub fn percentile(values: &[f32], p: f32) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f32;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f32;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

//! Tempo estimation: spectral-flux onset envelope, prior-weighted
//! autocorrelation, then an octave fold into the EDM range.

use super::spectrum::Spectrogram;
use crate::config::TempoConfig;

/// Log compression factor applied to magnitudes before differencing.
const LOG_COMPRESSION: f32 = 100.0;

/// Best-effort tempo of the spectrogram, folded and rounded. Never fails.
pub fn detect_tempo(spec: &Spectrogram, cfg: &TempoConfig) -> u32 {
    let envelope = onset_envelope(spec);
    let raw = estimate_tempo(&envelope, spec.frame_rate(), cfg);
    let folded = fold_tempo(raw, cfg);
    log::debug!("Tempo: raw={:.2} BPM, folded={} BPM", raw, folded);
    folded
}

/// Frame-wise onset strength: mean positive change of log magnitude.
pub fn onset_envelope(spec: &Spectrogram) -> Vec<f32> {
    if spec.frames.is_empty() {
        return Vec::new();
    }

    let log_frames: Vec<Vec<f32>> = spec
        .frames
        .iter()
        .map(|f| f.iter().map(|&m| (LOG_COMPRESSION * m).ln_1p()).collect())
        .collect();

    let mut envelope = vec![0.0f32; log_frames.len()];
    for t in 1..log_frames.len() {
        let cur = &log_frames[t];
        let prev = &log_frames[t - 1];
        let flux: f32 = cur
            .iter()
            .zip(prev.iter())
            .map(|(c, p)| (c - p).max(0.0))
            .sum();
        envelope[t] = flux / cur.len() as f32;
    }
    envelope
}

/// Dominant periodicity of the envelope in BPM (unfolded).
///
/// Autocorrelation is evaluated for every lag inside `[min_bpm, max_bpm]`
/// and weighted by a log-normal prior around `prior_center_bpm`. Returns the
/// prior centre when the envelope carries no periodicity at all.
pub fn estimate_tempo(envelope: &[f32], frame_rate: f32, cfg: &TempoConfig) -> f32 {
    let fallback = cfg.prior_center_bpm;
    if envelope.len() < 2 || frame_rate <= 0.0 || cfg.min_bpm <= 0.0 || cfg.max_bpm <= cfg.min_bpm {
        return fallback;
    }

    let mean = envelope.iter().sum::<f32>() / envelope.len() as f32;
    let centered: Vec<f32> = envelope.iter().map(|v| v - mean).collect();
    let energy: f32 = centered.iter().map(|v| v * v).sum();
    if energy <= 1e-12 {
        return fallback;
    }

    let lag_min = ((60.0 * frame_rate / cfg.max_bpm).ceil() as usize).max(1);
    let lag_max = ((60.0 * frame_rate / cfg.min_bpm).floor() as usize).min(centered.len() - 1);
    if lag_min > lag_max {
        return fallback;
    }

    let lag_to_bpm = |lag: f32| 60.0 * frame_rate / lag;
    let prior = |bpm: f32| {
        let octaves = (bpm / cfg.prior_center_bpm).log2() / cfg.prior_octaves.max(1e-3);
        (-0.5 * octaves * octaves).exp()
    };

    let scores: Vec<f32> = (lag_min..=lag_max)
        .map(|lag| {
            let r: f32 = centered[..centered.len() - lag]
                .iter()
                .zip(centered[lag..].iter())
                .map(|(a, b)| a * b)
                .sum();
            r / energy * prior(lag_to_bpm(lag as f32))
        })
        .collect();

    let mut best = 0;
    for (i, &s) in scores.iter().enumerate() {
        if s > scores[best] {
            best = i;
        }
    }
    if scores[best] <= 0.0 {
        return fallback;
    }

    let period = lag_min as f32 + best as f32 + parabolic_offset(&scores, best);
    lag_to_bpm(period)
}

/// Sub-lag peak refinement, in [-0.5, 0.5].
fn parabolic_offset(scores: &[f32], i: usize) -> f32 {
    if i == 0 || i + 1 >= scores.len() {
        return 0.0;
    }
    let (a, b, c) = (scores[i - 1], scores[i], scores[i + 1]);
    let denom = a - 2.0 * b + c;
    if denom >= 0.0 {
        return 0.0;
    }
    (0.5 * (a - c) / denom).clamp(-0.5, 0.5)
}

/// Move the estimate by whole octaves toward `[fold_low, fold_high]`.
///
/// Doubles while below the range and halves while above it, stopping at the
/// first octave inside. A shift that would jump across the range is not taken,
/// so an estimate with no octave inside stays on its own side.
pub fn fold_tempo(bpm: f32, cfg: &TempoConfig) -> u32 {
    let mut bpm = if bpm.is_finite() && bpm > 0.0 { bpm } else { cfg.prior_center_bpm };
    while bpm.round() < cfg.fold_low && (bpm * 2.0).round() <= cfg.fold_high {
        bpm *= 2.0;
    }
    while bpm.round() > cfg.fold_high && (bpm / 2.0).round() >= cfg.fold_low {
        bpm /= 2.0;
    }
    (bpm.round() as u32).max(1)
}

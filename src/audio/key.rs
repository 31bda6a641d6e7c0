//! Key and mode detection by chroma template matching.

use super::features::{Mode, PitchClass};
use super::hpss;
use super::spectrum::Spectrogram;
use crate::config::{Correlation, KeyConfig};

#[derive(Clone, Debug)]
pub struct KeyEstimate {
    pub key: PitchClass,
    pub mode: Mode,
}

pub fn detect_key(spec: &Spectrogram, cfg: &KeyConfig) -> KeyEstimate {
    let chroma = chroma_vector(spec, cfg);
    let key = dominant_pitch_class(&chroma);
    let (mode, major_score, minor_score) = detect_mode(&chroma, key, cfg);
    log::debug!(
        "Key: {} {} (major={:.3}, minor={:.3})",
        key, mode, major_score, minor_score
    );
    KeyEstimate { key, mode }
}

/// Mean power per pitch class over all frames, A4 = 440 Hz.
pub fn chroma_vector(spec: &Spectrogram, cfg: &KeyConfig) -> [f32; 12] {
    let mut chroma = [0.0f32; 12];
    if spec.is_empty() {
        return chroma;
    }

    let num_bins = spec.num_bins();
    let hz_to_bin = spec.n_fft as f32 / spec.sample_rate as f32;
    let bin_lo = ((cfg.chroma_min_hz * hz_to_bin).ceil() as usize).max(1).min(num_bins);
    let bin_hi = ((cfg.chroma_max_hz * hz_to_bin).floor() as usize + 1).min(num_bins);
    if bin_lo >= bin_hi {
        return chroma;
    }

    let pitch_of_bin: Vec<usize> = (bin_lo..bin_hi)
        .map(|bin| pitch_class_of(spec.bin_hz(bin)))
        .collect();

    let harmonic;
    let frames: &[Vec<f32>] = if cfg.harmonic_only {
        harmonic = hpss::harmonic(spec, bin_lo..bin_hi, cfg.harmonic_kernel, cfg.percussive_kernel);
        &harmonic
    } else {
        &spec.frames
    };

    for frame in frames {
        for (offset, &pc) in pitch_of_bin.iter().enumerate() {
            let mag = frame[bin_lo + offset];
            chroma[pc] += mag * mag;
        }
    }

    let n = frames.len() as f32;
    for v in chroma.iter_mut() {
        *v /= n;
    }
    chroma
}

/// Nearest equal-tempered pitch class of a frequency.
pub fn pitch_class_of(freq: f32) -> usize {
    let semitones_from_a = 12.0 * (freq / 440.0).log2();
    ((semitones_from_a.round() as i32 + 9).rem_euclid(12)) as usize
}

/// Bin with the most energy; the lowest index wins ties.
pub fn dominant_pitch_class(chroma: &[f32; 12]) -> PitchClass {
    let mut best = 0;
    for (i, &v) in chroma.iter().enumerate() {
        if v > chroma[best] {
            best = i;
        }
    }
    PitchClass::from_index(best)
}

/// Correlate the chroma, rotated so `tonic` is at index 0, against both
/// reference profiles. Ties go to Major.
pub fn detect_mode(chroma: &[f32; 12], tonic: PitchClass, cfg: &KeyConfig) -> (Mode, f32, f32) {
    let mut rotated = [0.0f32; 12];
    for (i, slot) in rotated.iter_mut().enumerate() {
        *slot = chroma[(i + tonic.index()) % 12];
    }

    let score = |profile: &[f32; 12]| match cfg.correlation {
        Correlation::Pearson => pearson(&rotated, profile),
        Correlation::Dot => dot(&rotated, profile),
    };
    let major = score(&cfg.major_profile);
    let minor = score(&cfg.minor_profile);

    let mode = if minor > major { Mode::Minor } else { Mode::Major };
    (mode, major, minor)
}

fn dot(a: &[f32; 12], b: &[f32; 12]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Zero when either side has no variance.
fn pearson(a: &[f32; 12], b: &[f32; 12]) -> f32 {
    let mean_a = a.iter().sum::<f32>() / 12.0;
    let mean_b = b.iter().sum::<f32>() / 12.0;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    let denom = (var_a * var_b).sqrt();
    if denom <= 1e-12 {
        0.0
    } else {
        cov / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 22050;

    fn chord(tones: &[(f32, f32)], secs: f32) -> Vec<f32> {
        let n = (secs * SR as f32) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / SR as f32;
                tones
                    .iter()
                    .map(|(f, a)| a * (2.0 * std::f32::consts::PI * f * t).sin())
                    .sum()
            })
            .collect()
    }

    fn detect(samples: &[f32]) -> KeyEstimate {
        let spec = Spectrogram::compute(samples, SR, 2048, 512);
        detect_key(&spec, &KeyConfig::default())
    }

    #[test]
    fn pitch_class_mapping() {
        assert_eq!(pitch_class_of(440.0), 9);
        assert_eq!(pitch_class_of(261.63), 0);
        assert_eq!(pitch_class_of(277.18), 1);
        assert_eq!(pitch_class_of(123.47), 11);
        assert_eq!(pitch_class_of(65.41), 0);
    }

    #[test]
    fn argmax_prefers_lowest_index_on_tie() {
        let mut chroma = [0.0f32; 12];
        chroma[4] = 1.0;
        chroma[7] = 1.0;
        assert_eq!(dominant_pitch_class(&chroma), PitchClass::E);
        assert_eq!(dominant_pitch_class(&[0.0; 12]), PitchClass::C);
    }

    #[test]
    fn c_major_triad() {
        let est = detect(&chord(&[(261.63, 0.45), (329.63, 0.3), (392.0, 0.3)], 3.0));
        assert_eq!(est.key, PitchClass::C);
        assert_eq!(est.mode, Mode::Major);
    }

    #[test]
    fn a_minor_triad() {
        let est = detect(&chord(&[(220.0, 0.45), (261.63, 0.3), (329.63, 0.3)], 3.0));
        assert_eq!(est.key, PitchClass::A);
        assert_eq!(est.mode, Mode::Minor);
    }

    #[test]
    fn silence_defaults_to_c_major() {
        let est = detect(&vec![0.0; SR as usize]);
        assert_eq!(est.key, PitchClass::C);
        assert_eq!(est.mode, Mode::Major);
    }

    #[test]
    fn dot_correlation_on_scale_profiles() {
        let cfg = KeyConfig {
            correlation: Correlation::Dot,
            major_profile: [1.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0],
            minor_profile: [1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0],
            ..KeyConfig::default()
        };
        // D, F, A: minor third above D
        let mut chroma = [0.0f32; 12];
        chroma[2] = 1.0;
        chroma[5] = 0.6;
        chroma[9] = 0.6;
        let (mode, major, minor) = detect_mode(&chroma, PitchClass::D, &cfg);
        assert_eq!(mode, Mode::Minor);
        assert!(minor > major);
    }

    #[test]
    fn equal_scores_favor_major() {
        let cfg = KeyConfig::default();
        let (mode, major, minor) = detect_mode(&[1.0; 12], PitchClass::G, &cfg);
        assert_eq!(major, minor);
        assert_eq!(mode, Mode::Major);
    }
}

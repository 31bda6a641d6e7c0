//! Median-filter harmonic/percussive separation on a magnitude spectrogram.

use std::ops::Range;

use super::spectrum::Spectrogram;

/// Harmonic part of `spec`: magnitudes scaled by the soft mask
/// `H^2 / (H^2 + P^2)`, where H is the median across time and P the median
/// across frequency. Bins outside `bins` are left at zero.
pub fn harmonic(
    spec: &Spectrogram,
    bins: Range<usize>,
    time_kernel: usize,
    freq_kernel: usize,
) -> Vec<Vec<f32>> {
    let frames = &spec.frames;
    if frames.is_empty() {
        return Vec::new();
    }
    let num_frames = frames.len();
    let num_bins = frames[0].len();
    let time_half = time_kernel / 2;
    let freq_half = freq_kernel / 2;

    let mut out = vec![vec![0.0f32; num_bins]; num_frames];
    let mut window: Vec<f32> = Vec::with_capacity(time_kernel.max(freq_kernel) + 1);

    for t in 0..num_frames {
        let t_lo = t.saturating_sub(time_half);
        let t_hi = (t + time_half + 1).min(num_frames);
        for k in bins.start.min(num_bins)..bins.end.min(num_bins) {
            window.clear();
            window.extend((t_lo..t_hi).map(|i| frames[i][k]));
            let h = median(&mut window);

            let k_lo = k.saturating_sub(freq_half);
            let k_hi = (k + freq_half + 1).min(num_bins);
            window.clear();
            window.extend_from_slice(&frames[t][k_lo..k_hi]);
            let p = median(&mut window);

            let h2 = h * h;
            let p2 = p * p;
            let denom = h2 + p2;
            let mask = if denom > 1e-20 { h2 / denom } else { 0.0 };
            out[t][k] = frames[t][k] * mask;
        }
    }
    out
}

fn median(values: &mut [f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mid = values.len() / 2;
    let (_, m, _) = values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    *m
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec_from(frames: Vec<Vec<f32>>) -> Spectrogram {
        Spectrogram {
            frames,
            sample_rate: 22050,
            n_fft: 16,
            hop: 4,
        }
    }

    #[test]
    fn sustained_tone_survives() {
        // Bin 3 is on in every frame
        let frames: Vec<Vec<f32>> = (0..20)
            .map(|_| {
                let mut f = vec![0.0; 9];
                f[3] = 1.0;
                f
            })
            .collect();
        let h = harmonic(&spec_from(frames), 0..9, 5, 5);
        assert!((h[10][3] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn transient_is_suppressed() {
        // Frame 10 is a broadband click
        let frames: Vec<Vec<f32>> = (0..20)
            .map(|t| if t == 10 { vec![1.0; 9] } else { vec![0.0; 9] })
            .collect();
        let h = harmonic(&spec_from(frames), 0..9, 5, 5);
        assert!(h[10].iter().all(|&v| v < 1e-6));
    }

    #[test]
    fn bins_outside_range_are_zero() {
        let frames: Vec<Vec<f32>> = (0..10).map(|_| vec![1.0; 9]).collect();
        let h = harmonic(&spec_from(frames), 2..4, 3, 3);
        assert_eq!(h[5][0], 0.0);
        assert!(h[5][2] > 0.0);
        assert_eq!(h[5][4], 0.0);
    }

    #[test]
    fn median_of_odd_and_even() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), 3.0);
        assert_eq!(median(&mut []), 0.0);
    }
}

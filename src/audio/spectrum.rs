use rustfft::{num_complex::Complex, FftPlanner};

/// Magnitude STFT with centered, zero-padded Hann frames.
#[derive(Clone, Debug)]
pub struct Spectrogram {
    /// One magnitude vector (n_fft / 2 + 1 bins) per frame.
    pub frames: Vec<Vec<f32>>,
    pub sample_rate: u32,
    pub n_fft: usize,
    pub hop: usize,
}

impl Spectrogram {
    pub fn compute(samples: &[f32], sample_rate: u32, n_fft: usize, hop: usize) -> Self {
        let hop = hop.max(1);
        if samples.is_empty() || n_fft == 0 {
            return Self {
                frames: Vec::new(),
                sample_rate,
                n_fft,
                hop,
            };
        }

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);
        let hann = hann_window(n_fft);
        let num_bins = n_fft / 2 + 1;
        let num_frames = 1 + samples.len() / hop;
        let half = (n_fft / 2) as isize;

        let mut frames = Vec::with_capacity(num_frames);
        let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];

        for t in 0..num_frames {
            let start = (t * hop) as isize - half;
            for (i, slot) in buffer.iter_mut().enumerate() {
                let idx = start + i as isize;
                let s = if idx >= 0 && (idx as usize) < samples.len() {
                    samples[idx as usize]
                } else {
                    0.0
                };
                *slot = Complex::new(s * hann[i], 0.0);
            }
            fft.process(&mut buffer);
            frames.push(buffer[..num_bins].iter().map(|c| c.norm()).collect());
        }

        Self {
            frames,
            sample_rate,
            n_fft,
            hop,
        }
    }

    pub fn num_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Centre frequency of an FFT bin.
    pub fn bin_hz(&self, bin: usize) -> f32 {
        bin as f32 * self.sample_rate as f32 / self.n_fft as f32
    }

    /// Frames per second.
    pub fn frame_rate(&self) -> f32 {
        self.sample_rate as f32 / self.hop as f32
    }
}

pub fn hann_window(size: usize) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}

use std::io::Cursor;
use std::path::{Path, PathBuf};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use super::features::Waveform;
use crate::config::AnalysisConfig;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to open audio file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported or unreadable audio: {0}")]
    Unsupported(String),
    #[error("audio decoding failed: {0}")]
    Decode(#[from] symphonia::core::errors::Error),
    #[error("resampling failed: {0}")]
    Resample(String),
    #[error("no audio samples decoded")]
    Empty,
}

/// Decode at most `max_duration_secs` of a file into mono at the configured rate.
pub fn decode_file(path: &Path, cfg: &AnalysisConfig) -> Result<Waveform, DecodeError> {
    let file = std::fs::File::open(path).map_err(|source| DecodeError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let ext = path.extension().and_then(|e| e.to_str());
    decode_source(Box::new(file), ext, cfg)
}

/// Same as [`decode_file`] for an in-memory upload.
pub fn decode_bytes(
    bytes: Vec<u8>,
    extension: Option<&str>,
    cfg: &AnalysisConfig,
) -> Result<Waveform, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    decode_source(Box::new(Cursor::new(bytes)), extension, cfg)
}

fn decode_source(
    source: Box<dyn MediaSource>,
    extension: Option<&str>,
    cfg: &AnalysisConfig,
) -> Result<Waveform, DecodeError> {
    let mss = MediaSourceStream::new(source, Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| DecodeError::Unsupported("no audio tracks found".into()))?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count()).max(1);
    let source_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| DecodeError::Unsupported("unknown sample rate".into()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;

    let max_frames = (cfg.max_duration_secs.max(0.0) * source_rate as f32) as usize;
    let mut all_samples: Vec<f32> = Vec::new();

    while all_samples.len() < max_frames {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(msg)) => {
                log::debug!("Skipping corrupt packet: {}", msg);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        let samples = sample_buf.samples();

        // Downmix to mono
        if channels == 1 {
            all_samples.extend_from_slice(samples);
        } else {
            for frame_samples in samples.chunks(channels) {
                let mono: f32 = frame_samples.iter().sum::<f32>() / channels as f32;
                all_samples.push(mono);
            }
        }
    }

    all_samples.truncate(max_frames);
    if all_samples.is_empty() {
        return Err(DecodeError::Empty);
    }

    let samples = if cfg.sample_rate != 0 && cfg.sample_rate != source_rate {
        resample(&all_samples, source_rate, cfg.sample_rate)?
    } else {
        all_samples
    };
    let sample_rate = if cfg.sample_rate == 0 { source_rate } else { cfg.sample_rate };

    if samples.is_empty() {
        return Err(DecodeError::Empty);
    }

    log::info!(
        "Decoded audio: {} samples, {}Hz (source {}Hz), {:.1}s",
        samples.len(),
        sample_rate,
        source_rate,
        samples.len() as f32 / sample_rate as f32
    );

    Ok(Waveform {
        samples,
        sample_rate,
    })
}

fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, DecodeError> {
    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
    };

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, samples.len(), 1)
        .map_err(|e| DecodeError::Resample(e.to_string()))?;

    let input = vec![samples.to_vec()];
    let output = resampler
        .process(&input, None)
        .map_err(|e| DecodeError::Resample(e.to_string()))?;

    Ok(output.into_iter().next().unwrap_or_default())
}

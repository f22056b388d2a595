use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{Error, Result};

/// Decoded audio as mono PCM samples at a specific sample rate.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub duration_secs: f64,
}

impl DecodedAudio {
    #[must_use]
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        let duration_secs = samples.len() as f64 / f64::from(sample_rate.max(1));
        Self {
            samples,
            sample_rate,
            duration_secs,
        }
    }
}

fn decode_error(path: &Path, message: impl std::fmt::Display) -> Error {
    Error::Decode {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

/// Decode an audio file to mono PCM samples.
///
/// Resamples to `target_sample_rate` (22050 Hz for analysis, 48000 Hz for
/// the embedding model) and keeps at most `max_secs` seconds from the
/// start of the file. Multi-channel audio is averaged to mono.
pub fn decode_audio(path: &Path, target_sample_rate: u32, max_secs: f64) -> Result<DecodedAudio> {
    let file = std::fs::File::open(path).map_err(|e| decode_error(path, e))?;
    let mss = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| decode_error(path, format!("unrecognized format: {e}")))?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| decode_error(path, "no default audio track"))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| decode_error(path, format!("unsupported codec: {e}")))?;

    let source_rate = codec_params.sample_rate.unwrap_or(44100);
    let mut channels = codec_params.channels.map_or(1, |c| c.count()).max(1);
    let frame_limit = (max_secs.max(0.0) * f64::from(source_rate)).ceil() as usize;

    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut interleaved = Vec::new();

    while interleaved.len() < frame_limit.saturating_mul(channels) {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(decode_error(path, format!("failed to read packet: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(audio_buf) => {
                if sample_buf.is_none() {
                    let spec = *audio_buf.spec();
                    channels = spec.channels.count().max(1);
                    let duration = audio_buf.capacity() as u64;
                    sample_buf = Some(SampleBuffer::<f32>::new(duration, spec));
                }

                if let Some(ref mut buf) = sample_buf {
                    buf.copy_interleaved_ref(audio_buf);
                    interleaved.extend_from_slice(buf.samples());
                }
            }
            Err(SymphoniaError::DecodeError(e)) => {
                log::debug!("Skipping corrupt packet in {}: {}", path.display(), e);
            }
            Err(e) => return Err(decode_error(path, format!("failed to decode packet: {e}"))),
        }
    }

    interleaved.truncate(frame_limit.saturating_mul(channels));

    let mono_samples: Vec<f32> = if channels > 1 {
        interleaved
            .chunks(channels)
            .map(|chunk| chunk.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        interleaved
    };

    let resampled = resample_simple(&mono_samples, source_rate, target_sample_rate);

    Ok(DecodedAudio::new(resampled, target_sample_rate))
}

/// Linear-interpolation resampler.
pub(crate) fn resample_simple(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let output_len = (samples.len() as f64 / ratio) as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let pos = i as f64 * ratio;
        let idx = pos as usize;
        if idx + 1 < samples.len() {
            let frac = pos - idx as f64;
            let sample = samples[idx].mul_add(1.0 - frac as f32, samples[idx + 1] * frac as f32);
            output.push(sample);
        } else if idx < samples.len() {
            output.push(samples[idx]);
        }
    }

    output
}

//! WAV decoding, mixing and encoding.
//!
//! Clips are kept as mono `f32` samples; everything is mixed down on decode.

use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::AuditError;

/// Mono audio in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// This clip at `sample_rate`.
    pub fn resampled(self, sample_rate: u32) -> AudioClip {
        if self.sample_rate == sample_rate || self.sample_rate == 0 || sample_rate == 0 {
            return self;
        }
        let rate = self.sample_rate as f32 / sample_rate as f32;
        AudioClip {
            samples: resample_linear(self.samples, rate),
            sample_rate,
        }
    }
}

/// Mixing capability: put an intro clip in front of a narration.
pub trait AudioMixer: Send + Sync {
    fn stitch(&self, intro: &Path, narration: &AudioClip) -> Result<AudioClip, AuditError>;
}

/// Intro + silence gap + narration, at the intro's sample rate.
pub struct WavMixer {
    gap_seconds: f32,
}

impl WavMixer {
    pub fn new(gap_seconds: f32) -> Self {
        Self {
            gap_seconds: gap_seconds.max(0.0),
        }
    }
}

impl AudioMixer for WavMixer {
    fn stitch(&self, intro: &Path, narration: &AudioClip) -> Result<AudioClip, AuditError> {
        let intro = read_wav(intro)?;
        let narration = narration.clone().resampled(intro.sample_rate);
        let sample_rate = intro.sample_rate;

        Ok(AudioClip {
            samples: combine_audio_segments(
                vec![intro.samples, narration.samples],
                self.gap_seconds,
                sample_rate,
            ),
            sample_rate,
        })
    }
}

/// Decode a WAV file.
pub fn read_wav(path: &Path) -> Result<AudioClip, AuditError> {
    let reader = WavReader::open(path)?;
    decode(reader)
}

/// Decode WAV bytes, e.g. a synthesis response body.
pub fn decode_wav(bytes: &[u8]) -> Result<AudioClip, AuditError> {
    let reader = WavReader::new(Cursor::new(bytes))?;
    decode(reader)
}

fn decode<R: std::io::Read>(mut reader: WavReader<R>) -> Result<AudioClip, AuditError> {
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    Ok(AudioClip {
        samples: downmix(&interleaved, spec.channels),
        sample_rate: spec.sample_rate,
    })
}

fn downmix(interleaved: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels as usize)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Write a clip as 16-bit mono PCM.
pub fn write_wav(path: &Path, clip: &AudioClip) -> Result<(), AuditError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: clip.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for &sample in &clip.samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(value)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Stretch or squeeze samples by linear interpolation.
/// `rate` < 1.0 lengthens the clip, `rate` > 1.0 shortens it.
pub fn resample_linear(samples: Vec<f32>, rate: f32) -> Vec<f32> {
    if (rate - 1.0).abs() < 0.001 || rate <= 0.0 {
        return samples;
    }

    let new_len = (samples.len() as f32 / rate) as usize;
    let mut result = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_pos = i as f32 * rate;
        let src_idx = src_pos as usize;
        let frac = src_pos - src_idx as f32;

        if src_idx + 1 < samples.len() {
            result.push(samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac);
        } else if src_idx < samples.len() {
            result.push(samples[src_idx]);
        }
    }

    result
}

/// Join segments with silence gaps.
pub fn combine_audio_segments(
    segments: Vec<Vec<f32>>,
    gap_seconds: f32,
    sample_rate: u32,
) -> Vec<f32> {
    let gap_samples = (gap_seconds * sample_rate as f32) as usize;
    let silence: Vec<f32> = vec![0.0; gap_samples];

    let mut combined = Vec::new();

    for (i, segment) in segments.into_iter().enumerate() {
        if i > 0 {
            combined.extend(&silence);
        }
        combined.extend(segment);
    }

    combined
}

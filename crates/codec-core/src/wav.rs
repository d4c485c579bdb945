//! WAV container helpers
//!
//! Transcription services take a WAV upload; the speech synthesizer returns
//! one. Both directions go through `hound`.

use crate::error::{CodecError, Result};
use bytes::Bytes;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::Cursor;
use tracing::debug;

/// Mono PCM decoded from a WAV container
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Interleaved channels already down-mixed to mono
    pub samples: Vec<i16>,
    /// Sample rate of `samples`
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }
}

/// Wrap mono 16-bit PCM in a WAV container
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Bytes> {
    if sample_rate == 0 {
        return Err(CodecError::InvalidSampleRate { rate: sample_rate });
    }

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)
            .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
        for &s in samples {
            writer
                .write_sample(s)
                .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    }

    Ok(Bytes::from(cursor.into_inner()))
}

/// Decode a WAV container to mono 16-bit PCM.
///
/// Integer samples of 8 to 32 bits and 32-bit float samples are accepted.
/// Multi-channel audio is averaged down to one channel.
pub fn decode_wav(data: &[u8]) -> Result<DecodedAudio> {
    if data.len() < 12 || &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
        return Err(CodecError::invalid_format("missing RIFF/WAVE header"));
    }

    let reader = WavReader::new(Cursor::new(data))?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(CodecError::invalid_format("WAV declares zero channels"));
    }

    let interleaved: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader
            .into_samples::<i16>()
            .collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Int, bits) if bits <= 32 => {
            let shift = i32::from(bits) - 16;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| scale_int(v, shift)))
                .collect::<std::result::Result<_, _>>()?
        }
        (SampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .map(|s| s.map(float_to_i16))
            .collect::<std::result::Result<_, _>>()?,
        (format, bits) => {
            return Err(CodecError::invalid_format(format!(
                "unsupported sample format {format:?}/{bits} bits"
            )));
        }
    };

    let samples = downmix(&interleaved, usize::from(spec.channels));
    debug!(
        "Decoded WAV: {} Hz, {} ch, {} bits, {} mono samples",
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample,
        samples.len()
    );

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}

fn scale_int(value: i32, shift: i32) -> i16 {
    let scaled = if shift >= 0 {
        value >> shift
    } else {
        value << (-shift)
    };
    scaled.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

fn float_to_i16(value: f32) -> i16 {
    (value.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16
}

fn downmix(interleaved: &[i16], channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| i32::from(s)).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

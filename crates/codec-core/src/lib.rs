//! # Codec-Core: narrowband audio helpers for the voice gateway
//!
//! Everything the media path needs to move audio between the telephone
//! network and the speech services:
//!
//! - **G.711 μ-law (PCMU)**: ITU-T reference compression/expansion with
//!   pre-computed lookup tables for the hot path
//! - **Resampling**: linear interpolation between 8 kHz telephony audio and
//!   the 16 kHz expected by transcription services
//! - **Levels**: RMS energy, peak detection and peak normalization
//! - **WAV**: wrapping PCM for upload and decoding synthesized speech
//!
//! ## Usage
//!
//! ```rust
//! use aibridge_codec_core::{g711, resample};
//!
//! let samples = vec![0i16; 160]; // 20ms at 8kHz
//! let payload = g711::encode_frame(&samples);
//! let decoded = g711::decode_frame(&payload);
//! let wideband = resample(&decoded, 8000, 16000);
//! assert_eq!(wideband.len(), 320);
//! ```

pub mod error;
pub mod g711;
pub mod level;
pub mod resample;
pub mod wav;

pub use error::{CodecError, Result};
pub use level::{normalize, peak, rms};
pub use resample::resample;
pub use wav::{DecodedAudio, decode_wav, encode_wav};

/// Telephony sample rate used on the RTP leg
pub const NARROWBAND_RATE: u32 = 8000;

/// Sample rate expected by the transcription service
pub const WIDEBAND_RATE: u32 = 16000;

/// Samples in one 20ms narrowband frame
pub const FRAME_SAMPLES: usize = 160;

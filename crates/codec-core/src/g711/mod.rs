//! G.711 μ-law (PCMU, RTP payload type 0)
//!
//! The per-sample functions go through lookup tables; the `reference`
//! module keeps the algorithmic form the tables are generated from.

pub mod reference;
pub mod tables;

pub use reference::{ulaw_compress, ulaw_expand};
pub use tables::{mulaw_compress_table, mulaw_expand_table};

/// RTP static payload type for PCMU
pub const PCMU_PAYLOAD_TYPE: u8 = 0;

/// μ-law encoding of digital silence
pub const MULAW_SILENCE: u8 = 0xFF;

/// Decode one μ-law byte to a 16-bit linear sample
#[inline]
pub fn decode(byte: u8) -> i16 {
    mulaw_expand_table(byte)
}

/// Encode one 16-bit linear sample to μ-law
///
/// Samples outside the representable μ-law range saturate.
#[inline]
pub fn encode(sample: i16) -> u8 {
    mulaw_compress_table(sample)
}

/// Encode a block of samples (typically one 160-sample frame)
pub fn encode_frame(samples: &[i16]) -> Vec<u8> {
    samples.iter().map(|&s| encode(s)).collect()
}

/// Decode a μ-law payload into linear samples
pub fn decode_frame(payload: &[u8]) -> Vec<i16> {
    payload.iter().map(|&b| decode(b)).collect()
}

/// Decode a μ-law payload, appending to an existing buffer
pub fn decode_into(payload: &[u8], out: &mut Vec<i16>) {
    out.reserve(payload.len());
    out.extend(payload.iter().map(|&b| decode(b)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_silence_encodes_to_ff() {
        assert_eq!(encode(0), MULAW_SILENCE);
        assert_eq!(decode(MULAW_SILENCE), 0);
    }

    #[test]
    fn test_extremes_saturate() {
        let top = decode(encode(i16::MAX));
        let bottom = decode(encode(i16::MIN));
        assert_eq!(top, 32124);
        assert_eq!(bottom, -32124);
    }

    #[test]
    fn test_sign_is_preserved() {
        for s in [100i16, 1000, 10000, 30000] {
            assert!(decode(encode(s)) > 0);
            assert!(decode(encode(-s)) < 0);
        }
    }

    #[test]
    fn test_frame_helpers() {
        let samples: Vec<i16> = (0..160).map(|i| (i * 100) as i16).collect();
        let payload = encode_frame(&samples);
        assert_eq!(payload.len(), 160);
        let decoded = decode_frame(&payload);
        assert_eq!(decoded.len(), 160);

        let mut appended = vec![1i16, 2];
        decode_into(&payload, &mut appended);
        assert_eq!(appended.len(), 162);
        assert_eq!(&appended[2..], decoded.as_slice());
    }

    proptest! {
        #[test]
        fn roundtrip_within_quantization_error(s in -32000i16..=32000) {
            let back = decode(encode(s));
            let err = (i32::from(back) - i32::from(s)).abs();
            prop_assert!(err <= i32::from(s).abs() / 16 + 16, "sample {} decoded to {}", s, back);
        }

        #[test]
        fn reencoding_is_stable(b in any::<u8>()) {
            // 0x7F and 0xFF both decode to zero; zero re-encodes as 0xFF
            let once = decode(b);
            prop_assert_eq!(decode(encode(once)), once);
        }
    }
}

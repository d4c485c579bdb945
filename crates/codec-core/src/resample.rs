//! Linear-interpolation sample rate conversion
//!
//! Quality is adequate for speech at telephony bandwidth. No anti-alias
//! filtering is applied when downsampling; the synthesizer output is already
//! band-limited speech.

/// Convert `samples` from `from_rate` to `to_rate`.
///
/// The output holds `round(len * to_rate / from_rate)` samples. Empty input or
/// a zero rate yields an empty output; equal rates return a copy.
pub fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return Vec::new();
    }
    if from_rate == to_rate {
        return samples.to_vec();
    }

    let out_len = output_len(samples.len(), from_rate, to_rate);
    let step = f64::from(from_rate) / f64::from(to_rate);
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = (pos.floor() as usize).min(last);
            let frac = pos - idx as f64;
            let a = f64::from(samples[idx]);
            let b = f64::from(samples[(idx + 1).min(last)]);
            (a + (b - a) * frac)
                .round()
                .clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
        })
        .collect()
}

/// Number of samples `resample` produces for a given input length
pub fn output_len(input_len: usize, from_rate: u32, to_rate: u32) -> usize {
    if from_rate == 0 {
        return 0;
    }
    ((input_len as f64) * f64::from(to_rate) / f64::from(from_rate)).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_and_degenerate() {
        assert!(resample(&[], 8000, 16000).is_empty());
        assert!(resample(&[1, 2, 3], 0, 16000).is_empty());
        assert!(resample(&[1, 2, 3], 8000, 0).is_empty());
        assert_eq!(resample(&[1, 2, 3], 8000, 8000), vec![1, 2, 3]);
    }

    #[test]
    fn test_upsample_interpolates_midpoints() {
        let out = resample(&[0, 100, 200], 8000, 16000);
        assert_eq!(out, vec![0, 50, 100, 150, 200, 200]);
    }

    #[test]
    fn test_downsample_from_tts_rate() {
        let input = vec![1000i16; 24000];
        let out = resample(&input, 24000, 8000);
        assert_eq!(out.len(), 8000);
        assert!(out.iter().all(|&s| s == 1000));
    }

    proptest! {
        #[test]
        fn upsample_doubles_length(samples in proptest::collection::vec(any::<i16>(), 1..2000)) {
            let up = resample(&samples, 8000, 16000);
            prop_assert!((up.len() as i64 - 2 * samples.len() as i64).abs() <= 1);
        }

        #[test]
        fn downsample_halves_length(samples in proptest::collection::vec(any::<i16>(), 1..2000)) {
            let down = resample(&samples, 16000, 8000);
            prop_assert!((down.len() as i64 - (samples.len() as i64) / 2).abs() <= 1);
        }

        #[test]
        fn output_stays_within_input_bounds(samples in proptest::collection::vec(any::<i16>(), 1..500)) {
            let lo = *samples.iter().min().unwrap_or(&0);
            let hi = *samples.iter().max().unwrap_or(&0);
            for s in resample(&samples, 8000, 22050) {
                prop_assert!(s >= lo && s <= hi);
            }
        }
    }
}

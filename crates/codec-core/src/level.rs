//! Signal level measurements

/// Root-mean-square energy of a block of samples (0.0 for empty input)
pub fn rms(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples
        .iter()
        .map(|&s| {
            let v = f64::from(s);
            v * v
        })
        .sum();
    (sum / samples.len() as f64).sqrt()
}

/// Largest absolute sample value
pub fn peak(samples: &[i16]) -> u16 {
    samples.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0)
}

/// Scale `samples` in place so that the peak reaches `target_ratio` of full
/// scale. Returns the applied gain; silent input is left untouched (gain 1.0).
pub fn normalize(samples: &mut [i16], target_ratio: f64) -> f64 {
    let current = peak(samples);
    if current == 0 {
        return 1.0;
    }
    let target = f64::from(i16::MAX) * target_ratio.clamp(0.0, 1.0);
    let gain = target / f64::from(current);
    for s in samples.iter_mut() {
        *s = (f64::from(*s) * gain)
            .round()
            .clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16;
    }
    gain
}

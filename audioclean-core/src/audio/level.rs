//! Signal level measurement.
//!
//! Levels are RMS relative to a full scale of `1.0`. A zero-energy (or empty)
//! slice has a level of `f32::NEG_INFINITY` dBFS.

/// Root-mean-square of a sample slice. Empty slices have an RMS of `0.0`.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    // f64 accumulator: whole recordings are tens of millions of samples.
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}

/// Convert a linear RMS amplitude to dBFS.
pub fn amplitude_to_dbfs(amplitude: f32) -> f32 {
    if amplitude <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * amplitude.log10()
    }
}

/// Convert a gain in decibels to a linear multiplier.
pub fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// RMS level of `samples` in dBFS.
pub fn rms_dbfs(samples: &[f32]) -> f32 {
    amplitude_to_dbfs(rms(samples))
}

//! Loudness measurement and input scrubbing.

/// Maps a full-scale sine (RMS ≈ 0.707) to a volume of 1.0.
const RMS_TO_VOLUME: f32 = core::f32::consts::SQRT_2;

/// Root-mean-square level of a sample block.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Normalized loudness in 0.0 - 1.0 from an RMS level.
pub fn rms_to_volume(rms: f32) -> f32 {
    (rms * RMS_TO_VOLUME).min(1.0)
}

/// Replace NaN/Inf samples with silence, in place.
///
/// Runs on ingest so no non-finite value ever reaches the analysis or the
/// difference buffers, where a single NaN would poison every lag.
pub fn scrub_non_finite(samples: &mut [f32]) {
    for sample in samples.iter_mut() {
        if !sample.is_finite() {
            *sample = 0.0;
        }
    }
}

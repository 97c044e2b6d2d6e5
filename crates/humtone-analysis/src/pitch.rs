//! Fundamental-frequency estimation with the YIN algorithm.
//!
//! YIN (de Cheveigné & Kawahara, 2002) against a fixed analysis window:
//!
//! 1. Squared-difference function d(τ) over candidate lags
//! 2. Cumulative-mean normalization d'(τ)
//! 3. First-below-threshold candidate, walked to its local minimum
//! 4. Parabolic interpolation for sub-sample lag accuracy
//!
//! Unlike a tuner, a voice-controlled instrument must never guess: when no
//! lag falls below the threshold, the estimator reports no pitch rather
//! than falling back to the global minimum. A wrong octave held for even a
//! single frame is audible downstream.

/// RMS at which loudness no longer limits confidence.
const CONFIDENCE_RMS_REF: f32 = 0.05;

/// Confidence boost for detections inside the vocal band.
const VOCAL_BAND_BOOST: f32 = 1.15;

/// Vocal band bounds in Hz.
const VOCAL_BAND_LOW: f32 = 80.0;
const VOCAL_BAND_HIGH: f32 = 800.0;

/// Raw output of one estimation pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct PitchEstimate {
    /// Estimated fundamental in Hz, `None` when unvoiced.
    pub frequency: Option<f32>,
    /// Detection reliability (0.0 - 1.0).
    pub confidence: f32,
    /// Cents from the nearest equal-tempered semitone.
    pub cents_offset: f32,
}

/// YIN pitch estimator over a fixed-size window.
///
/// Buffers are allocated once at construction; `estimate()` is
/// allocation-free and safe to call from the real-time context.
pub struct PitchEstimator {
    sample_rate: f64,
    min_frequency: f32,
    max_frequency: f32,
    threshold: f32,
    correction: f32,

    // Preallocated lag buffers, sized for half the analysis window.
    difference: Vec<f32>,
    normalized: Vec<f32>,
}

impl PitchEstimator {
    /// Create an estimator for a given window size.
    ///
    /// # Arguments
    /// * `sample_rate` - Input sample rate in Hz
    /// * `window_size` - Analysis window length in samples
    /// * `min_frequency` / `max_frequency` - Detectable band in Hz
    pub fn new(
        sample_rate: f64,
        window_size: usize,
        min_frequency: f32,
        max_frequency: f32,
    ) -> Self {
        let max_lag = window_size / 2;
        Self {
            sample_rate,
            min_frequency,
            max_frequency,
            threshold: 0.1,
            correction: 1.0,
            difference: vec![0.0; max_lag + 1],
            normalized: vec![0.0; max_lag + 1],
        }
    }

    /// Set the YIN threshold (clamped to 0.01 - 0.5; default 0.1).
    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold.clamp(0.01, 0.5);
    }

    /// Set the calibration multiplier applied to detected frequencies.
    pub fn set_correction(&mut self, correction: f32) {
        self.correction = correction;
    }

    /// Estimate the fundamental of one analysis window.
    ///
    /// `rms` is the window's loudness, used to gate confidence: a clear
    /// periodicity in a near-silent window is still an unreliable pitch.
    pub fn estimate(&mut self, window: &[f32], rms: f32) -> PitchEstimate {
        let max_lag = (window.len() / 2).min(self.difference.len() - 1);
        let min_lag = (self.sample_rate / self.max_frequency as f64) as usize;
        let band_max_lag = ((self.sample_rate / self.min_frequency as f64) as usize).min(max_lag);

        if min_lag >= band_max_lag || min_lag == 0 {
            return PitchEstimate::default();
        }

        self.compute_difference(window, max_lag);
        self.normalize(max_lag);

        let lag = match self.first_dip(min_lag, band_max_lag) {
            Some(lag) => lag,
            None => return PitchEstimate::default(),
        };

        let refined = self.refine(lag, band_max_lag);
        let frequency = (self.sample_rate / refined) as f32 * self.correction;

        // Out-of-band results are misses, not clamped guesses.
        if frequency < self.min_frequency || frequency > self.max_frequency {
            return PitchEstimate::default();
        }

        let clarity = (1.0 - self.normalized[lag]).clamp(0.0, 1.0);
        let loudness_factor = (rms / CONFIDENCE_RMS_REF).sqrt().min(1.0);
        let mut confidence = clarity * loudness_factor;
        if (VOCAL_BAND_LOW..=VOCAL_BAND_HIGH).contains(&frequency) {
            confidence = (confidence * VOCAL_BAND_BOOST).min(1.0);
        }

        if confidence <= 0.0 {
            return PitchEstimate::default();
        }

        let (_, cents_offset) = freq_to_note(frequency);

        PitchEstimate {
            frequency: Some(frequency),
            confidence,
            cents_offset,
        }
    }

    /// d(τ) = Σ (x[j] - x[j+τ])² over half the window, per lag.
    ///
    /// O(W · max_lag) with W fixed and small; bounded cost per frame.
    fn compute_difference(&mut self, window: &[f32], max_lag: usize) {
        let half = window.len() / 2;
        self.difference[0] = 0.0;

        for lag in 1..=max_lag {
            let mut sum = 0.0f32;
            for j in 0..half {
                let delta = window[j] - window[j + lag];
                sum += delta * delta;
            }
            self.difference[lag] = sum;
        }
    }

    /// d'(τ) = d(τ) · τ / Σ_{1..τ} d(j); d'(0) = 1.
    ///
    /// Removes the bias toward long periods that raw d(τ) carries.
    fn normalize(&mut self, max_lag: usize) {
        self.normalized[0] = 1.0;

        let mut running = 0.0f32;
        for lag in 1..=max_lag {
            running += self.difference[lag];
            self.normalized[lag] = if running > f32::EPSILON {
                self.difference[lag] * lag as f32 / running
            } else {
                1.0
            };
        }
    }

    /// First lag below threshold, walked forward to its local minimum.
    ///
    /// Walking past the threshold crossing to the dip bottom rejects the
    /// spurious sub-harmonics that sit just under the threshold ahead of
    /// the true period. Returns `None` when nothing qualifies.
    fn first_dip(&self, min_lag: usize, max_lag: usize) -> Option<usize> {
        let mut lag = min_lag;
        while lag < max_lag {
            if self.normalized[lag] < self.threshold {
                while lag + 1 < max_lag && self.normalized[lag + 1] < self.normalized[lag] {
                    lag += 1;
                }
                return Some(lag);
            }
            lag += 1;
        }
        None
    }

    /// Parabolic fit through the dip's three neighbors for sub-sample lag.
    fn refine(&self, lag: usize, max_lag: usize) -> f64 {
        if lag < 1 || lag + 1 > max_lag {
            return lag as f64;
        }

        let left = self.normalized[lag - 1] as f64;
        let mid = self.normalized[lag] as f64;
        let right = self.normalized[lag + 1] as f64;

        let denom = 2.0 * (2.0 * mid - right - left);
        if denom.abs() > 1e-12 {
            lag as f64 + (right - left) / denom
        } else {
            lag as f64
        }
    }
}

/// Nearest equal-tempered note number and the cents deviation from it.
pub fn freq_to_note(freq: f32) -> (u8, f32) {
    if freq <= 0.0 {
        return (0, 0.0);
    }

    let note_float = 69.0 + 12.0 * (freq / 440.0).log2();
    let note = (note_float.round() as i32).clamp(0, 127) as u8;

    let note_freq = note_to_freq(note);
    let cents = 1200.0 * (freq / note_freq).log2();

    (note, cents)
}

/// Equal-tempered frequency of a note number (A4 = 69 = 440 Hz).
pub fn note_to_freq(note: u8) -> f32 {
    440.0 * 2.0f32.powf((note as f32 - 69.0) / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(sample_rate: f64, freq: f32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                amplitude * (2.0 * std::f32::consts::PI * freq * t).sin()
            })
            .collect()
    }

    fn estimator() -> PitchEstimator {
        PitchEstimator::new(44100.0, 1024, 80.0, 800.0)
    }

    #[test]
    fn test_pure_tones_within_one_percent() {
        let mut est = estimator();
        for freq in [110.0f32, 146.8, 220.0, 329.6, 440.0, 660.0, 784.0] {
            let window = sine(44100.0, freq, 1024, 0.5);
            let result = est.estimate(&window, 0.35);

            let detected = result.frequency.expect("should detect pure tone");
            let error = ((detected - freq) / freq).abs();
            assert!(
                error < 0.01,
                "expected {} Hz, got {} Hz ({}% error)",
                freq,
                detected,
                error * 100.0
            );
        }
    }

    #[test]
    fn test_silence_has_zero_confidence() {
        let mut est = estimator();
        let result = est.estimate(&vec![0.0; 1024], 0.0);
        assert!(result.frequency.is_none());
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_confidence_rises_with_amplitude() {
        let mut est = estimator();
        let mut last = 0.0f32;
        for amplitude in [0.01f32, 0.05, 0.1, 0.3, 0.6] {
            let window = sine(44100.0, 220.0, 1024, amplitude);
            let rms = amplitude / std::f32::consts::SQRT_2;
            let result = est.estimate(&window, rms);
            assert!(
                result.confidence >= last,
                "confidence fell from {} to {} at amplitude {}",
                last,
                result.confidence,
                amplitude
            );
            last = result.confidence;
        }
        assert!(last > 0.5, "loud clean tone should be confident");
    }

    #[test]
    fn test_below_band_reports_no_pitch() {
        let mut est = estimator();
        // 50 Hz rumble: its period does not fit the searched lag range,
        // and no harmonic of it dips the difference function.
        let window = sine(44100.0, 50.0, 1024, 0.5);
        let result = est.estimate(&window, 0.35);
        assert!(result.frequency.is_none());
    }

    #[test]
    fn test_noise_reports_no_pitch() {
        let mut est = estimator();
        // Deterministic broadband junk: no periodicity below threshold.
        let window: Vec<f32> = (0..1024)
            .map(|i| {
                let x = (i as f32 * 12.9898).sin() * 43758.547;
                (x - x.floor()) - 0.5
            })
            .collect();
        let result = est.estimate(&window, 0.3);
        assert!(result.frequency.is_none(), "noise must not produce a guess");
    }

    #[test]
    fn test_cents_offset_small_for_exact_note() {
        let mut est = estimator();
        let window = sine(44100.0, 440.0, 1024, 0.5);
        let result = est.estimate(&window, 0.35);
        assert!(result.frequency.is_some());
        assert!(
            result.cents_offset.abs() < 10.0,
            "cents offset {} too large",
            result.cents_offset
        );
    }

    #[test]
    fn test_correction_factor_scales_result() {
        let mut est = estimator();
        est.set_correction(1.02);
        let window = sine(44100.0, 220.0, 1024, 0.5);
        let result = est.estimate(&window, 0.35);
        let detected = result.frequency.unwrap();
        assert!((detected / 220.0 - 1.02).abs() < 0.01);
    }

    #[test]
    fn test_note_conversion_round_trip() {
        for note in [40u8, 52, 57, 69, 76] {
            let freq = note_to_freq(note);
            let (back, cents) = freq_to_note(freq);
            assert_eq!(back, note);
            assert!(cents.abs() < 0.01);
        }
    }
}

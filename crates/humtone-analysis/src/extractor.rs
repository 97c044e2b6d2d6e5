//! Per-window feature extraction: loudness gate, YIN, spectral features.

use crate::loudness;
use crate::pitch::PitchEstimator;
use crate::spectral::SpectralAnalyzer;
use crate::PitchFrame;

/// Tuning for the extraction stage.
///
/// Constructed once per session; replaced wholesale (never field-mutated
/// mid-frame) to apply live updates.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct DetectorConfig {
    /// YIN absolute threshold (0.01 - 0.5).
    pub yin_threshold: f32,
    /// Frames below this confidence are treated as unvoiced downstream.
    pub confidence_threshold: f32,
    /// Lowest detectable fundamental in Hz.
    pub min_frequency: f32,
    /// Highest detectable fundamental in Hz.
    pub max_frequency: f32,
    /// Calibration multiplier applied to detected frequencies.
    pub frequency_correction: f32,
    /// Analysis window length in samples (power of two).
    pub window_size: usize,
    /// RMS below which the window is treated as silence and analysis is
    /// skipped entirely.
    pub loudness_gate: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            yin_threshold: 0.1,
            confidence_threshold: 0.5,
            min_frequency: 80.0,
            max_frequency: 800.0,
            frequency_correction: 1.0,
            window_size: 1024,
            loudness_gate: 0.01,
        }
    }
}

impl DetectorConfig {
    /// Clamp out-of-range fields to usable values.
    ///
    /// Returns one note per adjusted field so the caller can surface them;
    /// the hot path never sees an unvalidated value.
    pub fn sanitize(&mut self) -> Vec<String> {
        let mut notes = Vec::new();

        if !(0.01..=0.5).contains(&self.yin_threshold) {
            notes.push(format!(
                "yin_threshold {} clamped to 0.01-0.5",
                self.yin_threshold
            ));
            self.yin_threshold = self.yin_threshold.clamp(0.01, 0.5);
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            notes.push(format!(
                "confidence_threshold {} clamped to 0-1",
                self.confidence_threshold
            ));
            self.confidence_threshold = self.confidence_threshold.clamp(0.0, 1.0);
        }
        if self.min_frequency < 20.0 {
            notes.push(format!("min_frequency {} raised to 20", self.min_frequency));
            self.min_frequency = 20.0;
        }
        if self.max_frequency <= self.min_frequency {
            notes.push(format!(
                "max_frequency {} must exceed min_frequency, reset to {}",
                self.max_frequency,
                self.min_frequency * 2.0
            ));
            self.max_frequency = self.min_frequency * 2.0;
        }
        if !(0.5..=2.0).contains(&self.frequency_correction) {
            notes.push(format!(
                "frequency_correction {} reset to 1.0",
                self.frequency_correction
            ));
            self.frequency_correction = 1.0;
        }
        if !self.window_size.is_power_of_two() || !(256..=8192).contains(&self.window_size) {
            notes.push(format!("window_size {} reset to 1024", self.window_size));
            self.window_size = 1024;
        }
        if !(0.0..=0.5).contains(&self.loudness_gate) {
            notes.push(format!(
                "loudness_gate {} clamped to 0-0.5",
                self.loudness_gate
            ));
            self.loudness_gate = self.loudness_gate.clamp(0.0, 0.5);
        }

        notes
    }
}

/// Per-window analysis front end.
///
/// Owns the YIN estimator and the spectral analyzer with their precomputed
/// tables. `analyze()` is allocation-free and has bounded cost, suitable
/// for the real-time producer context.
pub struct FeatureExtractor {
    config: DetectorConfig,
    pitch: PitchEstimator,
    spectral: SpectralAnalyzer,
    sample_rate: f64,
}

impl FeatureExtractor {
    /// Build an extractor. The config should already be sanitized.
    pub fn new(sample_rate: f64, config: DetectorConfig) -> Self {
        let mut pitch = PitchEstimator::new(
            sample_rate,
            config.window_size,
            config.min_frequency,
            config.max_frequency,
        );
        pitch.set_threshold(config.yin_threshold);
        pitch.set_correction(config.frequency_correction);

        Self {
            pitch,
            spectral: SpectralAnalyzer::new(sample_rate, config.window_size),
            sample_rate,
            config,
        }
    }

    /// Swap in a new config snapshot, rebuilding sized state if needed.
    pub fn reconfigure(&mut self, config: DetectorConfig) {
        if config.window_size != self.config.window_size {
            *self = Self::new(self.sample_rate, config);
            return;
        }
        self.pitch = PitchEstimator::new(
            self.sample_rate,
            config.window_size,
            config.min_frequency,
            config.max_frequency,
        );
        self.pitch.set_threshold(config.yin_threshold);
        self.pitch.set_correction(config.frequency_correction);
        self.config = config;
    }

    /// Active configuration.
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Configured window size in samples.
    pub fn window_size(&self) -> usize {
        self.config.window_size
    }

    /// Analyze one window of samples taken at `capture_time_ms`.
    ///
    /// Sub-gate loudness short-circuits both YIN and the FFT and yields a
    /// zero-confidence frame. Inputs are assumed finite (scrubbed on
    /// ingest).
    pub fn analyze(&mut self, window: &[f32], capture_time_ms: f64) -> PitchFrame {
        let rms = loudness::rms(window);
        let volume = loudness::rms_to_volume(rms);

        if rms < self.config.loudness_gate || window.len() < self.config.window_size {
            return PitchFrame::silent(capture_time_ms, volume);
        }

        let mut estimate = self.pitch.estimate(window, rms);
        let timbre = self.spectral.analyze(window);

        // Sub-threshold detections are reported as no pitch at the source,
        // so no consumer ever has to second-guess a weak estimate.
        if estimate.confidence < self.config.confidence_threshold {
            estimate = Default::default();
        }

        PitchFrame {
            frequency: estimate.frequency,
            confidence: estimate.confidence,
            cents_offset: estimate.cents_offset,
            brightness: timbre.brightness,
            breathiness: timbre.breathiness,
            articulation: Default::default(),
            volume,
            capture_time_ms,
        }
    }
}

//! Per-frame conditioning: smoothing plus articulation classification.

use crate::articulation::{ArticulationParams, ArticulationTracker};
use crate::smooth::{CentsKalman, Ema};
use humtone_analysis::{Articulation, PitchFrame};

/// Smoothing coefficients and articulation thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct ConditionerConfig {
    /// Volume smoothing time constant in ms.
    pub volume_time_ms: f32,
    /// Brightness smoothing time constant in ms.
    pub brightness_time_ms: f32,
    /// Breathiness smoothing time constant in ms.
    pub breathiness_time_ms: f32,
    /// Process noise for the cents estimator.
    pub cents_process_noise: f32,
    /// Measurement noise for the cents estimator.
    pub cents_measurement_noise: f32,
    /// Articulation thresholds and durations.
    pub articulation: ArticulationParams,
}

impl Default for ConditionerConfig {
    fn default() -> Self {
        Self {
            volume_time_ms: 12.0,
            brightness_time_ms: 15.0,
            breathiness_time_ms: 20.0,
            cents_process_noise: 0.8,
            cents_measurement_noise: 6.0,
            articulation: ArticulationParams::default(),
        }
    }
}

impl ConditionerConfig {
    /// Clamp out-of-range fields; returns one note per adjusted field.
    pub fn sanitize(&mut self) -> Vec<String> {
        let mut notes = Vec::new();

        for (name, value) in [
            ("volume_time_ms", &mut self.volume_time_ms),
            ("brightness_time_ms", &mut self.brightness_time_ms),
            ("breathiness_time_ms", &mut self.breathiness_time_ms),
        ] {
            if !(0.0..=100.0).contains(value) {
                notes.push(format!("{} {} clamped to 0-100", name, value));
                *value = value.clamp(0.0, 100.0);
            }
        }

        if self.cents_process_noise <= 0.0 {
            notes.push(format!(
                "cents_process_noise {} reset to 0.8",
                self.cents_process_noise
            ));
            self.cents_process_noise = 0.8;
        }
        if self.cents_measurement_noise <= 0.0 {
            notes.push(format!(
                "cents_measurement_noise {} reset to 6.0",
                self.cents_measurement_noise
            ));
            self.cents_measurement_noise = 6.0;
        }

        let a = &mut self.articulation;
        if !(0.0..=1.0).contains(&a.onset_threshold) {
            notes.push(format!(
                "onset_threshold {} clamped to 0-1",
                a.onset_threshold
            ));
            a.onset_threshold = a.onset_threshold.clamp(0.0, 1.0);
        }
        if a.silence_threshold < 0.0 || a.silence_threshold >= a.onset_threshold {
            notes.push(format!(
                "silence_threshold {} reset below onset_threshold",
                a.silence_threshold
            ));
            a.silence_threshold = a.onset_threshold * 0.5;
        }
        if !(0.0..=1000.0).contains(&a.min_attack_ms) {
            notes.push(format!("min_attack_ms {} clamped to 0-1000", a.min_attack_ms));
            a.min_attack_ms = a.min_attack_ms.clamp(0.0, 1000.0);
        }
        if !(0.0..=2000.0).contains(&a.min_release_ms) {
            notes.push(format!(
                "min_release_ms {} clamped to 0-2000",
                a.min_release_ms
            ));
            a.min_release_ms = a.min_release_ms.clamp(0.0, 2000.0);
        }
        if !(0.0..=1.0).contains(&a.reonset_rise) {
            notes.push(format!("reonset_rise {} clamped to 0-1", a.reonset_rise));
            a.reonset_rise = a.reonset_rise.clamp(0.0, 1.0);
        }

        notes
    }
}

/// Smooths raw measurements and classifies note boundaries.
///
/// Frame-to-frame jitter in loudness and timbre is tamed with independent
/// EMAs; pitch deviation goes through the cents estimator. The output
/// frame carries the smoothed values and the articulation state.
pub struct SignalConditioner {
    config: ConditionerConfig,
    frame_rate: f32,
    volume: Ema,
    brightness: Ema,
    breathiness: Ema,
    cents: CentsKalman,
    tracker: ArticulationTracker,
}

impl SignalConditioner {
    /// Create a conditioner. `frame_rate` is the analysis hop rate in Hz.
    pub fn new(frame_rate: f32, config: ConditionerConfig) -> Self {
        Self {
            volume: Ema::from_time_constant(config.volume_time_ms, frame_rate),
            brightness: Ema::from_time_constant(config.brightness_time_ms, frame_rate),
            breathiness: Ema::from_time_constant(config.breathiness_time_ms, frame_rate),
            cents: CentsKalman::new(config.cents_process_noise, config.cents_measurement_noise),
            tracker: ArticulationTracker::new(config.articulation),
            frame_rate,
            config,
        }
    }

    /// Swap in a new config snapshot. Filter histories and the machine
    /// state are preserved so a live update does not click.
    pub fn reconfigure(&mut self, config: ConditionerConfig) {
        self.volume
            .set_time_constant(config.volume_time_ms, self.frame_rate);
        self.brightness
            .set_time_constant(config.brightness_time_ms, self.frame_rate);
        self.breathiness
            .set_time_constant(config.breathiness_time_ms, self.frame_rate);
        self.cents
            .set_noise(config.cents_process_noise, config.cents_measurement_noise);
        self.tracker.set_params(config.articulation);
        self.config = config;
    }

    /// Active configuration.
    pub fn config(&self) -> &ConditionerConfig {
        &self.config
    }

    /// Condition one frame, in arrival order.
    pub fn process(&mut self, frame: PitchFrame) -> PitchFrame {
        let volume = self.volume.process(frame.volume);
        let brightness = self.brightness.process(frame.brightness);
        let breathiness = self.breathiness.process(frame.breathiness);

        let cents_offset = if frame.is_voiced() {
            self.cents.process(frame.cents_offset)
        } else {
            self.cents.current()
        };

        let articulation = self.tracker.advance(volume, frame.capture_time_ms);
        if articulation == Articulation::Silence {
            self.cents.reset();
        }

        PitchFrame {
            volume,
            brightness,
            breathiness,
            cents_offset,
            articulation,
            ..frame
        }
    }

    /// Reset all filter and machine state (voice stopped).
    pub fn reset(&mut self) {
        self.volume.reset();
        self.brightness.reset();
        self.breathiness.reset();
        self.cents.reset();
        self.tracker.reset();
    }
}

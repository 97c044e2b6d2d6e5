//! Mapping conditioned frames onto synthesizer parameter targets.
//!
//! Consumes the conditioned PitchFrame stream and drives the synthesis
//! back-end: oscillator frequency with scale quantization and a
//! retune-speed ramp, loudness to a decibel amplitude, brightness to a
//! filter cutoff, breathiness to a noise-layer gain, and envelope
//! attack/release from articulation transitions.

use crate::backend::{BackendError, SynthBackend};
use crate::scale::{Scale, ScaleMode};
use humtone_analysis::{Articulation, PitchFrame};
use tracing::warn;

/// Input loudness below which the amplitude path emits the silence floor.
const NEAR_SILENCE_INPUT: f32 = 0.01;

/// Fastest retune ramp in ms (retune_speed = 0).
const RETUNE_RAMP_MIN_MS: f32 = 5.0;

/// Additional ramp at retune_speed = 1, in ms.
const RETUNE_RAMP_SPAN_MS: f32 = 95.0;

/// Mapping ranges, ramps, and the auto-tune settings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct MapperConfig {
    /// Blend between raw (0.0) and scale-quantized (1.0) frequency.
    pub auto_tune_strength: f32,
    /// Retune ramp control: 0.0 = robotic snap, 1.0 = slow natural glide.
    pub retune_speed: f32,
    /// Scale root pitch class (0 = C).
    pub scale_root: u8,
    /// Scale mode for quantization.
    pub scale_mode: ScaleMode,
    /// Relative frequency deviation below which an update may be skipped.
    pub jitter_threshold: f32,
    /// Updates closer together than this may be skipped, in ms.
    pub min_update_interval_ms: f64,
    /// Bottom of the amplitude range in dB.
    pub amp_floor_db: f32,
    /// Top of the amplitude range in dB.
    pub amp_ceil_db: f32,
    /// Power-law exponent for the loudness transfer curve.
    pub amp_exponent: f32,
    /// Amplitude for near-silent input, in dB.
    pub silence_floor_db: f32,
    /// Amplitude ramp in ms.
    pub amp_ramp_ms: f32,
    /// Filter cutoff at brightness 0, in Hz. Kept high enough that voiced
    /// harmonics are never muffled.
    pub cutoff_floor_hz: f32,
    /// Filter cutoff at brightness 1, in Hz.
    pub cutoff_ceil_hz: f32,
    /// Filter cutoff ramp in ms.
    pub brightness_ramp_ms: f32,
    /// Noise-layer gain at breathiness 1.
    pub max_noise_gain: f32,
    /// Noise filter center as a multiple of the oscillator frequency.
    pub noise_center_ratio: f32,
    /// Noise ramp in ms.
    pub noise_ramp_ms: f32,
    /// Force-stop a sounding voice after this long without a valid pitch.
    pub silence_timeout_ms: f64,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            auto_tune_strength: 0.8,
            retune_speed: 0.25,
            scale_root: 0,
            scale_mode: ScaleMode::Chromatic,
            jitter_threshold: 0.005,
            min_update_interval_ms: 10.0,
            amp_floor_db: -30.0,
            amp_ceil_db: 0.0,
            amp_exponent: 0.8,
            silence_floor_db: -60.0,
            amp_ramp_ms: 50.0,
            cutoff_floor_hz: 3000.0,
            cutoff_ceil_hz: 12000.0,
            brightness_ramp_ms: 10.0,
            max_noise_gain: 0.4,
            noise_center_ratio: 2.5,
            noise_ramp_ms: 20.0,
            silence_timeout_ms: 300.0,
        }
    }
}

impl MapperConfig {
    /// Clamp out-of-range fields; returns one note per adjusted field.
    pub fn sanitize(&mut self) -> Vec<String> {
        let mut notes = Vec::new();

        for (name, value) in [
            ("auto_tune_strength", &mut self.auto_tune_strength),
            ("retune_speed", &mut self.retune_speed),
        ] {
            if !(0.0..=1.0).contains(value) {
                notes.push(format!("{} {} clamped to 0-1", name, value));
                *value = value.clamp(0.0, 1.0);
            }
        }

        if !(0.0..=0.5).contains(&self.jitter_threshold) {
            notes.push(format!(
                "jitter_threshold {} clamped to 0-0.5",
                self.jitter_threshold
            ));
            self.jitter_threshold = self.jitter_threshold.clamp(0.0, 0.5);
        }
        if !(0.0..=1000.0).contains(&self.min_update_interval_ms) {
            notes.push(format!(
                "min_update_interval_ms {} clamped to 0-1000",
                self.min_update_interval_ms
            ));
            self.min_update_interval_ms = self.min_update_interval_ms.clamp(0.0, 1000.0);
        }
        if self.amp_ceil_db <= self.amp_floor_db {
            notes.push(format!(
                "amp range inverted ({} >= {}), reset to -30..0",
                self.amp_floor_db, self.amp_ceil_db
            ));
            self.amp_floor_db = -30.0;
            self.amp_ceil_db = 0.0;
        }
        if self.amp_exponent <= 0.0 {
            notes.push(format!("amp_exponent {} reset to 0.8", self.amp_exponent));
            self.amp_exponent = 0.8;
        }
        if self.silence_floor_db >= self.amp_floor_db {
            notes.push(format!(
                "silence_floor_db {} must sit below amp_floor_db, reset to -60",
                self.silence_floor_db
            ));
            self.silence_floor_db = -60.0;
        }
        if self.cutoff_floor_hz < 3000.0 {
            notes.push(format!(
                "cutoff_floor_hz {} raised to 3000",
                self.cutoff_floor_hz
            ));
            self.cutoff_floor_hz = 3000.0;
        }
        if self.cutoff_ceil_hz <= self.cutoff_floor_hz {
            notes.push(format!(
                "cutoff_ceil_hz {} must exceed the floor, reset to 12000",
                self.cutoff_ceil_hz
            ));
            self.cutoff_ceil_hz = 12000.0;
        }
        if !(0.0..=1.0).contains(&self.max_noise_gain) {
            notes.push(format!(
                "max_noise_gain {} clamped to 0-1",
                self.max_noise_gain
            ));
            self.max_noise_gain = self.max_noise_gain.clamp(0.0, 1.0);
        }
        if !(0.5..=8.0).contains(&self.noise_center_ratio) {
            notes.push(format!(
                "noise_center_ratio {} reset to 2.5",
                self.noise_center_ratio
            ));
            self.noise_center_ratio = 2.5;
        }
        if !(50.0..=5000.0).contains(&self.silence_timeout_ms) {
            notes.push(format!(
                "silence_timeout_ms {} clamped to 50-5000",
                self.silence_timeout_ms
            ));
            self.silence_timeout_ms = self.silence_timeout_ms.clamp(50.0, 5000.0);
        }
        for (name, value) in [
            ("amp_ramp_ms", &mut self.amp_ramp_ms),
            ("brightness_ramp_ms", &mut self.brightness_ramp_ms),
            ("noise_ramp_ms", &mut self.noise_ramp_ms),
        ] {
            if !(0.0..=500.0).contains(value) {
                notes.push(format!("{} {} clamped to 0-500", name, value));
                *value = value.clamp(0.0, 500.0);
            }
        }

        notes
    }

    /// Retune ramp duration from the configured speed.
    pub fn retune_ramp_ms(&self) -> f32 {
        RETUNE_RAMP_MIN_MS + self.retune_speed * RETUNE_RAMP_SPAN_MS
    }
}

/// Voice lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoicePhase {
    #[default]
    Idle,
    Sounding,
}

/// Mutable voice state owned by the mapper.
#[derive(Debug, Clone, Copy)]
pub struct SynthState {
    /// Frequency most recently applied to the oscillator, in Hz.
    pub oscillator_hz: f32,
    /// Last scale-quantized target, in Hz.
    pub quantized_target: f32,
    /// Voice lifecycle phase.
    pub phase: VoicePhase,
    /// Amplitude most recently applied, in dB.
    pub amplitude_db: f32,
    /// Noise-layer gain most recently applied.
    pub noise_gain: f32,
    last_freq_update_ms: f64,
    last_valid_pitch_ms: Option<f64>,
    last_articulation: Articulation,
}

impl Default for SynthState {
    fn default() -> Self {
        Self {
            oscillator_hz: 0.0,
            quantized_target: 0.0,
            phase: VoicePhase::Idle,
            amplitude_db: -60.0,
            noise_gain: 0.0,
            last_freq_update_ms: f64::NEG_INFINITY,
            last_valid_pitch_ms: None,
            last_articulation: Articulation::Silence,
        }
    }
}

/// Turns the conditioned frame stream into back-end parameter writes.
pub struct SynthesisControlMapper {
    config: MapperConfig,
    scale: Scale,
    state: SynthState,
    backend: Box<dyn SynthBackend>,
}

impl SynthesisControlMapper {
    /// Create a mapper driving `backend`. The config should already be
    /// sanitized.
    pub fn new(config: MapperConfig, backend: Box<dyn SynthBackend>) -> Self {
        Self {
            scale: Scale::new(config.scale_root, config.scale_mode),
            state: SynthState::default(),
            config,
            backend,
        }
    }

    /// Voice lifecycle phase.
    pub fn phase(&self) -> VoicePhase {
        self.state.phase
    }

    /// Current voice state snapshot.
    pub fn state(&self) -> &SynthState {
        &self.state
    }

    /// Active configuration.
    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Swap in a new config snapshot, rebuilding the scale if it changed.
    pub fn reconfigure(&mut self, config: MapperConfig) {
        if config.scale_root != self.config.scale_root || config.scale_mode != self.config.scale_mode
        {
            self.scale = Scale::new(config.scale_root, config.scale_mode);
        }
        self.config = config;
    }

    /// Change the active scale directly (live key/mode switch).
    pub fn set_scale(&mut self, root: u8, mode: ScaleMode) {
        self.config.scale_root = root % 12;
        self.config.scale_mode = mode;
        self.scale = Scale::new(root, mode);
    }

    /// Map one conditioned frame onto back-end parameters, in arrival
    /// order.
    pub fn apply(&mut self, frame: PitchFrame) {
        let t = frame.capture_time_ms;
        let was = self.state.last_articulation;

        if frame.is_voiced() {
            self.state.last_valid_pitch_ms = Some(t);
        }

        let entering_attack = frame.articulation == Articulation::Attack && was != Articulation::Attack;
        let starting = self.state.phase == VoicePhase::Idle && (frame.is_voiced() || entering_attack);
        let active = starting || self.state.phase == VoicePhase::Sounding;

        if active {
            if let Some(raw) = frame.frequency {
                self.update_frequency(raw, t, starting);
            }
            self.update_amplitude(frame.volume);
            self.update_brightness(frame.brightness);
            self.update_breathiness(frame.breathiness);
        }

        if starting || (entering_attack && self.state.phase == VoicePhase::Sounding) {
            // New onset or re-articulation: (re)trigger the attack at the
            // parameters just written, without a stop/start cycle.
            self.backend.trigger_attack();
            self.state.phase = VoicePhase::Sounding;
            if self.state.last_valid_pitch_ms.is_none() {
                // Unpitched onset (breath attack): arm the timeout from here.
                self.state.last_valid_pitch_ms = Some(t);
            }
        } else if was == Articulation::Release
            && frame.articulation == Articulation::Silence
            && self.state.phase == VoicePhase::Sounding
        {
            self.backend.trigger_release();
            self.state.phase = VoicePhase::Idle;
            self.state.last_valid_pitch_ms = None;
        }

        self.check_timeout(t);
        self.state.last_articulation = frame.articulation;
    }

    /// Force-stop the voice if no valid pitch has been seen for the
    /// configured timeout. Called per frame and from the periodic tick, so
    /// a stalled stream is caught too.
    pub fn check_timeout(&mut self, now_ms: f64) {
        if self.state.phase != VoicePhase::Sounding {
            return;
        }
        if let Some(last) = self.state.last_valid_pitch_ms {
            if now_ms - last > self.config.silence_timeout_ms {
                self.force_stop();
            }
        }
    }

    /// Stop the voice immediately (explicit stop or safety net).
    pub fn force_stop(&mut self) {
        if self.state.phase == VoicePhase::Sounding {
            self.backend.stop();
        }
        self.state.phase = VoicePhase::Idle;
        self.state.last_valid_pitch_ms = None;
    }

    /// The instrument/timbre changed: keep the current frequency and
    /// re-trigger the new timbre's envelope at it, seamlessly.
    pub fn retrigger_voice(&mut self) {
        if self.state.phase != VoicePhase::Sounding {
            return;
        }
        let hz = self.state.oscillator_hz;
        ramped_write(self.backend.as_mut(), "frequency", 0.0, |b, ramp| {
            b.set_frequency(hz, ramp)
        });
        self.backend.trigger_attack();
    }

    fn update_frequency(&mut self, raw: f32, now_ms: f64, starting: bool) {
        let quantized = self.scale.quantize(raw);
        let target = raw + (quantized - raw) * self.config.auto_tune_strength;

        if !starting && self.state.oscillator_hz > 0.0 {
            let deviation = (target - self.state.oscillator_hz).abs() / self.state.oscillator_hz;
            let recent = now_ms - self.state.last_freq_update_ms < self.config.min_update_interval_ms;
            // Rate limiter: a tiny correction arriving hot on the heels of
            // the previous write is noise, not intent.
            if deviation < self.config.jitter_threshold && recent {
                return;
            }
        }

        // A fresh onset takes its pitch instantly; corrections glide.
        let ramp_ms = if starting { 0.0 } else { self.config.retune_ramp_ms() };
        ramped_write(self.backend.as_mut(), "frequency", ramp_ms, |b, ramp| {
            b.set_frequency(target, ramp)
        });

        self.state.oscillator_hz = target;
        self.state.quantized_target = quantized;
        self.state.last_freq_update_ms = now_ms;
    }

    fn update_amplitude(&mut self, volume: f32) {
        let db = if volume < NEAR_SILENCE_INPUT {
            self.config.silence_floor_db
        } else {
            let norm = volume.clamp(0.0, 1.0).powf(self.config.amp_exponent);
            self.config.amp_floor_db + norm * (self.config.amp_ceil_db - self.config.amp_floor_db)
        };

        ramped_write(
            self.backend.as_mut(),
            "amplitude",
            self.config.amp_ramp_ms,
            |b, ramp| b.set_amplitude_db(db, ramp),
        );
        self.state.amplitude_db = db;
    }

    fn update_brightness(&mut self, brightness: f32) {
        let cutoff = self.config.cutoff_floor_hz
            + brightness.clamp(0.0, 1.0).sqrt()
                * (self.config.cutoff_ceil_hz - self.config.cutoff_floor_hz);

        ramped_write(
            self.backend.as_mut(),
            "filter cutoff",
            self.config.brightness_ramp_ms,
            |b, ramp| b.set_filter_cutoff(cutoff, ramp),
        );
    }

    fn update_breathiness(&mut self, breathiness: f32) {
        let gain = breathiness.clamp(0.0, 1.0) * self.config.max_noise_gain;
        let center = self.state.oscillator_hz * self.config.noise_center_ratio;

        ramped_write(
            self.backend.as_mut(),
            "noise",
            self.config.noise_ramp_ms,
            |b, ramp| b.set_noise(gain, center, ramp),
        );
        self.state.noise_gain = gain;
    }
}

/// Ramped write with graceful degradation: a rejected ramp is logged and
/// retried as an immediate set, never propagated into the pipeline.
fn ramped_write<F>(backend: &mut dyn SynthBackend, what: &str, ramp_ms: f32, mut write: F)
where
    F: FnMut(&mut dyn SynthBackend, f32) -> Result<(), BackendError>,
{
    if let Err(err) = write(backend, ramp_ms) {
        warn!("{} ramp rejected, applying immediately: {}", what, err);
        if let Err(err) = write(backend, 0.0) {
            warn!("{} immediate set failed, skipping frame: {}", what, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Freq(f32, f32),
        Amp(f32, f32),
        Cutoff(f32, f32),
        Noise(f32, f32, f32),
        Attack,
        Release,
        Stop,
    }

    #[derive(Default)]
    struct Shared {
        calls: Vec<Call>,
        reject_ramped: bool,
    }

    #[derive(Clone)]
    struct MockBackend(Arc<Mutex<Shared>>);

    impl MockBackend {
        fn new() -> (Self, Arc<Mutex<Shared>>) {
            let shared = Arc::new(Mutex::new(Shared::default()));
            (Self(shared.clone()), shared)
        }
    }

    impl SynthBackend for MockBackend {
        fn set_frequency(&mut self, hz: f32, ramp_ms: f32) -> Result<(), BackendError> {
            let mut shared = self.0.lock().unwrap();
            if shared.reject_ramped && ramp_ms > 0.0 {
                return Err(BackendError::Rejected("ramp unsupported".into()));
            }
            shared.calls.push(Call::Freq(hz, ramp_ms));
            Ok(())
        }

        fn set_amplitude_db(&mut self, db: f32, ramp_ms: f32) -> Result<(), BackendError> {
            self.0.lock().unwrap().calls.push(Call::Amp(db, ramp_ms));
            Ok(())
        }

        fn set_filter_cutoff(&mut self, hz: f32, ramp_ms: f32) -> Result<(), BackendError> {
            self.0.lock().unwrap().calls.push(Call::Cutoff(hz, ramp_ms));
            Ok(())
        }

        fn set_noise(&mut self, gain: f32, center: f32, ramp_ms: f32) -> Result<(), BackendError> {
            self.0
                .lock()
                .unwrap()
                .calls
                .push(Call::Noise(gain, center, ramp_ms));
            Ok(())
        }

        fn trigger_attack(&mut self) {
            self.0.lock().unwrap().calls.push(Call::Attack);
        }

        fn trigger_release(&mut self) {
            self.0.lock().unwrap().calls.push(Call::Release);
        }

        fn stop(&mut self) {
            self.0.lock().unwrap().calls.push(Call::Stop);
        }
    }

    fn voiced(hz: f32, volume: f32, articulation: Articulation, t: f64) -> PitchFrame {
        PitchFrame {
            frequency: Some(hz),
            confidence: 0.9,
            volume,
            articulation,
            capture_time_ms: t,
            ..Default::default()
        }
    }

    fn unvoiced(volume: f32, articulation: Articulation, t: f64) -> PitchFrame {
        PitchFrame {
            volume,
            articulation,
            capture_time_ms: t,
            ..Default::default()
        }
    }

    fn freqs(shared: &Arc<Mutex<Shared>>) -> Vec<(f32, f32)> {
        shared
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Freq(hz, ramp) => Some((*hz, *ramp)),
                _ => None,
            })
            .collect()
    }

    fn count(shared: &Arc<Mutex<Shared>>, call: &Call) -> usize {
        shared
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| *c == call)
            .count()
    }

    #[test]
    fn test_auto_tune_off_passes_raw_frequency() {
        let (backend, shared) = MockBackend::new();
        let mut config = MapperConfig::default();
        config.auto_tune_strength = 0.0;
        let mut mapper = SynthesisControlMapper::new(config, Box::new(backend));

        // 227.3 Hz is deliberately off any semitone.
        mapper.apply(voiced(227.3, 0.5, Articulation::Attack, 0.0));

        let written = freqs(&shared);
        assert_eq!(written.len(), 1);
        assert!((written[0].0 - 227.3).abs() < 0.001);
    }

    #[test]
    fn test_auto_tune_full_snaps_to_scale() {
        let (backend, shared) = MockBackend::new();
        let mut config = MapperConfig::default();
        config.auto_tune_strength = 1.0;
        let mut mapper = SynthesisControlMapper::new(config, Box::new(backend));

        let scale = Scale::new(0, ScaleMode::Chromatic);
        mapper.apply(voiced(227.3, 0.5, Articulation::Attack, 0.0));

        let written = freqs(&shared);
        assert!((written[0].0 - scale.quantize(227.3)).abs() < 0.001);
    }

    #[test]
    fn test_retune_ramp_duration_tracks_speed() {
        for (speed, expected) in [(0.0f32, 5.0f32), (1.0, 100.0), (0.5, 52.5)] {
            let mut config = MapperConfig::default();
            config.retune_speed = speed;
            assert!((config.retune_ramp_ms() - expected).abs() < 0.001);
        }
    }

    #[test]
    fn test_onset_sets_pitch_immediately_then_glides() {
        let (backend, shared) = MockBackend::new();
        let mut mapper =
            SynthesisControlMapper::new(MapperConfig::default(), Box::new(backend));

        mapper.apply(voiced(220.0, 0.5, Articulation::Attack, 0.0));
        mapper.apply(voiced(246.9, 0.5, Articulation::Sustain, 50.0));

        let written = freqs(&shared);
        assert_eq!(written[0].1, 0.0, "onset should not glide from nothing");
        assert!(written[1].1 > 0.0, "correction should ramp");
    }

    #[test]
    fn test_jitter_suppression_skips_tiny_recent_updates() {
        let (backend, shared) = MockBackend::new();
        let mut mapper =
            SynthesisControlMapper::new(MapperConfig::default(), Box::new(backend));

        mapper.apply(voiced(220.0, 0.5, Articulation::Attack, 0.0));
        // +0.1% deviation, 5 ms later: both below the limits.
        mapper.apply(voiced(220.2, 0.5, Articulation::Sustain, 5.0));
        assert_eq!(freqs(&shared).len(), 1, "jittery update should be skipped");

        // Same deviation but 15 ms later: interval limit passed, applies.
        mapper.apply(voiced(220.2, 0.5, Articulation::Sustain, 20.0));
        assert_eq!(freqs(&shared).len(), 2);
    }

    #[test]
    fn test_attack_and_release_triggers() {
        let (backend, shared) = MockBackend::new();
        let mut mapper =
            SynthesisControlMapper::new(MapperConfig::default(), Box::new(backend));

        mapper.apply(voiced(220.0, 0.5, Articulation::Attack, 0.0));
        assert_eq!(count(&shared, &Call::Attack), 1);
        assert_eq!(mapper.phase(), VoicePhase::Sounding);

        mapper.apply(voiced(220.0, 0.5, Articulation::Sustain, 50.0));
        mapper.apply(unvoiced(0.02, Articulation::Release, 100.0));
        assert_eq!(count(&shared, &Call::Release), 0, "release decays naturally");

        mapper.apply(unvoiced(0.0, Articulation::Silence, 250.0));
        assert_eq!(count(&shared, &Call::Release), 1);
        assert_eq!(mapper.phase(), VoicePhase::Idle);
    }

    #[test]
    fn test_reattack_retriggers_without_stop() {
        let (backend, shared) = MockBackend::new();
        let mut mapper =
            SynthesisControlMapper::new(MapperConfig::default(), Box::new(backend));

        mapper.apply(voiced(220.0, 0.5, Articulation::Attack, 0.0));
        mapper.apply(voiced(220.0, 0.5, Articulation::Sustain, 50.0));
        mapper.apply(voiced(220.0, 0.7, Articulation::Attack, 100.0));

        assert_eq!(count(&shared, &Call::Attack), 2);
        assert_eq!(count(&shared, &Call::Stop), 0);
        assert_eq!(mapper.phase(), VoicePhase::Sounding);
    }

    #[test]
    fn test_silence_timeout_stops_exactly_once() {
        let (backend, shared) = MockBackend::new();
        let mut mapper =
            SynthesisControlMapper::new(MapperConfig::default(), Box::new(backend));

        mapper.apply(voiced(220.0, 0.5, Articulation::Attack, 0.0));
        assert_eq!(mapper.phase(), VoicePhase::Sounding);

        // Unvoiced frames keep arriving past the 300 ms timeout.
        for i in 1..10 {
            mapper.apply(unvoiced(0.3, Articulation::Sustain, i as f64 * 60.0));
        }

        assert_eq!(count(&shared, &Call::Stop), 1);
        assert_eq!(mapper.phase(), VoicePhase::Idle);
    }

    #[test]
    fn test_tick_timeout_catches_stalled_stream() {
        let (backend, shared) = MockBackend::new();
        let mut mapper =
            SynthesisControlMapper::new(MapperConfig::default(), Box::new(backend));

        mapper.apply(voiced(220.0, 0.5, Articulation::Attack, 0.0));
        // No frames at all; only the periodic tick.
        mapper.check_timeout(200.0);
        assert_eq!(mapper.phase(), VoicePhase::Sounding);
        mapper.check_timeout(350.0);
        assert_eq!(mapper.phase(), VoicePhase::Idle);
        assert_eq!(count(&shared, &Call::Stop), 1);
    }

    #[test]
    fn test_near_silent_input_hits_amp_floor() {
        let (backend, shared) = MockBackend::new();
        let mut mapper =
            SynthesisControlMapper::new(MapperConfig::default(), Box::new(backend));

        mapper.apply(voiced(220.0, 0.5, Articulation::Attack, 0.0));
        mapper.apply(voiced(220.0, 0.005, Articulation::Sustain, 50.0));

        let amps: Vec<f32> = shared
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Amp(db, _) => Some(*db),
                _ => None,
            })
            .collect();
        assert_eq!(amps.last().copied(), Some(-60.0));
    }

    #[test]
    fn test_brightness_maps_to_cutoff_range() {
        let (backend, shared) = MockBackend::new();
        let mut mapper =
            SynthesisControlMapper::new(MapperConfig::default(), Box::new(backend));

        let mut frame = voiced(220.0, 0.5, Articulation::Attack, 0.0);
        frame.brightness = 0.0;
        mapper.apply(frame);

        let cutoffs: Vec<f32> = shared
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Cutoff(hz, _) => Some(*hz),
                _ => None,
            })
            .collect();
        assert!(
            cutoffs[0] >= 3000.0,
            "cutoff floor must keep harmonics audible"
        );
    }

    #[test]
    fn test_breathiness_noise_tracks_pitch() {
        let (backend, shared) = MockBackend::new();
        let mut mapper =
            SynthesisControlMapper::new(MapperConfig::default(), Box::new(backend));

        let mut frame = voiced(200.0, 0.5, Articulation::Attack, 0.0);
        frame.breathiness = 0.5;
        mapper.apply(frame);

        let noise: Vec<(f32, f32)> = shared
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Noise(gain, center, _) => Some((*gain, *center)),
                _ => None,
            })
            .collect();
        let (gain, center) = noise[0];
        assert!((gain - 0.2).abs() < 0.001, "0.5 breathiness at max 0.4");
        assert!((center - 500.0).abs() < 0.1, "center at 2.5x the pitch");
    }

    #[test]
    fn test_rejected_ramp_falls_back_to_immediate() {
        let (backend, shared) = MockBackend::new();
        shared.lock().unwrap().reject_ramped = true;
        let mut mapper =
            SynthesisControlMapper::new(MapperConfig::default(), Box::new(backend));

        mapper.apply(voiced(220.0, 0.5, Articulation::Attack, 0.0));
        mapper.apply(voiced(246.9, 0.5, Articulation::Sustain, 50.0));

        let written = freqs(&shared);
        assert_eq!(written.len(), 2);
        assert_eq!(written[1].1, 0.0, "fallback write must be immediate");
    }

    #[test]
    fn test_instrument_swap_preserves_frequency() {
        let (backend, shared) = MockBackend::new();
        let mut mapper =
            SynthesisControlMapper::new(MapperConfig::default(), Box::new(backend));

        mapper.apply(voiced(220.0, 0.5, Articulation::Attack, 0.0));
        let sounding_hz = mapper.state().oscillator_hz;

        mapper.retrigger_voice();

        let written = freqs(&shared);
        assert_eq!(written.last().copied(), Some((sounding_hz, 0.0)));
        assert_eq!(count(&shared, &Call::Attack), 2);
        assert_eq!(count(&shared, &Call::Stop), 0);
    }

    #[test]
    fn test_idle_voice_ignores_retrigger() {
        let (backend, shared) = MockBackend::new();
        let mut mapper =
            SynthesisControlMapper::new(MapperConfig::default(), Box::new(backend));
        mapper.retrigger_voice();
        assert!(shared.lock().unwrap().calls.is_empty());
    }

    #[test]
    fn test_sanitize_reports_each_violation() {
        let mut config = MapperConfig::default();
        config.auto_tune_strength = 2.0;
        config.cutoff_floor_hz = 100.0;
        config.silence_timeout_ms = 10.0;
        let notes = config.sanitize();
        assert_eq!(notes.len(), 3);
        assert_eq!(config.auto_tune_strength, 1.0);
        assert_eq!(config.cutoff_floor_hz, 3000.0);
        assert_eq!(config.silence_timeout_ms, 50.0);
    }
}

//! The engine wiring: capture input, analysis bridge, control thread.

use crate::config::EngineConfig;
use crate::{Error, Result};
use arc_swap::ArcSwap;
use crossbeam_channel::{bounded, select, Receiver, Sender};
use humtone_analysis::PitchFrame;
use humtone_control::{
    NullBackend, SignalConditioner, SynthBackend, SynthesisControlMapper, VoicePhase,
};
use humtone_stream::{BridgeMode, StreamBridge, Telemetry, TelemetrySnapshot};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Control-thread wakeup interval when no frames arrive. Keeps the
/// silence-timeout safety net armed through a complete stream stall.
const CONTROL_TICK: Duration = Duration::from_millis(50);

/// Depth of the host-command channel into the control thread.
const COMMAND_CHANNEL_CAPACITY: usize = 16;

enum ControlCommand {
    RetriggerVoice,
    StopVoice,
}

/// The complete voice-to-synth pipeline.
///
/// Owns the [`StreamBridge`] (fed from the capture context via
/// [`push_samples`](Self::push_samples)) and the control thread that
/// conditions frames and drives the synthesis back-end. Construction is
/// explicit: collaborators come in through the builder, ownership is
/// expressed in the types.
///
/// # Example
///
/// ```ignore
/// use humtone::{EngineConfig, HumtoneEngine};
///
/// let mut engine = HumtoneEngine::builder()
///     .config(EngineConfig::default())
///     .backend(Box::new(my_synth))
///     .build()?;
///
/// // From the audio capture callback:
/// engine.push_samples(&block);
/// ```
pub struct HumtoneEngine {
    bridge: StreamBridge,
    config: Arc<ArcSwap<EngineConfig>>,
    latest: Arc<ArcSwap<PitchFrame>>,
    telemetry: Arc<Telemetry>,
    cmd_tx: Sender<ControlCommand>,
    control: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
    sounding: Arc<AtomicBool>,
}

impl HumtoneEngine {
    /// Start building an engine.
    pub fn builder() -> HumtoneEngineBuilder {
        HumtoneEngineBuilder::default()
    }

    /// Feed a block of captured mono samples. Real-time safe; call from
    /// the audio capture context.
    pub fn push_samples(&mut self, samples: &[f32]) {
        self.bridge.push_samples(samples);
    }

    /// The most recent conditioned frame (articulation filled in).
    pub fn latest_frame(&self) -> PitchFrame {
        *self.latest.load_full()
    }

    /// Whether a voice is currently sounding.
    pub fn is_sounding(&self) -> bool {
        self.sounding.load(Ordering::Acquire)
    }

    /// Which delivery path the bridge is running.
    pub fn mode(&self) -> BridgeMode {
        self.bridge.mode()
    }

    /// Current telemetry counters.
    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.snapshot()
    }

    /// Active configuration snapshot.
    pub fn config(&self) -> Arc<EngineConfig> {
        self.config.load_full()
    }

    /// Replace the configuration wholesale.
    ///
    /// The snapshot is validated (clamping with warnings) and swapped in
    /// atomically; stages pick it up between frames, and whatever frame is
    /// in flight completes on the old value. The sample rate is fixed for
    /// the session.
    pub fn update_config(&self, mut config: EngineConfig) -> Result<()> {
        config.validate()?;
        if config.sample_rate != self.config.load().sample_rate {
            return Err(Error::InvalidConfig(
                "sample_rate cannot change mid-session".into(),
            ));
        }
        self.bridge.update_config(config.detector.clone());
        self.config.store(Arc::new(config));
        Ok(())
    }

    /// The instrument/timbre changed: re-trigger the envelope at the
    /// current frequency without interrupting the voice.
    pub fn retrigger_voice(&self) {
        let _ = self.cmd_tx.try_send(ControlCommand::RetriggerVoice);
    }

    /// Explicitly stop the sounding voice.
    pub fn stop_voice(&self) {
        let _ = self.cmd_tx.try_send(ControlCommand::StopVoice);
    }

    /// Shut the pipeline down and join the control thread.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.control.take() {
            let _ = handle.join();
        }
        self.bridge.stop();
    }
}

impl Drop for HumtoneEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Builder for [`HumtoneEngine`].
pub struct HumtoneEngineBuilder {
    config: EngineConfig,
    mode: BridgeMode,
    backend: Option<Box<dyn SynthBackend>>,
}

impl Default for HumtoneEngineBuilder {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            mode: BridgeMode::LowLatency,
            backend: None,
        }
    }
}

impl HumtoneEngineBuilder {
    /// Full configuration snapshot. Default: [`EngineConfig::default`].
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Input sample rate in Hz. Default: 44100.
    pub fn sample_rate(mut self, sample_rate: f64) -> Self {
        self.config.sample_rate = sample_rate;
        self
    }

    /// Delivery path. Default: [`BridgeMode::LowLatency`].
    pub fn mode(mut self, mode: BridgeMode) -> Self {
        self.mode = mode;
        self
    }

    /// The synthesis back-end to drive. Default: a [`NullBackend`] that
    /// discards writes (frame stream only).
    pub fn backend(mut self, backend: Box<dyn SynthBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Validate the config, start the bridge and the control thread.
    pub fn build(self) -> Result<HumtoneEngine> {
        let mut config = self.config;
        config.validate()?;

        let backend = self.backend.unwrap_or_else(|| Box::new(NullBackend));
        let bridge = StreamBridge::new(config.sample_rate, config.detector.clone(), self.mode);

        let conditioner = SignalConditioner::new(config.frame_rate(), config.conditioner);
        let mapper = SynthesisControlMapper::new(config.mapper, backend);

        let config = Arc::new(ArcSwap::from_pointee(config));
        let latest = Arc::new(ArcSwap::from_pointee(PitchFrame::default()));
        let running = Arc::new(AtomicBool::new(true));
        let sounding = Arc::new(AtomicBool::new(false));
        let (cmd_tx, cmd_rx) = bounded(COMMAND_CHANNEL_CAPACITY);

        let frames = bridge.frames();
        let telemetry = bridge.telemetry();

        let control = {
            let config = config.clone();
            let latest = latest.clone();
            let running = running.clone();
            let sounding = sounding.clone();
            std::thread::Builder::new()
                .name("humtone-control".into())
                .spawn(move || {
                    run_control_loop(
                        frames, cmd_rx, conditioner, mapper, config, latest, running, sounding,
                    );
                })?
        };

        Ok(HumtoneEngine {
            bridge,
            config,
            latest,
            telemetry,
            cmd_tx,
            control: Some(control),
            running,
            sounding,
        })
    }
}

/// Consumer loop: condition and map frames strictly in arrival order,
/// observe config swaps between frames, and keep the silence-timeout
/// safety net ticking even when the stream stalls.
#[allow(clippy::too_many_arguments)]
fn run_control_loop(
    frames: Receiver<PitchFrame>,
    cmd_rx: Receiver<ControlCommand>,
    mut conditioner: SignalConditioner,
    mut mapper: SynthesisControlMapper,
    config: Arc<ArcSwap<EngineConfig>>,
    latest: Arc<ArcSwap<PitchFrame>>,
    running: Arc<AtomicBool>,
    sounding: Arc<AtomicBool>,
) {
    let mut config_seen = config.load_full();
    let mut last_frame_wall = Instant::now();
    let mut last_frame_ms = 0.0f64;

    while running.load(Ordering::Acquire) {
        select! {
            recv(frames) -> msg => {
                let frame = match msg {
                    Ok(frame) => frame,
                    Err(_) => break,
                };

                let current = config.load_full();
                if !Arc::ptr_eq(&current, &config_seen) {
                    conditioner.reconfigure(current.conditioner);
                    mapper.reconfigure(current.mapper);
                    config_seen = current;
                }

                let conditioned = conditioner.process(frame);
                latest.store(Arc::new(conditioned));
                mapper.apply(conditioned);

                last_frame_wall = Instant::now();
                last_frame_ms = conditioned.capture_time_ms;
                sounding.store(mapper.phase() == VoicePhase::Sounding, Ordering::Release);
            }
            recv(cmd_rx) -> msg => {
                match msg {
                    Ok(ControlCommand::RetriggerVoice) => mapper.retrigger_voice(),
                    Ok(ControlCommand::StopVoice) => {
                        mapper.force_stop();
                        conditioner.reset();
                    }
                    Err(_) => break,
                }
                sounding.store(mapper.phase() == VoicePhase::Sounding, Ordering::Release);
            }
            default(CONTROL_TICK) => {
                // No frames: extrapolate the frame clock by wall time so a
                // complete stall still trips the timeout.
                let now_ms = last_frame_ms + last_frame_wall.elapsed().as_secs_f64() * 1000.0;
                mapper.check_timeout(now_ms);
                sounding.store(mapper.phase() == VoicePhase::Sounding, Ordering::Release);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / 44100.0;
                amplitude * (2.0 * std::f32::consts::PI * freq * t).sin()
            })
            .collect()
    }

    #[test]
    fn test_engine_builds_and_stops() {
        let mut engine = HumtoneEngine::builder().build().unwrap();
        assert_eq!(engine.mode(), BridgeMode::LowLatency);
        assert!(!engine.is_sounding());
        engine.stop();
    }

    #[test]
    fn test_engine_tracks_a_tone() {
        let mut engine = HumtoneEngine::builder().build().unwrap();

        let samples = sine(220.0, 22050, 0.5);
        for block in samples.chunks(128) {
            engine.push_samples(block);
        }

        // Let the control thread drain.
        let mut frame = PitchFrame::default();
        for _ in 0..100 {
            frame = engine.latest_frame();
            if frame.is_voiced() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }

        assert!(frame.is_voiced(), "no voiced frame observed");
        let hz = frame.frequency.unwrap();
        assert!((hz - 220.0).abs() < 5.0, "got {} Hz", hz);
        assert!(engine.telemetry().frames_analyzed > 0);
        engine.stop();
    }

    #[test]
    fn test_update_config_keeps_sample_rate_fixed() {
        let engine = HumtoneEngine::builder().build().unwrap();

        let mut config = EngineConfig::default();
        config.mapper.auto_tune_strength = 0.2;
        assert!(engine.update_config(config).is_ok());
        assert_eq!(engine.config().mapper.auto_tune_strength, 0.2);

        let mut config = EngineConfig::default();
        config.sample_rate = 48000.0;
        assert!(engine.update_config(config).is_err());
    }

    #[test]
    fn test_rejected_build_on_bad_sample_rate() {
        let result = HumtoneEngine::builder().sample_rate(100.0).build();
        assert!(result.is_err());
    }
}

//! The seam to the external synthesis engine.

use thiserror::Error;

/// A rejected or failed parameter write on the synthesis back-end.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The back-end refused the ramp target (out of range, voice gone).
    #[error("parameter write rejected: {0}")]
    Rejected(String),
    /// The back-end is not available (device lost, not initialized).
    #[error("synthesis back-end unavailable: {0}")]
    Unavailable(String),
}

/// Synthesis back-end driven by the control mapper.
///
/// All parameter writes are ramped; `ramp_ms == 0.0` means set
/// immediately. Implementations must tolerate redundant writes; the
/// mapper rate-limits but does not deduplicate exactly.
///
/// A write returning an error is handled at the mapping boundary (logged,
/// retried as an immediate set); it never propagates into the frame
/// pipeline.
pub trait SynthBackend: Send {
    /// Ramp the oscillator frequency to `hz` over `ramp_ms`.
    fn set_frequency(&mut self, hz: f32, ramp_ms: f32) -> Result<(), BackendError>;

    /// Ramp the output amplitude to `db` over `ramp_ms`.
    fn set_amplitude_db(&mut self, db: f32, ramp_ms: f32) -> Result<(), BackendError>;

    /// Ramp the filter cutoff to `hz` over `ramp_ms`.
    fn set_filter_cutoff(&mut self, hz: f32, ramp_ms: f32) -> Result<(), BackendError>;

    /// Ramp the noise layer to `gain`, centered at `center_hz`.
    fn set_noise(&mut self, gain: f32, center_hz: f32, ramp_ms: f32) -> Result<(), BackendError>;

    /// Begin (or re-begin) the envelope attack at the current parameters.
    fn trigger_attack(&mut self);

    /// Begin the envelope release.
    fn trigger_release(&mut self);

    /// Stop the voice outright.
    fn stop(&mut self);
}

/// Back-end that accepts and discards everything.
///
/// Stands in for the synthesis collaborator in tests and in headless
/// setups where only the PitchFrame stream is consumed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBackend;

impl SynthBackend for NullBackend {
    fn set_frequency(&mut self, _hz: f32, _ramp_ms: f32) -> Result<(), BackendError> {
        Ok(())
    }

    fn set_amplitude_db(&mut self, _db: f32, _ramp_ms: f32) -> Result<(), BackendError> {
        Ok(())
    }

    fn set_filter_cutoff(&mut self, _hz: f32, _ramp_ms: f32) -> Result<(), BackendError> {
        Ok(())
    }

    fn set_noise(&mut self, _gain: f32, _center_hz: f32, _ramp_ms: f32) -> Result<(), BackendError> {
        Ok(())
    }

    fn trigger_attack(&mut self) {}

    fn trigger_release(&mut self) {}

    fn stop(&mut self) {}
}

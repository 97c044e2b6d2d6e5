//! # humtone-control
//!
//! The control half of the humtone pipeline:
//!
//! - **[`SignalConditioner`]** - smooths raw measurements (EMA per channel,
//!   a scalar Kalman estimator for pitch deviation) and classifies note
//!   boundaries from the loudness envelope
//! - **[`SynthesisControlMapper`]** - turns the conditioned stream into
//!   synthesizer parameter targets: scale-quantized frequency with
//!   portamento-style retune ramps, amplitude in dB, filter cutoff from
//!   brightness, noise gain from breathiness, and envelope triggering from
//!   articulation transitions
//! - **[`SynthBackend`]** - the trait seam to the external synthesis
//!   engine; writes are ramped, and rejected writes degrade to immediate
//!   sets rather than halting the pipeline
//!
//! Both stages consume [`PitchFrame`](humtone_analysis::PitchFrame) values
//! strictly in arrival order; articulation transitions depend on it.

pub mod articulation;
pub mod backend;
pub mod conditioner;
pub mod mapper;
pub mod scale;
pub mod smooth;

pub use articulation::{ArticulationParams, ArticulationTracker};
pub use backend::{BackendError, NullBackend, SynthBackend};
pub use conditioner::{ConditionerConfig, SignalConditioner};
pub use mapper::{MapperConfig, SynthState, SynthesisControlMapper, VoicePhase};
pub use scale::{Scale, ScaleMode};
pub use smooth::{time_to_coeff, CentsKalman, Ema};

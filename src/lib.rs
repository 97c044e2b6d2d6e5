//! # humtone - voice-to-synth control engine
//!
//! Converts a monophonic voice or hum into a continuous stream of musical
//! control parameters and drives a synthesis back-end from it, keeping
//! signal-to-sound latency in the tens of milliseconds.
//!
//! ## Architecture
//!
//! humtone is an umbrella crate coordinating three subsystems:
//!
//! - **humtone-analysis** - per-window feature extraction: YIN pitch,
//!   spectral brightness/breathiness, RMS loudness
//! - **humtone-control** - signal conditioning (smoothing, articulation)
//!   and synthesis mapping (auto-tune, portamento ramps, amplitude/filter/
//!   noise targets, envelope triggering)
//! - **humtone-stream** - the real-time boundary: sample windowing, the
//!   bounded frame channel, telemetry, and the buffered fallback path
//!
//! Data flows one direction: raw samples → [`StreamBridge`] →
//! [`SignalConditioner`] → [`SynthesisControlMapper`] → back-end parameter
//! writes. Configuration flows the other way, as atomically swapped
//! [`EngineConfig`] snapshots.
//!
//! ## Quick Start
//!
//! ```ignore
//! use humtone::{EngineConfig, HumtoneEngine, ScaleMode};
//!
//! let mut config = EngineConfig::default();
//! config.mapper.scale_root = 9; // A
//! config.mapper.scale_mode = ScaleMode::Minor;
//!
//! let mut engine = HumtoneEngine::builder()
//!     .config(config)
//!     .backend(Box::new(my_synth))
//!     .build()?;
//!
//! // From the audio capture callback:
//! engine.push_samples(&block);
//! ```

/// Re-export of humtone-analysis for direct access.
pub use humtone_analysis as analysis;
/// Re-export of humtone-control for direct access.
pub use humtone_control as control;
/// Re-export of humtone-stream for direct access.
pub use humtone_stream as stream;

// Frame types
pub use humtone_analysis::{Articulation, DetectorConfig, FeatureExtractor, PitchFrame};

// Conditioning and mapping
pub use humtone_control::{
    ArticulationParams, BackendError, ConditionerConfig, MapperConfig, NullBackend, Scale,
    ScaleMode, SignalConditioner, SynthBackend, SynthesisControlMapper, VoicePhase,
};

// Streaming layer
pub use humtone_stream::{BridgeMode, StreamBridge, Telemetry, TelemetrySnapshot};

mod config;
pub use config::EngineConfig;

mod engine;
pub use engine::{HumtoneEngine, HumtoneEngineBuilder};

mod error;
pub use error::{Error, Result};

//! # humtone-analysis
//!
//! Per-window voice feature extraction for the humtone engine:
//!
//! - **Pitch**: monophonic fundamental-frequency tracking (YIN)
//! - **Timbre**: spectral centroid (brightness) and flatness (breathiness)
//! - **Loudness**: RMS level and input scrubbing
//! - **[`FeatureExtractor`]**: the per-window front end combining them
//!
//! Everything operates on raw `&[f32]` mono sample windows. All buffers and
//! FFT tables are allocated at construction; the analysis path is
//! allocation-free and bounded, so it can run in the real-time producer
//! context.
//!
//! A detection miss is not an error: windows with no periodic signal (or
//! below the loudness gate) yield a zero-confidence [`PitchFrame`] with no
//! frequency, and the pipeline recovers on the next window.

pub mod extractor;
pub mod frame;
pub mod loudness;
pub mod pitch;
pub mod spectral;

pub use extractor::{DetectorConfig, FeatureExtractor};
pub use frame::{Articulation, PitchFrame};
pub use pitch::{freq_to_note, note_to_freq, PitchEstimate, PitchEstimator};
pub use spectral::{SpectralAnalyzer, SpectralFeatures};

//! Session configuration for the whole pipeline.

use crate::{Error, Result};
use humtone_analysis::DetectorConfig;
use humtone_control::{ConditionerConfig, MapperConfig};
use tracing::warn;

/// Everything tunable in one immutable record.
///
/// Constructed once at session start from host-supplied settings. Live
/// updates replace the whole snapshot via
/// [`HumtoneEngine::update_config`](crate::HumtoneEngine::update_config) -
/// never field mutation visible to an in-flight frame.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct EngineConfig {
    /// Input sample rate in Hz.
    pub sample_rate: f64,
    /// Feature extraction (YIN, spectral, loudness gate).
    pub detector: DetectorConfig,
    /// Smoothing and articulation.
    pub conditioner: ConditionerConfig,
    /// Synthesis parameter mapping and auto-tune.
    pub mapper: MapperConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            detector: DetectorConfig::default(),
            conditioner: ConditionerConfig::default(),
            mapper: MapperConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Validate the snapshot before it reaches the hot path.
    ///
    /// An unusable sample rate is a hard error; out-of-range component
    /// fields are clamped in place and surfaced as warnings.
    pub fn validate(&mut self) -> Result<()> {
        if self.sample_rate < 8000.0 || self.sample_rate > 384000.0 {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} out of range (8000-384000 Hz)",
                self.sample_rate
            )));
        }

        for note in self.detector.sanitize() {
            warn!("detector config: {}", note);
        }
        for note in self.conditioner.sanitize() {
            warn!("conditioner config: {}", note);
        }
        for note in self.mapper.sanitize() {
            warn!("mapper config: {}", note);
        }

        Ok(())
    }

    /// Analysis frame rate in Hz implied by this config (half-window hop).
    pub fn frame_rate(&self) -> f32 {
        (self.sample_rate / (self.detector.window_size / 2) as f64) as f32
    }
}

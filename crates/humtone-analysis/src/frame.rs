//! The per-window analysis result passed between pipeline stages.

/// Note-boundary phase inferred from the loudness envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum Articulation {
    /// No note sounding.
    #[default]
    Silence,
    /// Note onset in progress.
    Attack,
    /// Note holding.
    Sustain,
    /// Note decaying toward silence.
    Release,
}

/// One analysis window's worth of extracted voice features.
///
/// Immutable value message: frames are copied, never shared, across the
/// real-time boundary. `frequency` is `Some` only when `confidence > 0`;
/// consumers must treat unvoiced frames as "no pitch" rather than holding
/// stale values.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct PitchFrame {
    /// Detected fundamental in Hz, `None` when no periodic signal was found.
    pub frequency: Option<f32>,
    /// Detection reliability (0.0 - 1.0).
    pub confidence: f32,
    /// Deviation from the nearest equal-tempered semitone, in cents.
    pub cents_offset: f32,
    /// Normalized spectral centroid (0.0 - 1.0).
    pub brightness: f32,
    /// Normalized spectral flatness (0.0 - 1.0).
    pub breathiness: f32,
    /// Note phase; the extractor emits `Silence`, the conditioner fills
    /// this in from the loudness envelope.
    pub articulation: Articulation,
    /// RMS-derived loudness (0.0 - 1.0).
    pub volume: f32,
    /// Sample-clock timestamp of the window's first sample, in ms.
    pub capture_time_ms: f64,
}

impl PitchFrame {
    /// Check if a pitch was confidently detected.
    pub fn is_voiced(&self) -> bool {
        self.frequency.is_some() && self.confidence > 0.0
    }

    /// An unvoiced frame carrying only loudness and a timestamp.
    pub fn silent(capture_time_ms: f64, volume: f32) -> Self {
        Self {
            volume,
            capture_time_ms,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_frame_is_unvoiced() {
        let frame = PitchFrame::default();
        assert!(!frame.is_voiced());
        assert_eq!(frame.articulation, Articulation::Silence);
    }

    #[test]
    fn test_silent_frame_keeps_loudness() {
        let frame = PitchFrame::silent(125.0, 0.02);
        assert!(!frame.is_voiced());
        assert_eq!(frame.volume, 0.02);
        assert_eq!(frame.capture_time_ms, 125.0);
    }

    #[test]
    fn test_voiced_requires_confidence() {
        let frame = PitchFrame {
            frequency: Some(220.0),
            confidence: 0.9,
            ..Default::default()
        };
        assert!(frame.is_voiced());
    }
}

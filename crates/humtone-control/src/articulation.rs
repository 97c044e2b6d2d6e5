//! Note-boundary classification from the loudness envelope.
//!
//! A four-state machine over (loudness, time) only. Pitch never enters the
//! decision: a detector dropout mid-note must not read as a note ending.

use humtone_analysis::Articulation;

/// Thresholds and minimum durations for the articulation machine.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct ArticulationParams {
    /// Loudness at or above which a note onset is declared.
    pub onset_threshold: f32,
    /// Loudness below which a sounding note starts releasing.
    pub silence_threshold: f32,
    /// Time spent in Attack before settling into Sustain.
    pub min_attack_ms: f64,
    /// How long the release condition must persist before Silence.
    pub min_release_ms: f64,
    /// Loudness rise between consecutive frames that re-triggers Attack
    /// mid-note (tonguing / re-articulation).
    pub reonset_rise: f32,
}

impl Default for ArticulationParams {
    fn default() -> Self {
        Self {
            onset_threshold: 0.1,
            silence_threshold: 0.05,
            min_attack_ms: 40.0,
            min_release_ms: 120.0,
            reonset_rise: 0.15,
        }
    }
}

/// Articulation state machine.
///
/// Deterministic given the (loudness, time) sequence it is fed. Time comes
/// from frame capture timestamps, so behavior is reproducible offline.
#[derive(Debug, Clone)]
pub struct ArticulationTracker {
    params: ArticulationParams,
    state: Articulation,
    state_entered_ms: f64,
    last_volume: f32,
}

impl ArticulationTracker {
    pub fn new(params: ArticulationParams) -> Self {
        Self {
            params,
            state: Articulation::Silence,
            state_entered_ms: 0.0,
            last_volume: 0.0,
        }
    }

    /// Current state without advancing.
    pub fn state(&self) -> Articulation {
        self.state
    }

    /// Replace the thresholds; the machine state itself is preserved.
    pub fn set_params(&mut self, params: ArticulationParams) {
        self.params = params;
    }

    /// Reset to Silence.
    pub fn reset(&mut self) {
        self.state = Articulation::Silence;
        self.state_entered_ms = 0.0;
        self.last_volume = 0.0;
    }

    /// Advance the machine with one loudness observation.
    pub fn advance(&mut self, volume: f32, time_ms: f64) -> Articulation {
        let p = self.params;
        let rise = volume - self.last_volume;

        let next = match self.state {
            Articulation::Silence => {
                if volume >= p.onset_threshold {
                    Articulation::Attack
                } else {
                    Articulation::Silence
                }
            }
            Articulation::Attack => {
                if time_ms - self.state_entered_ms >= p.min_attack_ms {
                    Articulation::Sustain
                } else {
                    Articulation::Attack
                }
            }
            Articulation::Sustain => {
                if rise >= p.reonset_rise && volume >= p.onset_threshold {
                    // Re-articulation: a fresh push mid-note.
                    Articulation::Attack
                } else if volume < p.silence_threshold {
                    Articulation::Release
                } else {
                    Articulation::Sustain
                }
            }
            Articulation::Release => {
                if rise >= p.reonset_rise && volume >= p.onset_threshold {
                    Articulation::Attack
                } else if volume >= p.silence_threshold {
                    // Transient dip, not an ending.
                    Articulation::Sustain
                } else if time_ms - self.state_entered_ms >= p.min_release_ms {
                    Articulation::Silence
                } else {
                    Articulation::Release
                }
            }
        };

        if next != self.state {
            self.state = next;
            self.state_entered_ms = time_ms;
        }
        self.last_volume = volume;
        self.state
    }
}

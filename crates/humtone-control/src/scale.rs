//! Musical scales and pitch quantization for auto-tune.
//!
//! A [`Scale`] precomputes a 128-note frequency table and a membership
//! mask at construction, so quantization in the control path is a bounded
//! table walk with no transcendental math beyond the initial note mapping.

use humtone_analysis::pitch::note_to_freq;

/// Scale family, as semitone intervals from the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum ScaleMode {
    /// All twelve semitones (quantizes to the nearest semitone).
    #[default]
    Chromatic,
    Major,
    Minor,
    /// Major pentatonic.
    Pentatonic,
    Blues,
}

impl ScaleMode {
    /// Member pitch classes relative to the root.
    pub fn intervals(&self) -> &'static [u8] {
        match self {
            ScaleMode::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
            ScaleMode::Major => &[0, 2, 4, 5, 7, 9, 11],
            ScaleMode::Minor => &[0, 2, 3, 5, 7, 8, 10],
            ScaleMode::Pentatonic => &[0, 2, 4, 7, 9],
            ScaleMode::Blues => &[0, 3, 5, 6, 7, 10],
        }
    }
}

/// An active scale: root pitch class plus mode, with precomputed lookup
/// tables for real-time quantization.
#[derive(Debug, Clone)]
pub struct Scale {
    root: u8,
    mode: ScaleMode,
    freq_table: [f32; 128],
    member: [bool; 128],
}

impl Scale {
    /// Create a scale from a root pitch class (0 = C, 9 = A) and a mode.
    pub fn new(root: u8, mode: ScaleMode) -> Self {
        let root = root % 12;
        let intervals = mode.intervals();

        let mut freq_table = [0.0f32; 128];
        let mut member = [false; 128];
        for note in 0..128u8 {
            freq_table[note as usize] = note_to_freq(note);
            let pitch_class = (note + 12 - root) % 12;
            member[note as usize] = intervals.contains(&pitch_class);
        }

        Self {
            root,
            mode,
            freq_table,
            member,
        }
    }

    pub fn root(&self) -> u8 {
        self.root
    }

    pub fn mode(&self) -> ScaleMode {
        self.mode
    }

    /// Nearest legal scale frequency to `hz`.
    ///
    /// Distance is measured in log-frequency (cents), so "nearest" matches
    /// what a listener hears. Quantizing a frequency already on the scale
    /// returns it unchanged (within interpolation tolerance).
    pub fn quantize(&self, hz: f32) -> f32 {
        if hz <= 0.0 {
            return hz;
        }

        let fractional = 69.0 + 12.0 * (hz / 440.0).log2();
        let center = (fractional.round() as i32).clamp(0, 127);

        let mut best: Option<(f32, usize)> = None;
        // Every mode has a member within 6 semitones of any note.
        for offset in -6i32..=6 {
            let note = center + offset;
            if !(0..=127).contains(&note) {
                continue;
            }
            let note = note as usize;
            if !self.member[note] {
                continue;
            }
            let distance = (fractional - note as f32).abs();
            match best {
                Some((d, _)) if d <= distance => {}
                _ => best = Some((distance, note)),
            }
        }

        match best {
            Some((_, note)) => self.freq_table[note],
            None => hz,
        }
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::new(0, ScaleMode::Chromatic)
    }
}

//! Spectral timbre features: brightness and breathiness.
//!
//! Brightness is the amplitude-weighted mean frequency (spectral centroid)
//! normalized by Nyquist; breathiness is the ratio of geometric to
//! arithmetic mean magnitude (spectral flatness). A pure sung tone scores
//! low on both; a whispered or breathy tone pushes flatness up.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Floor added to magnitudes before the log in the geometric mean.
const FLATNESS_EPSILON: f32 = 1e-10;

/// Timbre features for one analysis window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpectralFeatures {
    /// Normalized spectral centroid (0.0 - 1.0).
    pub brightness: f32,
    /// Spectral flatness (0.0 - 1.0).
    pub breathiness: f32,
}

/// FFT-based spectral feature analyzer.
///
/// The forward plan (with its twiddle and bit-reversal tables), the Hann
/// window, and all work buffers are built once at construction; `analyze()`
/// does no allocation.
pub struct SpectralAnalyzer {
    size: usize,
    sample_rate: f64,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
}

impl SpectralAnalyzer {
    /// Create an analyzer for a fixed window size.
    pub fn new(sample_rate: f64, size: usize) -> Self {
        let size = size.next_power_of_two();
        let fft = FftPlanner::new().plan_fft_forward(size);
        let scratch_len = fft.get_inplace_scratch_len();

        Self {
            size,
            sample_rate,
            window: hann_window(size),
            buffer: vec![Complex::new(0.0, 0.0); size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            magnitudes: vec![0.0; size / 2],
            fft,
        }
    }

    /// Window size in samples.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Compute brightness and breathiness for one window of samples.
    ///
    /// Samples beyond `size()` are ignored; a shorter input is zero-padded.
    pub fn analyze(&mut self, samples: &[f32]) -> SpectralFeatures {
        let n = samples.len().min(self.size);
        for i in 0..n {
            self.buffer[i] = Complex::new(samples[i] * self.window[i], 0.0);
        }
        for slot in self.buffer[n..].iter_mut() {
            *slot = Complex::new(0.0, 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        for (i, slot) in self.magnitudes.iter_mut().enumerate() {
            *slot = self.buffer[i].norm();
        }

        SpectralFeatures {
            brightness: self.centroid(),
            breathiness: self.flatness(),
        }
    }

    /// Amplitude-weighted mean frequency, normalized by Nyquist.
    fn centroid(&self) -> f32 {
        let bin_hz = self.sample_rate as f32 / self.size as f32;
        let nyquist = self.sample_rate as f32 * 0.5;

        let mut weighted = 0.0f32;
        let mut total = 0.0f32;
        for (i, &mag) in self.magnitudes.iter().enumerate() {
            weighted += i as f32 * bin_hz * mag;
            total += mag;
        }

        if total <= f32::EPSILON {
            return 0.0;
        }
        (weighted / total / nyquist).clamp(0.0, 1.0)
    }

    /// Geometric over arithmetic mean magnitude, skipping the DC bin.
    fn flatness(&self) -> f32 {
        let bins = &self.magnitudes[1..];
        if bins.is_empty() {
            return 0.0;
        }

        let mut log_sum = 0.0f32;
        let mut sum = 0.0f32;
        for &mag in bins {
            log_sum += (mag + FLATNESS_EPSILON).ln();
            sum += mag;
        }

        let arithmetic = sum / bins.len() as f32;
        if arithmetic <= f32::EPSILON {
            return 0.0;
        }

        let geometric = (log_sum / bins.len() as f32).exp();
        (geometric / arithmetic).clamp(0.0, 1.0)
    }
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let angle = 2.0 * core::f32::consts::PI * i as f32 / (size - 1) as f32;
            0.5 * (1.0 - angle.cos())
        })
        .collect()
}

//! Fixed analysis windows from arbitrarily-sized sample blocks.

/// Circular accumulator producing fixed windows with 50% overlap.
///
/// The capture source delivers blocks of whatever size its transport uses
/// (as small as 128 samples); analysis wants a fixed window advanced by
/// half-window hops. Samples are scrubbed on ingest so no NaN/Inf ever
/// reaches the analyzers.
#[derive(Debug)]
pub struct AnalysisWindow {
    buffer: Vec<f32>,
    assembled: Vec<f32>,
    size: usize,
    hop: usize,
    written: u64,
    hop_counter: usize,
}

impl AnalysisWindow {
    pub fn new(size: usize) -> Self {
        Self {
            buffer: vec![0.0; size],
            assembled: vec![0.0; size],
            size,
            hop: size / 2,
            written: 0,
            hop_counter: 0,
        }
    }

    /// Window length in samples.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Total samples ingested.
    pub fn samples_written(&self) -> u64 {
        self.written
    }

    /// Ingest one sample.
    ///
    /// Returns the index of the completed window's first sample when a new
    /// window is ready; fetch it with [`assembled()`](Self::assembled).
    #[inline]
    pub fn write(&mut self, sample: f32) -> Option<u64> {
        let sample = if sample.is_finite() { sample } else { 0.0 };

        self.buffer[(self.written % self.size as u64) as usize] = sample;
        self.written += 1;
        self.hop_counter += 1;

        if self.written >= self.size as u64 && self.hop_counter >= self.hop {
            self.hop_counter = 0;
            self.assemble();
            Some(self.written - self.size as u64)
        } else {
            None
        }
    }

    /// The most recently completed window, in temporal order.
    pub fn assembled(&self) -> &[f32] {
        &self.assembled
    }

    /// Drop any partially accumulated state.
    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.assembled.fill(0.0);
        self.written = 0;
        self.hop_counter = 0;
    }

    /// Unroll the circular buffer into a contiguous window.
    fn assemble(&mut self) {
        let split = (self.written % self.size as u64) as usize;
        self.assembled[..self.size - split].copy_from_slice(&self.buffer[split..]);
        self.assembled[self.size - split..].copy_from_slice(&self.buffer[..split]);
    }
}

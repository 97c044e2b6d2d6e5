//! Frame-rate smoothers for the conditioned control signal.

/// One-pole exponential moving average.
///
/// The coefficient comes from a time constant and the frame rate, the same
/// `exp(-1/(t · rate))` mapping used for envelope attack/release times.
/// The first observation primes the filter so a voice does not fade in
/// from zero.
#[derive(Debug, Clone)]
pub struct Ema {
    coeff: f32,
    value: f32,
    primed: bool,
}

impl Ema {
    /// Create a smoother with a time constant in milliseconds at a given
    /// update rate in Hz.
    pub fn from_time_constant(time_ms: f32, update_rate: f32) -> Self {
        Self {
            coeff: time_to_coeff(time_ms * 0.001, update_rate),
            value: 0.0,
            primed: false,
        }
    }

    /// Feed one observation, returning the smoothed value.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        if self.primed {
            self.value = self.coeff * self.value + (1.0 - self.coeff) * input;
        } else {
            self.value = input;
            self.primed = true;
        }
        self.value
    }

    /// Current smoothed value.
    #[inline]
    pub fn current(&self) -> f32 {
        self.value
    }

    /// Change the time constant, keeping the current value and history.
    pub fn set_time_constant(&mut self, time_ms: f32, update_rate: f32) {
        self.coeff = time_to_coeff(time_ms * 0.001, update_rate);
    }

    /// Forget all history.
    pub fn reset(&mut self) {
        self.value = 0.0;
        self.primed = false;
    }
}

/// Smoothing coefficient for a time constant in seconds at `rate` updates
/// per second.
#[inline]
pub fn time_to_coeff(time_secs: f32, rate: f32) -> f32 {
    if time_secs <= 0.0 {
        0.0
    } else {
        (-1.0 / (time_secs * rate)).exp()
    }
}

/// Constant-parameter scalar Kalman estimator.
///
/// Used for the pitch-deviation (cents) channel, where a plain EMA either
/// lags a vibrato or passes frame jitter through. Process and measurement
/// noise are fixed for a session.
#[derive(Debug, Clone)]
pub struct CentsKalman {
    process_noise: f32,
    measurement_noise: f32,
    estimate: f32,
    variance: f32,
    primed: bool,
}

impl CentsKalman {
    pub fn new(process_noise: f32, measurement_noise: f32) -> Self {
        Self {
            process_noise,
            measurement_noise,
            estimate: 0.0,
            variance: 1.0,
            primed: false,
        }
    }

    /// Feed one measurement, returning the filtered estimate.
    #[inline]
    pub fn process(&mut self, measurement: f32) -> f32 {
        if !self.primed {
            self.estimate = measurement;
            self.variance = self.measurement_noise;
            self.primed = true;
            return self.estimate;
        }

        // Predict (identity model), then correct.
        self.variance += self.process_noise;
        let gain = self.variance / (self.variance + self.measurement_noise);
        self.estimate += gain * (measurement - self.estimate);
        self.variance *= 1.0 - gain;

        self.estimate
    }

    /// Current estimate.
    #[inline]
    pub fn current(&self) -> f32 {
        self.estimate
    }

    /// Change the noise parameters, keeping the current estimate.
    pub fn set_noise(&mut self, process_noise: f32, measurement_noise: f32) {
        self.process_noise = process_noise;
        self.measurement_noise = measurement_noise;
    }

    /// Forget all history.
    pub fn reset(&mut self) {
        self.estimate = 0.0;
        self.variance = 1.0;
        self.primed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ema_primes_on_first_sample() {
        let mut ema = Ema::from_time_constant(20.0, 86.0);
        assert_eq!(ema.process(0.8), 0.8);
    }

    #[test]
    fn test_ema_converges_to_constant_input() {
        let mut ema = Ema::from_time_constant(12.0, 86.0);
        ema.process(0.0);
        for _ in 0..100 {
            ema.process(0.5);
        }
        assert_relative_eq!(ema.current(), 0.5, epsilon = 0.001);
    }

    #[test]
    fn test_ema_suppresses_single_frame_spike() {
        let mut ema = Ema::from_time_constant(12.0, 86.0);
        for _ in 0..20 {
            ema.process(0.2);
        }
        let spiked = ema.process(1.0);
        assert!(spiked < 0.75, "single-frame spike passed through: {}", spiked);
    }

    #[test]
    fn test_zero_time_constant_is_passthrough() {
        let mut ema = Ema::from_time_constant(0.0, 86.0);
        ema.process(0.1);
        assert_eq!(ema.process(0.9), 0.9);
    }

    #[test]
    fn test_kalman_tracks_constant() {
        let mut kalman = CentsKalman::new(0.8, 6.0);
        for _ in 0..50 {
            kalman.process(12.0);
        }
        assert_relative_eq!(kalman.current(), 12.0, epsilon = 0.01);
    }

    #[test]
    fn test_kalman_damps_jitter() {
        let mut kalman = CentsKalman::new(0.8, 6.0);
        kalman.process(0.0);
        // Alternating +/-10 cent jitter around zero.
        let mut peak = 0.0f32;
        for i in 0..40 {
            let z = if i % 2 == 0 { 10.0 } else { -10.0 };
            peak = peak.max(kalman.process(z).abs());
        }
        assert!(peak < 6.0, "jitter passed through at {} cents", peak);
    }

    #[test]
    fn test_kalman_follows_step() {
        let mut kalman = CentsKalman::new(0.8, 6.0);
        for _ in 0..10 {
            kalman.process(0.0);
        }
        for _ in 0..20 {
            kalman.process(30.0);
        }
        assert!(
            (kalman.current() - 30.0).abs() < 3.0,
            "step not followed: {}",
            kalman.current()
        );
    }
}

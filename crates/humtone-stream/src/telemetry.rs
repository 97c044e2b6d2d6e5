//! Lock-free pipeline telemetry.

use atomic_float::AtomicF32;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Counters and gauges shared between the bridge, the control thread, and
/// an external monitoring collaborator.
///
/// All fields are atomics: updates from the real-time context are plain
/// stores/adds, reads from any thread are wait-free.
#[derive(Debug, Default)]
pub struct Telemetry {
    frames_analyzed: AtomicU64,
    frames_pitched: AtomicU64,
    frames_dropped: AtomicU64,
    last_process_ms: AtomicF32,
    fallback_active: AtomicBool,
}

/// Plain-value copy of the telemetry state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TelemetrySnapshot {
    /// Analysis windows processed.
    pub frames_analyzed: u64,
    /// Windows in which a pitch was detected.
    pub frames_pitched: u64,
    /// Frames discarded because the consumer fell behind.
    pub frames_dropped: u64,
    /// Duration of the most recent analysis pass, in ms.
    pub last_process_ms: f32,
    /// Whether the higher-latency buffered path is active.
    pub fallback_active: bool,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed analysis window.
    #[inline]
    pub fn record_frame(&self, pitched: bool, process_ms: f32) {
        self.frames_analyzed.fetch_add(1, Ordering::Relaxed);
        if pitched {
            self.frames_pitched.fetch_add(1, Ordering::Relaxed);
        }
        self.last_process_ms.store(process_ms, Ordering::Relaxed);
    }

    /// Record one frame discarded under backpressure.
    #[inline]
    pub fn record_drop(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark which delivery path is active.
    pub fn set_fallback(&self, active: bool) {
        self.fallback_active.store(active, Ordering::Relaxed);
    }

    /// Frames discarded so far.
    pub fn dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    /// Copy the current state.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            frames_analyzed: self.frames_analyzed.load(Ordering::Relaxed),
            frames_pitched: self.frames_pitched.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            last_process_ms: self.last_process_ms.load(Ordering::Relaxed),
            fallback_active: self.fallback_active.load(Ordering::Relaxed),
        }
    }
}

//! The real-time boundary: sample ingest, analysis, and frame handoff.
//!
//! The producer side is called from the audio capture context and must
//! never block: no locks shared with the consumer, no allocation in the
//! steady-state path, no logging. Completed [`PitchFrame`]s cross to the
//! control thread as values over a bounded channel; when the consumer
//! falls behind, the oldest queued frame is discarded in favor of the new
//! one, so the queue never grows and recency wins over completeness.

use crate::telemetry::Telemetry;
use crate::window::AnalysisWindow;
use arc_swap::ArcSwap;
use crossbeam_channel::{bounded, Receiver, Sender};
use humtone_analysis::{DetectorConfig, FeatureExtractor, PitchFrame};
use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapCons, HeapProd, HeapRb,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Bounded frame queue depth between producer and consumer.
pub const FRAME_CHANNEL_CAPACITY: usize = 64;

/// Minimum quantum drained per pass in the buffered fallback path.
pub const FALLBACK_QUANTUM: usize = 2048;

/// Raw-sample ring capacity for the buffered fallback path.
const FALLBACK_RING_CAPACITY: usize = 1 << 15;

/// Worker poll interval when the ring has less than a quantum available.
const FALLBACK_IDLE_SLEEP: Duration = Duration::from_millis(2);

/// Which delivery path the bridge is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeMode {
    /// Analysis runs inline in the capture context; lowest latency.
    LowLatency,
    /// Samples are staged through a ring buffer and analyzed on a worker
    /// thread in larger quanta. Used when the low-latency path is
    /// unavailable; downstream consumers see no difference.
    Buffered,
}

/// Windowing + extraction + delivery, shared by both paths.
struct AnalysisCore {
    sample_rate: f64,
    window: AnalysisWindow,
    extractor: FeatureExtractor,
    config: Arc<ArcSwap<DetectorConfig>>,
    config_seen: Arc<DetectorConfig>,
    tx: Sender<PitchFrame>,
    overflow_rx: Receiver<PitchFrame>,
    telemetry: Arc<Telemetry>,
}

impl AnalysisCore {
    fn new(
        sample_rate: f64,
        config: Arc<ArcSwap<DetectorConfig>>,
        tx: Sender<PitchFrame>,
        overflow_rx: Receiver<PitchFrame>,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        let config_seen = config.load_full();
        Self {
            sample_rate,
            window: AnalysisWindow::new(config_seen.window_size),
            extractor: FeatureExtractor::new(sample_rate, (*config_seen).clone()),
            config,
            config_seen,
            tx,
            overflow_rx,
            telemetry,
        }
    }

    /// Feed a block of samples, analyzing and delivering per completed
    /// window.
    fn ingest(&mut self, samples: &[f32]) {
        self.observe_config();

        for &sample in samples {
            if let Some(start) = self.window.write(sample) {
                let capture_time_ms = start as f64 * 1000.0 / self.sample_rate;
                let began = Instant::now();
                let frame = self
                    .extractor
                    .analyze(self.window.assembled(), capture_time_ms);
                let process_ms = began.elapsed().as_secs_f64() as f32 * 1000.0;

                self.telemetry.record_frame(frame.is_voiced(), process_ms);
                self.deliver(frame);
            }
        }
    }

    /// Pick up a swapped config snapshot between windows. The window that
    /// was in flight completed on the old value.
    fn observe_config(&mut self) {
        let current = self.config.load_full();
        if Arc::ptr_eq(&current, &self.config_seen) {
            return;
        }
        if current.window_size != self.window.size() {
            self.window = AnalysisWindow::new(current.window_size);
        }
        self.extractor.reconfigure((*current).clone());
        self.config_seen = current;
    }

    /// Send a frame, discarding the oldest queued one under backpressure.
    fn deliver(&self, frame: PitchFrame) {
        if self.tx.is_full() && self.overflow_rx.try_recv().is_ok() {
            self.telemetry.record_drop();
        }
        let _ = self.tx.try_send(frame);
    }
}

enum BridgeState {
    Inline(Box<AnalysisCore>),
    Worker {
        producer: HeapProd<f32>,
        handle: Option<JoinHandle<()>>,
    },
}

/// Buffers raw input into fixed analysis windows and marshals completed
/// frames across the real-time boundary.
pub struct StreamBridge {
    mode: BridgeMode,
    state: BridgeState,
    rx: Receiver<PitchFrame>,
    config: Arc<ArcSwap<DetectorConfig>>,
    telemetry: Arc<Telemetry>,
    running: Arc<AtomicBool>,
}

impl StreamBridge {
    /// Create a bridge in the given mode.
    pub fn new(sample_rate: f64, config: DetectorConfig, mode: BridgeMode) -> Self {
        let (tx, rx) = bounded(FRAME_CHANNEL_CAPACITY);
        let config = Arc::new(ArcSwap::from_pointee(config));
        let telemetry = Arc::new(Telemetry::new());
        let running = Arc::new(AtomicBool::new(true));

        let core = AnalysisCore::new(
            sample_rate,
            config.clone(),
            tx,
            rx.clone(),
            telemetry.clone(),
        );

        telemetry.set_fallback(mode == BridgeMode::Buffered);

        let state = match mode {
            BridgeMode::LowLatency => BridgeState::Inline(Box::new(core)),
            BridgeMode::Buffered => {
                let ring = HeapRb::<f32>::new(FALLBACK_RING_CAPACITY);
                let (producer, consumer) = ring.split();
                let thread_running = running.clone();
                let handle = std::thread::spawn(move || {
                    run_bridge_thread(consumer, core, thread_running);
                });
                BridgeState::Worker {
                    producer,
                    handle: Some(handle),
                }
            }
        };

        Self {
            mode,
            state,
            rx,
            config,
            telemetry,
            running,
        }
    }

    /// Active delivery path.
    pub fn mode(&self) -> BridgeMode {
        self.mode
    }

    /// Feed a block of captured mono samples. Real-time safe.
    ///
    /// Block size is unconstrained; windows complete as samples accumulate.
    pub fn push_samples(&mut self, samples: &[f32]) {
        match &mut self.state {
            BridgeState::Inline(core) => core.ingest(samples),
            BridgeState::Worker { producer, .. } => {
                let written = producer.push_slice(samples);
                if written < samples.len() {
                    // Ring overrun: the worker is stalled; the tail of this
                    // block is lost and accounted for.
                    self.telemetry.record_drop();
                }
            }
        }
    }

    /// The consumer end of the frame channel. Frames arrive in window
    /// completion order and must be processed in that order.
    pub fn frames(&self) -> Receiver<PitchFrame> {
        self.rx.clone()
    }

    /// Shared telemetry handle.
    pub fn telemetry(&self) -> Arc<Telemetry> {
        self.telemetry.clone()
    }

    /// Swap in a new detector config. The analysis window in flight
    /// completes on the old snapshot.
    pub fn update_config(&self, config: DetectorConfig) {
        self.config.store(Arc::new(config));
    }

    /// Stop the worker thread (buffered mode) and join it.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let BridgeState::Worker { handle, .. } = &mut self.state {
            if let Some(handle) = handle.take() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for StreamBridge {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Buffered-path worker: drain the ring in quanta and run analysis.
fn run_bridge_thread(
    mut consumer: HeapCons<f32>,
    mut core: AnalysisCore,
    running: Arc<AtomicBool>,
) {
    let mut drain = vec![0.0f32; FALLBACK_QUANTUM];

    while running.load(Ordering::Acquire) {
        if consumer.occupied_len() < FALLBACK_QUANTUM {
            std::thread::sleep(FALLBACK_IDLE_SLEEP);
            continue;
        }
        let read = consumer.pop_slice(&mut drain);
        core.ingest(&drain[..read]);
    }

    // Drain the tail so a short final phrase is not lost.
    loop {
        let read = consumer.pop_slice(&mut drain);
        if read == 0 {
            break;
        }
        core.ingest(&drain[..read]);
    }
}

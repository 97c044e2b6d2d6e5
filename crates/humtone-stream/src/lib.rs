//! # humtone-stream
//!
//! The streaming layer of the humtone pipeline: accumulates raw capture
//! blocks into fixed analysis windows, runs feature extraction at the
//! real-time boundary, and hands completed
//! [`PitchFrame`](humtone_analysis::PitchFrame)s to the control thread as
//! immutable values over a bounded channel.
//!
//! Two delivery paths share the same analysis core:
//!
//! - **Low latency**: analysis runs inline in the capture context.
//! - **Buffered fallback**: samples stage through a lock-free ring buffer
//!   and a worker thread analyzes in larger quanta. Downstream components
//!   cannot tell which path is active.
//!
//! Backpressure drops the oldest queued frame, never the newest, and never
//! queues unboundedly: a deep queue would add exactly the latency this
//! system exists to avoid.

pub mod bridge;
pub mod telemetry;
pub mod window;

pub use bridge::{BridgeMode, StreamBridge, FALLBACK_QUANTUM, FRAME_CHANNEL_CAPACITY};
pub use telemetry::{Telemetry, TelemetrySnapshot};
pub use window::AnalysisWindow;

//! drc-dsp: Streaming dynamic-range control for QADRC
//!
//! Block-driven compressor with lookahead and a zero-crossing-aware spike
//! limiter.
//!
//! ## Modules
//! - `ring_window` - Sliding window with mirrored warm-up
//! - `gain_computer` - Soft-knee static curve in dB
//! - `frame_buffer` - Rebuffering into fixed-length analysis frames
//! - `level_detector` - High-passed block RMS and per-sample peak levels
//! - `smoothing` - RMS / minimum / Gaussian cascade and attack/release smoother
//! - `lookahead` - Delay line applying gains to retained blocks
//! - `crossfade` - Per-block gain ramps
//! - `compressor` - The full compressor stage
//! - `spike_limiter` - Half-wave soft clipper
//! - `monoparts` - Stereo to mono sections
//! - `gain_trace` - Applied gain diagnostics
//! - `chain` - Stage composition

pub mod chain;
pub mod compressor;
pub mod config;
pub mod crossfade;
pub mod frame_buffer;
pub mod gain_computer;
pub mod gain_trace;
pub mod level_detector;
pub mod lookahead;
pub mod monoparts;
pub mod ring_window;
pub mod smoothing;
pub mod spike_limiter;

pub use chain::ProcessingChain;
pub use compressor::Compressor;
pub use config::DrcConfig;
pub use frame_buffer::FrameBuffer;
pub use gain_computer::GainComputer;
pub use gain_trace::GainTrace;
pub use level_detector::LevelDetector;
pub use lookahead::{DelayState, LookaheadDelayLine};
pub use monoparts::{MonoPart, MonoParts};
pub use ring_window::RingWindow;
pub use smoothing::{ExponentialSmoother, SmoothingCascade, SmoothingMode};
pub use spike_limiter::{DEFAULT_LIMITER_THRESHOLD, LimiterCursor, SpikeLimiter};

use drc_core::{DrcResult, SampleBlock};

/// A streaming stage: blocks in, zero or more blocks out
pub trait StreamProcessor: Send {
    /// Short stage name for logs
    fn name(&self) -> &'static str;

    /// Accept one block of any length; returns every block that became
    /// ready, in order. Output blocks need not match input block sizes.
    fn push(&mut self, block: SampleBlock) -> DrcResult<Vec<SampleBlock>>;

    /// Drain all held state at end of stream. Further pushes fail.
    fn flush(&mut self) -> DrcResult<Vec<SampleBlock>>;

    /// Drop held blocks and return to the initial state
    fn reset(&mut self);

    /// Fixed latency in samples (0 when it depends on the signal)
    fn latency(&self) -> usize {
        0
    }
}

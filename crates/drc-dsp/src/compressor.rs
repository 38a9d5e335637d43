//! Streaming lookahead compressor
//!
//! Wires the level detector, gain computer and smoothing into the lookahead
//! delay line:
//!
//! ```text
//! block ─┬─> LevelDetector ─> GainComputer ─> smoothing ─> coefficients
//!        └─> LookaheadDelayLine <──────────────────────────────┘
//!                   └─> gained blocks, delayed by latency()
//! ```
//!
//! In cascade mode input is rebuffered into frames of exactly `frame_len`
//! samples (only the last frame of a stream may be shorter). One smoothed gain
//! arrives per frame and is crossfaded from the previous one across the frame.
//! The delay covers the cascade warm-up so each gain lands on the frame it was
//! measured on. In exponential mode every sample gets its own coefficient, any
//! block size is processed directly and only the configured lookahead is added.

use std::io::Write;

use drc_core::{DrcError, DrcResult, SampleBlock, StreamFormat, db_to_linear, linear_to_db};

use crate::StreamProcessor;
use crate::config::DrcConfig;
use crate::crossfade::Crossfader;
use crate::frame_buffer::FrameBuffer;
use crate::gain_computer::GainComputer;
use crate::gain_trace::GainTrace;
use crate::level_detector::{LevelDetector, energy_to_db};
use crate::lookahead::LookaheadDelayLine;
use crate::smoothing::{ExponentialSmoother, SmoothingCascade, SmoothingMode};

type TraceSink = GainTrace<Box<dyn Write + Send>>;

#[derive(Debug, Clone)]
enum Smoother {
    Cascade {
        cascade: SmoothingCascade,
        crossfader: Crossfader,
        frames: FrameBuffer,
    },
    Exponential(ExponentialSmoother),
}

/// Lookahead dynamic-range compressor
#[derive(Debug)]
pub struct Compressor {
    config: DrcConfig,
    format: StreamFormat,
    frame_len: usize,
    computer: GainComputer,
    detector: LevelDetector,
    smoother: Smoother,
    delay: LookaheadDelayLine,
    /// Gain the next crossfade starts from
    prev_gain: f64,
    started: bool,
    finished: bool,
    coefficients: Vec<f64>,
    levels: Vec<f64>,
    trace: Option<TraceSink>,
}

impl Compressor {
    pub fn new(config: DrcConfig) -> DrcResult<Self> {
        config.validate()?;

        let format = config.format()?;
        let frame_len = config.frame_len();
        let computer = config.gain_computer()?;

        let (smoother, delay_samples) = match config.mode {
            SmoothingMode::Cascade => {
                let cascade = SmoothingCascade::new(frame_len, config.min_size, config.filter_size)?;
                let delay = cascade.latency_blocks() * frame_len + config.lookahead_samples();
                (
                    Smoother::Cascade {
                        cascade,
                        crossfader: Crossfader::new(frame_len),
                        frames: FrameBuffer::new(format.channels, frame_len),
                    },
                    delay,
                )
            }
            SmoothingMode::Exponential => (
                Smoother::Exponential(ExponentialSmoother::new(
                    config.attack_ms,
                    config.release_ms,
                    format.sample_rate_f64(),
                )),
                config.lookahead_samples(),
            ),
        };

        log::debug!(
            "Compressor: {:?} mode, frame {} samples, delay {} samples ({:.1} ms)",
            config.mode,
            frame_len,
            delay_samples,
            delay_samples as f64 * 1000.0 / format.sample_rate_f64()
        );
        let (t_lo, t_hi) = computer.knee_bounds();
        log::debug!(
            "Compressor: threshold {:.1} dB, ratio {:.2}, knee [{:.1}, {:.1}] dB",
            computer.threshold(),
            computer.ratio(),
            t_lo,
            t_hi
        );

        Ok(Self {
            detector: LevelDetector::new(format, frame_len),
            delay: LookaheadDelayLine::new(delay_samples),
            config,
            format,
            frame_len,
            computer,
            smoother,
            prev_gain: 1.0,
            started: false,
            finished: false,
            coefficients: Vec::with_capacity(frame_len),
            levels: Vec::new(),
            trace: None,
        })
    }

    /// Record the applied gain to `writer` (see [`GainTrace`])
    pub fn with_gain_trace(mut self, writer: Box<dyn Write + Send>) -> Self {
        self.trace = Some(GainTrace::new(writer, self.format.sample_rate));
        self
    }

    pub fn config(&self) -> &DrcConfig {
        &self.config
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Most recent gain in dB (0 = no reduction)
    pub fn gain_reduction_db(&self) -> f64 {
        linear_to_db(self.prev_gain)
    }

    /// Samples held back: the delay line plus any partial frame
    pub fn pending_samples(&self) -> usize {
        let partial = match &self.smoother {
            Smoother::Cascade { frames, .. } => frames.len(),
            Smoother::Exponential(_) => 0,
        };
        self.delay.pending_samples() + partial
    }

    // ============ Coefficient generation ============

    fn cascade_coefficients(&mut self, block: &SampleBlock) {
        let Smoother::Cascade { cascade, crossfader, .. } = &mut self.smoother else {
            return;
        };
        let energy = self.detector.block_energy(block);

        if !self.started {
            let level_db = energy_to_db(energy, self.frame_len);
            self.prev_gain = db_to_linear(self.computer.compute_gain(level_db));
            self.started = true;
        }

        self.coefficients.clear();
        self.coefficients.resize(block.len(), self.prev_gain);
        // until the cascade is warm these coefficients fall into the pre-roll
        if let Some(gain) = cascade.push(energy, &self.computer) {
            crossfader.fill(self.prev_gain, gain, &mut self.coefficients);
            self.prev_gain = gain;
        }
    }

    fn exponential_coefficients(&mut self, block: &SampleBlock) {
        let Smoother::Exponential(smoother) = &mut self.smoother else {
            return;
        };
        LevelDetector::peak_levels_db(block, &mut self.levels);

        self.coefficients.clear();
        for &level_db in &self.levels {
            let smoothed = smoother.process(self.computer.compute_gain(level_db));
            self.coefficients.push(db_to_linear(smoothed));
        }
        if let Some(&last) = self.coefficients.last() {
            self.prev_gain = last;
        }
        self.started = true;
    }

    /// Cut a block into analysis frames (cascade mode only)
    fn frames(&mut self, block: SampleBlock) -> DrcResult<Vec<SampleBlock>> {
        match &mut self.smoother {
            Smoother::Cascade { frames, .. } => frames.push(block),
            Smoother::Exponential(_) => Ok(vec![block]),
        }
    }

    fn process_frame(&mut self, frame: SampleBlock, output: &mut Vec<SampleBlock>) -> DrcResult<()> {
        match self.config.mode {
            SmoothingMode::Cascade => self.cascade_coefficients(&frame),
            SmoothingMode::Exponential => self.exponential_coefficients(&frame),
        }

        self.delay.push_block(frame)?;
        let applied = self.delay.apply(&self.coefficients, output)?;

        if let Some(trace) = self.trace.as_mut() {
            let live = &self.coefficients[self.coefficients.len() - applied..];
            trace.record(live)?;
        }
        Ok(())
    }
}

impl StreamProcessor for Compressor {
    fn name(&self) -> &'static str {
        "compressor"
    }

    fn push(&mut self, block: SampleBlock) -> DrcResult<Vec<SampleBlock>> {
        if self.finished {
            return Err(DrcError::StreamFinished);
        }
        self.format.check_block(&block)?;
        if block.is_empty() {
            return Ok(Vec::new());
        }

        let mut output = Vec::new();
        for frame in self.frames(block)? {
            self.process_frame(frame, &mut output)?;
        }
        Ok(output)
    }

    fn flush(&mut self) -> DrcResult<Vec<SampleBlock>> {
        if self.finished {
            return Err(DrcError::StreamFinished);
        }
        self.finished = true;

        let mut output = Vec::new();
        let remainder = match &mut self.smoother {
            Smoother::Cascade { frames, .. } => frames.take_remainder()?,
            Smoother::Exponential(_) => None,
        };
        if let Some(frame) = remainder {
            self.process_frame(frame, &mut output)?;
        }

        let hold = self.delay.last_coefficient().unwrap_or(self.prev_gain);
        let pending = self.delay.pending_samples();
        self.delay.flush(hold, &mut output)?;

        if let Some(trace) = self.trace.as_mut() {
            trace.record(&vec![hold; pending])?;
            trace.finish()?;
        }
        Ok(output)
    }

    fn reset(&mut self) {
        self.detector.reset(self.format);
        match &mut self.smoother {
            Smoother::Cascade { cascade, frames, .. } => {
                cascade.reset();
                frames.reset();
            }
            Smoother::Exponential(smoother) => smoother.reset(),
        }
        self.delay.reset();
        self.prev_gain = 1.0;
        self.started = false;
        self.finished = false;
        if let Some(trace) = self.trace.as_mut() {
            trace.reset();
        }
    }

    fn latency(&self) -> usize {
        self.delay.delay_samples()
    }
}

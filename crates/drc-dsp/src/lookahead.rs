//! Lookahead delay line
//!
//! Retains whole input blocks and applies gain coefficients to samples
//! `delay_samples` in the past. The coefficient computed for absolute input
//! index `i` lands on output sample `i - delay_samples`; the first
//! `delay_samples` coefficients have no target and are dropped.

use std::collections::VecDeque;

use drc_core::{DrcError, DrcResult, SampleBlock};

/// Lookahead bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DelayState {
    /// Target lookahead in samples
    pub delay_samples: usize,
    /// Coefficients (= input samples) seen so far
    pub total_samples: usize,
}

impl DelayState {
    /// Coefficients still to be discarded before output starts
    #[inline]
    pub fn preroll_remaining(&self) -> usize {
        self.delay_samples.saturating_sub(self.total_samples)
    }
}

/// Queue of retained blocks plus a read cursor into the oldest one
#[derive(Debug, Clone)]
pub struct LookaheadDelayLine {
    state: DelayState,
    blocks: VecDeque<SampleBlock>,
    /// Samples of the front block already gained
    offset: usize,
    /// Retained samples still waiting for a coefficient
    pending: usize,
    last_coefficient: Option<f64>,
}

impl LookaheadDelayLine {
    pub fn new(delay_samples: usize) -> Self {
        Self {
            state: DelayState {
                delay_samples,
                total_samples: 0,
            },
            blocks: VecDeque::new(),
            offset: 0,
            pending: 0,
            last_coefficient: None,
        }
    }

    pub fn state(&self) -> DelayState {
        self.state
    }

    pub fn delay_samples(&self) -> usize {
        self.state.delay_samples
    }

    pub fn pending_samples(&self) -> usize {
        self.pending
    }

    pub fn retained_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Last coefficient that reached an output sample
    pub fn last_coefficient(&self) -> Option<f64> {
        self.last_coefficient
    }

    /// Retain an input block until its samples have been gained
    pub fn push_block(&mut self, block: SampleBlock) -> DrcResult<()> {
        if block.is_empty() {
            return Ok(());
        }
        self.blocks
            .try_reserve(1)
            .map_err(|e| DrcError::OutOfMemory(format!("lookahead queue: {}", e)))?;
        self.pending += block.len();
        self.blocks.push_back(block);
        Ok(())
    }

    /// Consume the coefficients computed for the next input samples.
    ///
    /// Completed blocks are appended to `output` in arrival order. Returns
    /// how many coefficients reached an output sample.
    pub fn apply(&mut self, coefficients: &[f64], output: &mut Vec<SampleBlock>) -> DrcResult<usize> {
        let skip = self.state.preroll_remaining().min(coefficients.len());
        self.state.total_samples += coefficients.len();

        let live = &coefficients[skip..];
        if let Some(&last) = live.last() {
            self.last_coefficient = Some(last);
        }
        self.apply_gains(live, output)?;
        Ok(live.len())
    }

    /// Drain every retained sample, holding `hold` as the gain
    pub fn flush(&mut self, hold: f64, output: &mut Vec<SampleBlock>) -> DrcResult<()> {
        if self.pending > 0 {
            log::debug!(
                "LookaheadDelayLine: flushing {} samples in {} blocks at gain {:.4}",
                self.pending,
                self.blocks.len(),
                hold
            );
            let tail = vec![hold; self.pending];
            self.apply_gains(&tail, output)?;
        }
        Ok(())
    }

    fn apply_gains(&mut self, mut coefficients: &[f64], output: &mut Vec<SampleBlock>) -> DrcResult<()> {
        debug_assert!(coefficients.len() <= self.pending, "coefficients overrun retained audio");

        while !coefficients.is_empty() {
            let Some(front) = self.blocks.front_mut() else {
                break;
            };

            let n = coefficients.len().min(front.len() - self.offset);
            front.apply_gains(self.offset, &coefficients[..n]);
            self.offset += n;
            self.pending -= n;
            coefficients = &coefficients[n..];

            if self.offset == front.len() {
                output
                    .try_reserve(1)
                    .map_err(|e| DrcError::OutOfMemory(format!("output queue: {}", e)))?;
                if let Some(done) = self.blocks.pop_front() {
                    output.push(done);
                }
                self.offset = 0;
            }
        }
        Ok(())
    }

    /// Drop retained audio without processing (stream cancel)
    pub fn reset(&mut self) {
        self.blocks.clear();
        self.offset = 0;
        self.pending = 0;
        self.state.total_samples = 0;
        self.last_coefficient = None;
    }
}

//! Zero-crossing-aware soft clipper
//!
//! Repairs samples beyond a hard threshold without touching anything else:
//! - Each excursion is bounded by the zero crossings around it
//! - The whole half-wave is reshaped by a polynomial that is 0 at 0 and
//!   reaches exactly the threshold at the extremum
//! - A half-wave is only corrected once its end is known, so output waits for
//!   the next sign change (or end of stream)
//!
//! # Design
//! Blocks are queued as they arrive and addressed by absolute sample
//! position. Each channel keeps its own corrected boundary; a block is
//! released once every channel's boundary has passed it.

use std::collections::VecDeque;

use drc_core::{DrcError, DrcResult, SampleBlock, StreamFormat};

use crate::StreamProcessor;

/// Default threshold (127/128 of full scale)
pub const DEFAULT_LIMITER_THRESHOLD: f64 = 0.9921875;

/// Incoming samples are clipped to this multiple of the threshold. Above it
/// the cubic correction would no longer be monotonic.
pub const PRECLIP_FACTOR: f64 = 3.0;

/// Held audio beyond this many seconds is reported as a stalled channel
pub const STALL_WARN_SECONDS: f64 = 5.0;

/// Corrected boundary of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct LimiterCursor {
    /// Arrival index of the block holding the boundary
    pub block_index: u64,
    /// Sample offset inside that block
    pub offset: usize,
}

/// Soft clipper operating across block boundaries
#[derive(Debug, Clone)]
pub struct SpikeLimiter {
    format: StreamFormat,
    threshold: f64,
    blocks: VecDeque<SampleBlock>,
    /// Absolute position of each queued block's first sample
    starts: VecDeque<usize>,
    /// Arrival index of the front block
    base_block: u64,
    /// Absolute position one past the last buffered sample
    end: usize,
    /// Per-channel absolute corrected boundary
    processed: Vec<usize>,
    /// Start of each channel's trailing strict same-sign run
    run_start: Vec<usize>,
    last_sample: Vec<f64>,
    spikes: u64,
    stall_warned: bool,
    finished: bool,
}

impl SpikeLimiter {
    pub fn new(format: StreamFormat, threshold: f64) -> DrcResult<Self> {
        format.validate()?;
        if !(threshold > 0.0) || !threshold.is_finite() {
            return Err(DrcError::config(format!(
                "limiter threshold {} must be a positive linear amplitude",
                threshold
            )));
        }

        log::debug!(
            "SpikeLimiter: {} channels, threshold {:.6} ({:.2} dBFS)",
            format.channels,
            threshold,
            drc_core::linear_to_db(threshold)
        );

        Ok(Self {
            format,
            threshold,
            blocks: VecDeque::new(),
            starts: VecDeque::new(),
            base_block: 0,
            end: 0,
            processed: vec![0; format.channels],
            run_start: vec![0; format.channels],
            last_sample: vec![0.0; format.channels],
            spikes: 0,
            stall_warned: false,
            finished: false,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Number of half-waves corrected so far
    pub fn spikes_corrected(&self) -> u64 {
        self.spikes
    }

    /// Samples per channel held back waiting for a safe boundary
    pub fn buffered_samples(&self) -> usize {
        self.starts.front().map_or(0, |&start| self.end - start)
    }

    /// True while more than [`STALL_WARN_SECONDS`] of audio is held back,
    /// e.g. a DC-biased channel that never crosses zero
    pub fn is_stalled(&self) -> bool {
        self.buffered_samples() > self.stall_samples()
    }

    fn stall_samples(&self) -> usize {
        self.format.ms_to_samples(STALL_WARN_SECONDS * 1000.0)
    }

    /// Corrected boundary of a channel as (block, offset)
    pub fn cursor(&self, channel: usize) -> LimiterCursor {
        let pos = self.processed[channel];
        if pos >= self.end {
            return LimiterCursor {
                block_index: self.base_block + self.blocks.len() as u64,
                offset: 0,
            };
        }
        let (qi, offset) = self.locate(pos);
        LimiterCursor {
            block_index: self.base_block + qi as u64,
            offset,
        }
    }

    // ============ Addressing ============

    #[inline]
    fn locate(&self, pos: usize) -> (usize, usize) {
        let qi = self.starts.partition_point(|&s| s <= pos) - 1;
        (qi, pos - self.starts[qi])
    }

    #[inline]
    fn sample(&self, channel: usize, pos: usize) -> f64 {
        let (qi, offset) = self.locate(pos);
        self.blocks[qi].channel(channel)[offset]
    }

    fn map_range(&mut self, channel: usize, start: usize, end: usize, curve: impl Fn(f64) -> f64) {
        let mut pos = start;
        while pos < end {
            let (qi, offset) = self.locate(pos);
            let block = &mut self.blocks[qi];
            let n = (block.len() - offset).min(end - pos);
            for s in &mut block.channel_mut(channel)[offset..offset + n] {
                *s = curve(*s);
            }
            pos += n;
        }
    }

    // ============ Correction ============

    fn preclip(&self, block: &mut SampleBlock) {
        let bound = PRECLIP_FACTOR * self.threshold;
        for c in 0..block.num_channels() {
            if block.channel(c).iter().any(|s| s.abs() > bound) {
                for s in block.channel_mut(c) {
                    *s = s.clamp(-bound, bound);
                }
            }
        }
    }

    /// Extend each channel's trailing same-sign run with a block starting at `start`
    fn track_runs(&mut self, block: &SampleBlock, start: usize) {
        let len = block.len();
        for (c, samples) in block.channels().enumerate() {
            let last = samples[len - 1];
            let tail = samples.iter().rev().take_while(|&&s| s * last > 0.0).count();
            let continues = tail == len && self.last_sample[c] * last > 0.0;
            if !continues {
                self.run_start[c] = start + len - tail;
            }
            self.last_sample[c] = last;
        }
    }

    /// Position up to which a channel can be corrected without future input
    fn safe_limit(&self, channel: usize, at_end: bool) -> usize {
        let floor = self.processed[channel];
        if at_end || self.end <= floor {
            return self.end.max(floor);
        }

        // the trailing same-sign run may still grow: stop at its start
        self.run_start[channel].max(floor)
    }

    fn check_stall(&mut self) {
        if !self.is_stalled() {
            self.stall_warned = false;
        } else if !self.stall_warned {
            self.stall_warned = true;
            log::warn!(
                "SpikeLimiter: {} samples held without a zero crossing, output stalls until the signal changes sign",
                self.buffered_samples()
            );
        }
    }

    fn process_channel(&mut self, channel: usize, limit: usize) {
        let t = self.threshold;
        let mut end = self.processed[channel];

        while end < limit {
            let Some(first_peak) = (end..limit).find(|&p| self.sample(channel, p).abs() > t) else {
                break;
            };
            let reference = self.sample(channel, first_peak);

            // back to the nearest strict sign change, or the boundary
            let mut start = first_peak;
            while start > end && reference * self.sample(channel, start - 1) >= 0.0 {
                start -= 1;
            }

            // forward until the sign flips, tracking the true extremum
            let mut peak = reference.abs();
            let mut stop = first_peak + 1;
            while stop < limit {
                let y = self.sample(channel, stop);
                if reference * y < 0.0 {
                    break;
                }
                peak = peak.max(y.abs());
                stop += 1;
            }

            self.correct(channel, start, stop, peak, reference > 0.0);
            self.spikes += 1;
            end = stop;
        }

        self.processed[channel] = limit.max(self.processed[channel]);
    }

    fn correct(&mut self, channel: usize, start: usize, end: usize, peak: f64, positive: bool) {
        let t = self.threshold;
        if peak < 2.0 * t {
            let mut a = (peak - t) / (peak * peak);
            if positive {
                a = -a;
            }
            self.map_range(channel, start, end, |x| x + a * x * x);
        } else {
            let a = (peak - 2.0 * t) / (peak * peak * peak);
            let mut b = (3.0 * t - 2.0 * peak) / (peak * peak);
            if !positive {
                b = -b;
            }
            self.map_range(channel, start, end, |x| x + b * x * x + a * x * x * x);
        }
    }

    fn process(&mut self, at_end: bool) {
        for channel in 0..self.format.channels {
            let limit = self.safe_limit(channel, at_end);
            self.process_channel(channel, limit);
        }
    }

    /// Pop every block wholly before the slowest channel's boundary
    fn release(&mut self) -> Vec<SampleBlock> {
        let safe = self.processed.iter().copied().min().unwrap_or(self.end);
        let mut released = Vec::new();
        while let (Some(&start), Some(front)) = (self.starts.front(), self.blocks.front()) {
            if start + front.len() > safe {
                break;
            }
            self.starts.pop_front();
            if let Some(block) = self.blocks.pop_front() {
                released.push(block);
            }
            self.base_block += 1;
        }
        if !released.is_empty() {
            log::trace!(
                "SpikeLimiter: released {} blocks, {} samples still buffered",
                released.len(),
                self.buffered_samples()
            );
        }
        released
    }
}

impl StreamProcessor for SpikeLimiter {
    fn name(&self) -> &'static str {
        "spike_limiter"
    }

    fn push(&mut self, block: SampleBlock) -> DrcResult<Vec<SampleBlock>> {
        if self.finished {
            return Err(DrcError::StreamFinished);
        }
        self.format.check_block(&block)?;
        if block.is_empty() {
            return Ok(Vec::new());
        }

        let mut block = block;
        self.preclip(&mut block);

        self.blocks
            .try_reserve(1)
            .map_err(|e| DrcError::OutOfMemory(format!("limiter queue: {}", e)))?;
        self.track_runs(&block, self.end);
        self.starts.push_back(self.end);
        self.end += block.len();
        self.blocks.push_back(block);

        self.process(false);
        let released = self.release();
        self.check_stall();
        Ok(released)
    }

    fn flush(&mut self) -> DrcResult<Vec<SampleBlock>> {
        if self.finished {
            return Err(DrcError::StreamFinished);
        }
        self.finished = true;
        self.process(true);
        let released = self.release();
        log::debug!(
            "SpikeLimiter: flushed {} blocks, {} half-waves corrected in total",
            released.len(),
            self.spikes
        );
        Ok(released)
    }

    fn reset(&mut self) {
        self.blocks.clear();
        self.starts.clear();
        self.base_block = 0;
        self.end = 0;
        self.processed.iter_mut().for_each(|p| *p = 0);
        self.run_start.iter_mut().for_each(|p| *p = 0);
        self.last_sample.iter_mut().for_each(|s| *s = 0.0);
        self.spikes = 0;
        self.stall_warned = false;
        self.finished = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono() -> StreamFormat {
        StreamFormat::new(1, 48000).unwrap()
    }

    fn run(limiter: &mut SpikeLimiter, signal: &[f64], block_len: usize) -> Vec<f64> {
        let mut out = Vec::new();
        for chunk in signal.chunks(block_len) {
            for block in limiter.push(SampleBlock::new(vec![chunk.to_vec()]).unwrap()).unwrap() {
                out.extend_from_slice(block.channel(0));
            }
        }
        for block in limiter.flush().unwrap() {
            out.extend_from_slice(block.channel(0));
        }
        out
    }

    #[test]
    fn test_quiet_signal_bit_identical() {
        let signal: Vec<f64> = (0..1000).map(|i| 0.8 * (i as f64 * 0.05).sin()).collect();
        let mut limiter = SpikeLimiter::new(mono(), 0.9).unwrap();
        let out = run(&mut limiter, &signal, 64);
        assert_eq!(out, signal);
        assert_eq!(limiter.spikes_corrected(), 0);
    }

    #[test]
    fn test_quadratic_branch_hits_threshold() {
        // one positive half-wave peaking at 1.5 between zeros
        let signal = vec![0.0, 0.5, 1.2, 1.5, 1.1, 0.4, -0.2, -0.1];
        let mut limiter = SpikeLimiter::new(mono(), 1.0).unwrap();
        let out = run(&mut limiter, &signal, 3);

        assert_eq!(out.len(), signal.len());
        assert!((out[3] - 1.0).abs() < 1e-12);
        assert!(out.iter().all(|s| s.abs() <= 1.0 + 1e-12));
        // neighbouring negative half-wave untouched
        assert_eq!(&out[6..], &signal[6..]);
        assert_eq!(limiter.spikes_corrected(), 1);
    }

    #[test]
    fn test_cubic_branch_and_preclip() {
        for peak in [2.5, 5.0] {
            let signal = vec![0.1, -0.3, -1.5, -peak, -2.0, -0.5, 0.2];
            let mut limiter = SpikeLimiter::new(mono(), 1.0).unwrap();
            let out = run(&mut limiter, &signal, 2);

            assert!((out[3] + 1.0).abs() < 1e-9, "peak {} -> {}", peak, out[3]);
            for (x, y) in signal.iter().zip(&out) {
                assert!(y.abs() <= 1.0 + 1e-9);
                assert_eq!(x.signum(), y.signum());
            }
            assert_eq!(out[0], 0.1);
            assert_eq!(out[6], 0.2);
        }
    }

    #[test]
    fn test_unresolved_spike_waits_for_sign_change() {
        let mut limiter = SpikeLimiter::new(mono(), 1.0).unwrap();

        let hot = SampleBlock::new(vec![vec![0.5, 1.4, 1.6, 1.2]]).unwrap();
        assert!(limiter.push(hot).unwrap().is_empty());
        assert_eq!(limiter.buffered_samples(), 4);

        let still_positive = SampleBlock::new(vec![vec![1.3, 0.7]]).unwrap();
        assert!(limiter.push(still_positive).unwrap().is_empty());

        // sign change resolves the half-wave; the trailing negative run is held
        let crossing = SampleBlock::new(vec![vec![-0.2, -0.3]]).unwrap();
        let released = limiter.push(crossing).unwrap();
        assert_eq!(released.len(), 2);
        let corrected: Vec<f64> = released.iter().flat_map(|b| b.channel(0).to_vec()).collect();
        assert!((corrected[2] - 1.0).abs() < 1e-12);
        assert!(corrected.iter().all(|s| *s <= 1.0 + 1e-12));

        let tail = limiter.flush().unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].channel(0), &[-0.2, -0.3]);
    }

    #[test]
    fn test_flush_force_resolves_open_spike() {
        let mut limiter = SpikeLimiter::new(mono(), 1.0).unwrap();
        assert!(limiter.push(SampleBlock::new(vec![vec![0.2, 1.8, 1.9]]).unwrap()).unwrap().is_empty());
        let out = limiter.flush().unwrap();
        assert_eq!(out.len(), 1);
        assert!((out[0].channel(0)[2] - 1.0).abs() < 1e-12);
        assert!(matches!(limiter.flush(), Err(DrcError::StreamFinished)));
    }

    #[test]
    fn test_channels_release_together() {
        let format = StreamFormat::new(2, 48000).unwrap();
        let mut limiter = SpikeLimiter::new(format, 1.0).unwrap();

        // left keeps crossing zero, right stays positive: nothing can be released
        let block = SampleBlock::new(vec![vec![0.5, -0.5, 0.5, -0.5], vec![0.3, 0.4, 0.3, 0.4]]).unwrap();
        assert!(limiter.push(block).unwrap().is_empty());
        assert_eq!(limiter.cursor(0), LimiterCursor { block_index: 0, offset: 3 });
        assert_eq!(limiter.cursor(1), LimiterCursor { block_index: 0, offset: 0 });

        let block = SampleBlock::new(vec![vec![0.5, -0.5], vec![-0.3, -0.4]]).unwrap();
        let released = limiter.push(block).unwrap();
        assert_eq!(released.len(), 1);
        assert_eq!(limiter.cursor(1), LimiterCursor { block_index: 1, offset: 0 });
    }

    #[test]
    fn test_input_clone_untouched() {
        let input = SampleBlock::new(vec![vec![0.0, 1.5, 0.0]]).unwrap();
        let mut limiter = SpikeLimiter::new(mono(), 1.0).unwrap();
        let mut out = limiter.push(input.clone()).unwrap();
        out.extend(limiter.flush().unwrap());

        assert_eq!(input.channel(0), &[0.0, 1.5, 0.0]);
        assert!((out[0].channel(0)[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_dc_channel_is_held_then_released_on_crossing() {
        let format = StreamFormat::new(1, 1000).unwrap();
        let mut limiter = SpikeLimiter::new(format, 1.0).unwrap();

        for _ in 0..7 {
            let dc = SampleBlock::new(vec![vec![0.5; 1000]]).unwrap();
            assert!(limiter.push(dc).unwrap().is_empty());
        }
        assert_eq!(limiter.buffered_samples(), 7000);
        assert!(limiter.is_stalled());

        let crossing = SampleBlock::new(vec![vec![-0.5; 10]]).unwrap();
        let released = limiter.push(crossing).unwrap();
        assert_eq!(released.len(), 7);
        assert!(released.iter().all(|b| b.channel(0).iter().all(|&s| s == 0.5)));
        assert_eq!(limiter.buffered_samples(), 10);
        assert!(!limiter.is_stalled());
    }

    #[test]
    fn test_run_spanning_blocks_is_corrected_as_one() {
        let mut limiter = SpikeLimiter::new(mono(), 1.0).unwrap();
        let mut out = Vec::new();
        for chunk in [vec![-0.1, 0.4, 0.8], vec![1.2, 1.5], vec![0.9, 0.3], vec![-0.2, -0.1]] {
            out.extend(limiter.push(SampleBlock::new(vec![chunk]).unwrap()).unwrap());
        }
        // the half-wave ends in the last block: only the first three are final
        assert_eq!(out.len(), 3);
        out.extend(limiter.flush().unwrap());

        let samples: Vec<f64> = out.iter().flat_map(|b| b.channel(0).to_vec()).collect();
        assert_eq!(limiter.spikes_corrected(), 1);
        assert!((samples[4] - 1.0).abs() < 1e-12);
        assert!(samples[1..7].iter().all(|&s| s > 0.0 && s <= 1.0 + 1e-12));
        assert_eq!(&samples[7..], &[-0.2, -0.1]);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(SpikeLimiter::new(mono(), 0.0).is_err());
        assert!(SpikeLimiter::new(mono(), f64::NAN).is_err());

        let mut limiter = SpikeLimiter::new(mono(), 1.0).unwrap();
        let stereo = SampleBlock::silence(2, 4);
        assert!(matches!(
            limiter.push(stereo),
            Err(DrcError::ChannelMismatch { expected: 1, got: 2 })
        ));
    }
}

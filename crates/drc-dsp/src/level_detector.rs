//! Loudness measurement: high-pass pre-filter + block RMS or per-sample peak
//!
//! - One-pole high-pass per channel removes DC and rumble before RMS
//! - Block energy is reported as a full-block equivalent so short blocks do
//!   not read as quieter than they are
//! - Peak mode works on raw samples, one level per sample index

use drc_core::{Sample, SampleBlock, StreamFormat, linear_to_db};

/// Cutoff of the loudness pre-filter
pub const HIGHPASS_CUTOFF_HZ: f64 = 150.0;

/// Floor applied to mean-square values before taking the logarithm
pub const ENERGY_FLOOR: f64 = f64::EPSILON;

/// Mean-square energy to dB, clamped to [`ENERGY_FLOOR`]
#[inline]
pub fn energy_to_db(sum: f64, samples: usize) -> f64 {
    let mean = if samples == 0 { 0.0 } else { sum / samples as f64 };
    10.0 * mean.max(ENERGY_FLOOR).log10()
}

#[derive(Debug, Clone, Copy, Default)]
struct HighpassState {
    x_prev: f64,
    y_prev: f64,
}

/// One-pole high-pass `y = a * (y_prev + x - x_prev)` per channel
#[derive(Debug, Clone)]
pub struct Highpass {
    a: f64,
    states: Vec<HighpassState>,
    primed: bool,
}

impl Highpass {
    pub fn new(channels: usize, sample_rate: f64, cutoff_hz: f64) -> Self {
        let rc = 1.0 / (2.0 * std::f64::consts::PI * cutoff_hz);
        Self {
            a: rc / (rc + 1.0 / sample_rate),
            states: vec![HighpassState::default(); channels],
            primed: false,
        }
    }

    pub fn coefficient(&self) -> f64 {
        self.a
    }

    // Start from the first observed sample so a DC offset does not ring in
    fn prime(&mut self, block: &SampleBlock) {
        for (state, channel) in self.states.iter_mut().zip(block.channels()) {
            let first = channel.first().copied().unwrap_or(0.0);
            state.x_prev = first;
            state.y_prev = first;
        }
        self.primed = true;
    }

    /// Filter one channel, feeding every output sample to `sink`
    fn filter_channel(&mut self, channel: usize, samples: &[Sample], mut sink: impl FnMut(f64)) {
        let a = self.a;
        let state = &mut self.states[channel];
        let (mut x0, mut y0) = (state.x_prev, state.y_prev);
        for &x1 in samples {
            let y1 = a * (y0 + x1 - x0);
            sink(y1);
            x0 = x1;
            y0 = y1;
        }
        state.x_prev = x0;
        state.y_prev = y0;
    }

    /// Sum of squared high-passed samples over all channels of the block
    pub fn energy(&mut self, block: &SampleBlock) -> f64 {
        if block.is_empty() {
            return 0.0;
        }
        if !self.primed {
            self.prime(block);
        }

        let mut sum = 0.0;
        for (c, samples) in block.channels().enumerate() {
            self.filter_channel(c, samples, |y| sum += y * y);
        }
        sum
    }

    /// High-pass one block, writing filtered samples per channel
    pub fn process(&mut self, block: &SampleBlock, output: &mut [Vec<Sample>]) {
        if block.is_empty() {
            return;
        }
        if !self.primed {
            self.prime(block);
        }
        for (c, samples) in block.channels().enumerate() {
            let out = &mut output[c];
            out.clear();
            self.filter_channel(c, samples, |y| out.push(y));
        }
    }
}

/// Loudness estimator feeding the gain computer
#[derive(Debug, Clone)]
pub struct LevelDetector {
    highpass: Highpass,
    frame_len: usize,
    prev_energy: Option<f64>,
    prev_short: bool,
}

impl LevelDetector {
    /// `frame_len` is the nominal analysis block length in samples
    pub fn new(format: StreamFormat, frame_len: usize) -> Self {
        Self {
            highpass: Highpass::new(format.channels, format.sample_rate_f64(), HIGHPASS_CUTOFF_HZ),
            frame_len: frame_len.max(1),
            prev_energy: None,
            prev_short: false,
        }
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    pub fn highpass(&self) -> &Highpass {
        &self.highpass
    }

    /// High-passed energy of a block, expressed as a full-block equivalent.
    ///
    /// A block shorter than the nominal length has its partial sum rescaled
    /// to full length and averaged against the previous block's energy,
    /// weighted by sample counts.
    pub fn block_energy(&mut self, block: &SampleBlock) -> f64 {
        let n = block.len();
        let raw = self.highpass.energy(block);
        if n == 0 {
            return self.prev_energy.unwrap_or(0.0);
        }

        let full = self.frame_len as f64;
        let rescaled = raw * full / n as f64;
        let short = n < self.frame_len;

        let energy = match (short, self.prev_energy) {
            (true, Some(prev)) => {
                if self.prev_short {
                    log::warn!(
                        "LevelDetector: consecutive short blocks ({} < {} samples), averaging against a rescaled estimate",
                        n,
                        self.frame_len
                    );
                }
                (prev * full + rescaled * n as f64) / (full + n as f64)
            }
            _ => rescaled,
        };

        self.prev_energy = Some(energy);
        self.prev_short = short;
        energy
    }

    /// Block RMS loudness in dB
    pub fn block_loudness_db(&mut self, block: &SampleBlock) -> f64 {
        let energy = self.block_energy(block);
        energy_to_db(energy, self.frame_len)
    }

    /// Per-sample peak level in dB: max |x| across channels at each index
    pub fn peak_levels_db(block: &SampleBlock, output: &mut Vec<f64>) {
        output.clear();
        output.resize(block.len(), 0.0);
        for channel in block.channels() {
            for (peak, &s) in output.iter_mut().zip(channel) {
                *peak = peak.max(s.abs());
            }
        }
        for level in output.iter_mut() {
            *level = linear_to_db(*level);
        }
    }

    pub fn reset(&mut self, format: StreamFormat) {
        self.highpass = Highpass::new(format.channels, format.sample_rate_f64(), HIGHPASS_CUTOFF_HZ);
        self.prev_energy = None;
        self.prev_short = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SAMPLE_RATE: u32 = 48000;

    fn sine_block(channels: usize, len: usize, start: usize, freq: f64, amp: f64) -> SampleBlock {
        let data = (0..channels)
            .map(|_| {
                (start..start + len)
                    .map(|i| {
                        let t = i as f64 / SAMPLE_RATE as f64;
                        amp * (2.0 * std::f64::consts::PI * freq * t).sin()
                    })
                    .collect()
            })
            .collect();
        SampleBlock::new(data).unwrap()
    }

    #[test]
    fn test_highpass_coefficient() {
        let hp = Highpass::new(1, 48000.0, 150.0);
        let rc = 1.0 / (2.0 * std::f64::consts::PI * 150.0);
        assert_relative_eq!(hp.coefficient(), rc / (rc + 1.0 / 48000.0), epsilon = 1e-15);
    }

    #[test]
    fn test_dc_offset_is_silent() {
        let format = StreamFormat::new(2, SAMPLE_RATE).unwrap();
        let mut detector = LevelDetector::new(format, 4800);
        let block = SampleBlock::new(vec![vec![0.5; 4800], vec![-0.25; 4800]]).unwrap();

        // primed from the first sample: DC never enters the filter
        assert_eq!(detector.block_energy(&block), 0.0);
        assert_relative_eq!(
            detector.block_loudness_db(&block),
            10.0 * ENERGY_FLOOR.log10(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_sine_loudness() {
        let format = StreamFormat::new(1, SAMPLE_RATE).unwrap();
        let mut detector = LevelDetector::new(format, 4800);

        // 1 kHz is well above the cutoff; mean square of a sine is amp^2 / 2
        let mut level = 0.0;
        for k in 0..5 {
            level = detector.block_loudness_db(&sine_block(1, 4800, k * 4800, 1000.0, 0.5));
        }
        assert_relative_eq!(level, 10.0 * (0.125f64).log10(), epsilon = 0.2);
    }

    #[test]
    fn test_short_final_block_is_rescaled_and_averaged() {
        let format = StreamFormat::new(1, SAMPLE_RATE).unwrap();
        let mut detector = LevelDetector::new(format, 4800);

        let mut prev = 0.0;
        for k in 0..4 {
            prev = detector.block_energy(&sine_block(1, 4800, k * 4800, 1000.0, 0.5));
        }
        let tail = detector.block_energy(&sine_block(1, 1200, 4 * 4800, 1000.0, 0.5));

        // same signal level: the estimate must not collapse by the 4x length ratio
        assert_relative_eq!(tail, prev, max_relative = 0.05);
    }

    #[test]
    fn test_short_first_block_is_rescaled() {
        let format = StreamFormat::new(1, SAMPLE_RATE).unwrap();
        let mut full = LevelDetector::new(format, 4800);
        let mut short = LevelDetector::new(format, 4800);

        let e_full = full.block_energy(&sine_block(1, 4800, 0, 1000.0, 0.5));
        let e_short = short.block_energy(&sine_block(1, 2400, 0, 1000.0, 0.5));
        assert_relative_eq!(e_short, e_full, max_relative = 0.05);
    }

    #[test]
    fn test_peak_levels_take_max_across_channels() {
        let block = SampleBlock::new(vec![vec![0.5, -0.1, 0.0], vec![-1.0, 0.05, 0.0]]).unwrap();
        let mut levels = Vec::new();
        LevelDetector::peak_levels_db(&block, &mut levels);

        assert_relative_eq!(levels[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(levels[1], -20.0, epsilon = 1e-9);
        assert_eq!(levels[2], -120.0);
    }
}

//! Stream configuration for the compressor and limiter

use serde::{Deserialize, Serialize};

use drc_core::{DrcError, DrcResult, StreamFormat};

use crate::gain_computer::GainComputer;
use crate::smoothing::SmoothingMode;
use crate::spike_limiter::DEFAULT_LIMITER_THRESHOLD;

/// Compressor / limiter configuration, fixed before data flows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrcConfig {
    /// Number of planar channels
    pub channels: usize,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Compression threshold (dB)
    pub threshold_db: f64,

    /// Compression ratio (>= 1)
    pub ratio: f64,

    /// Soft-knee width (dB, 0 = hard knee)
    pub knee_db: f64,

    /// Nominal analysis block length (ms)
    pub frame_ms: f64,

    /// Gaussian filter length in blocks (odd)
    pub filter_size: usize,

    /// Minimum filter length in blocks (odd)
    pub min_size: usize,

    /// Extra lookahead on top of the smoothing latency (ms)
    pub lookahead_ms: f64,

    /// Attack time of the exponential smoother (ms)
    pub attack_ms: f64,

    /// Release time of the exponential smoother (ms)
    pub release_ms: f64,

    /// Gain smoothing shape
    pub mode: SmoothingMode,

    /// Spike limiter threshold (linear amplitude)
    pub limiter_threshold: f64,
}

impl Default for DrcConfig {
    fn default() -> Self {
        Self {
            channels: 2,
            sample_rate: 48000,
            threshold_db: -35.0,
            ratio: 1.5,
            knee_db: 20.0,
            frame_ms: 100.0,
            filter_size: 31,
            min_size: 3,
            lookahead_ms: 0.0,
            attack_ms: 20.0,
            release_ms: 800.0,
            mode: SmoothingMode::Cascade,
            limiter_threshold: DEFAULT_LIMITER_THRESHOLD,
        }
    }
}

impl DrcConfig {
    /// Peak-following preset: per-sample detector, short attack
    pub fn peak() -> Self {
        Self {
            mode: SmoothingMode::Exponential,
            lookahead_ms: 5.0,
            ..Default::default()
        }
    }

    pub fn format(&self) -> DrcResult<StreamFormat> {
        StreamFormat::new(self.channels, self.sample_rate)
    }

    /// Nominal block length in samples
    pub fn frame_len(&self) -> usize {
        let format = StreamFormat {
            channels: self.channels,
            sample_rate: self.sample_rate,
        };
        format.ms_to_samples(self.frame_ms).max(1)
    }

    pub fn lookahead_samples(&self) -> usize {
        let format = StreamFormat {
            channels: self.channels,
            sample_rate: self.sample_rate,
        };
        format.ms_to_samples(self.lookahead_ms)
    }

    pub fn gain_computer(&self) -> DrcResult<GainComputer> {
        GainComputer::new(self.threshold_db, self.ratio, self.knee_db)
    }

    /// Reject anything the stages would refuse, before any state is built
    pub fn validate(&self) -> DrcResult<()> {
        self.format()?;
        self.gain_computer()?;

        if !(self.frame_ms > 0.0) || !self.frame_ms.is_finite() {
            return Err(DrcError::config(format!("frame length {} ms must be positive", self.frame_ms)));
        }
        for (name, size) in [("filter_size", self.filter_size), ("min_size", self.min_size)] {
            if size % 2 == 0 {
                return Err(DrcError::config(format!(
                    "{} {} is invalid, must be an odd value",
                    name, size
                )));
            }
        }
        for (name, ms) in [
            ("lookahead_ms", self.lookahead_ms),
            ("attack_ms", self.attack_ms),
            ("release_ms", self.release_ms),
        ] {
            if !(ms >= 0.0) || !ms.is_finite() {
                return Err(DrcError::config(format!("{} {} must be a non-negative time", name, ms)));
            }
        }
        if !(self.limiter_threshold > 0.0) || !self.limiter_threshold.is_finite() {
            return Err(DrcError::config(format!(
                "limiter threshold {} must be positive",
                self.limiter_threshold
            )));
        }
        Ok(())
    }

    /// Set channel count and sample rate
    pub fn with_format(mut self, channels: usize, sample_rate: u32) -> Self {
        self.channels = channels;
        self.sample_rate = sample_rate;
        self
    }

    /// Set threshold, ratio and knee
    pub fn with_curve(mut self, threshold_db: f64, ratio: f64, knee_db: f64) -> Self {
        self.threshold_db = threshold_db;
        self.ratio = ratio;
        self.knee_db = knee_db;
        self
    }

    pub fn with_frame_ms(mut self, frame_ms: f64) -> Self {
        self.frame_ms = frame_ms;
        self
    }

    /// Set Gaussian and minimum filter lengths
    pub fn with_filters(mut self, filter_size: usize, min_size: usize) -> Self {
        self.filter_size = filter_size;
        self.min_size = min_size;
        self
    }

    pub fn with_lookahead_ms(mut self, lookahead_ms: f64) -> Self {
        self.lookahead_ms = lookahead_ms;
        self
    }

    pub fn with_attack_release(mut self, attack_ms: f64, release_ms: f64) -> Self {
        self.attack_ms = attack_ms;
        self.release_ms = release_ms;
        self
    }

    pub fn with_mode(mut self, mode: SmoothingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_limiter_threshold(mut self, threshold: f64) -> Self {
        self.limiter_threshold = threshold;
        self
    }
}

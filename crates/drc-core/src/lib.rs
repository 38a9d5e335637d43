//! drc-core: Shared types for the QADRC dynamic-range engine
//!
//! Provides the planar copy-on-write [`SampleBlock`], the fixed
//! [`StreamFormat`] negotiated once per stream, decibel helpers and the
//! [`DrcError`] type used across all crates.

mod error;
mod sample;

pub use error::*;
pub use sample::*;

use serde::{Deserialize, Serialize};

/// Channel count and sample rate, fixed for the lifetime of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFormat {
    pub channels: usize,
    pub sample_rate: u32,
}

impl StreamFormat {
    pub fn new(channels: usize, sample_rate: u32) -> DrcResult<Self> {
        let format = Self {
            channels,
            sample_rate,
        };
        format.validate()?;
        Ok(format)
    }

    pub fn validate(&self) -> DrcResult<()> {
        if self.channels == 0 {
            return Err(DrcError::config("channel count must be at least 1"));
        }
        if self.sample_rate == 0 {
            return Err(DrcError::config("sample rate must be positive"));
        }
        Ok(())
    }

    #[inline]
    pub fn sample_rate_f64(&self) -> f64 {
        self.sample_rate as f64
    }

    /// Convert a duration in milliseconds to a whole number of samples
    #[inline]
    pub fn ms_to_samples(&self, ms: f64) -> usize {
        (self.sample_rate_f64() * ms / 1000.0).round().max(0.0) as usize
    }

    /// Check that a block matches this format's channel count
    pub fn check_block(&self, block: &SampleBlock) -> DrcResult<()> {
        if block.num_channels() != self.channels {
            return Err(DrcError::ChannelMismatch {
                expected: self.channels,
                got: block.num_channels(),
            });
        }
        Ok(())
    }
}

impl Default for StreamFormat {
    fn default() -> Self {
        Self {
            channels: 2,
            sample_rate: 48000,
        }
    }
}

/// Convert dB to linear gain
#[inline]
pub fn db_to_linear(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Convert linear amplitude to dB, floored at -120 dB below 1e-6
#[inline]
pub fn linear_to_db(linear: f64) -> f64 {
    if linear < 1e-6 {
        -120.0
    } else {
        20.0 * linear.log10()
    }
}

//! Soft-knee gain computer (log domain)

use drc_core::{DrcError, DrcResult};

/// Static compressor curve mapping a level in dB to a gain change in dB.
///
/// Below `threshold - knee/2` no gain change is applied, above
/// `threshold + knee/2` the curve follows `slope * (level - threshold)`, and
/// in between a quadratic joins the two branches without a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainComputer {
    threshold: f64,
    ratio: f64,
    knee: f64,
    t_lo: f64,
    t_hi: f64,
    slope: f64,
    knee_factor: f64,
}

impl GainComputer {
    pub fn new(threshold_db: f64, ratio: f64, knee_db: f64) -> DrcResult<Self> {
        if !threshold_db.is_finite() {
            return Err(DrcError::config(format!("threshold {} dB is not finite", threshold_db)));
        }
        if !(ratio >= 1.0) || !ratio.is_finite() {
            return Err(DrcError::config(format!("ratio {} must be >= 1", ratio)));
        }
        if !(knee_db >= 0.0) || !knee_db.is_finite() {
            return Err(DrcError::config(format!("knee width {} dB must be >= 0", knee_db)));
        }

        let slope = (1.0 - ratio) / ratio;
        let knee_factor = if knee_db > 0.0 {
            slope / (2.0 * knee_db)
        } else {
            0.0
        };

        Ok(Self {
            threshold: threshold_db,
            ratio,
            knee: knee_db,
            t_lo: threshold_db - knee_db / 2.0,
            t_hi: threshold_db + knee_db / 2.0,
            slope,
            knee_factor,
        })
    }

    /// Gain change in dB (zero or negative) for an input level in dB
    #[inline]
    pub fn compute_gain(&self, level_db: f64) -> f64 {
        if level_db < self.t_lo {
            0.0
        } else if level_db > self.t_hi {
            self.slope * (level_db - self.threshold)
        } else {
            let delta = level_db - self.t_lo;
            delta * delta * self.knee_factor
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn knee(&self) -> f64 {
        self.knee
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    /// Lower and upper knee bounds `(Tlo, Thi)`
    pub fn knee_bounds(&self) -> (f64, f64) {
        (self.t_lo, self.t_hi)
    }
}

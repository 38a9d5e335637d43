//! Gain curve smoothing
//!
//! Two shapes are supported:
//! - [`SmoothingCascade`]: block-rate RMS window → gain computer → minimum
//!   filter → Gaussian filter, each stage a [`RingWindow`] reducer, the last
//!   two smoothing linear gain factors
//! - [`ExponentialSmoother`]: sample-rate decoupled attack/release detector
//!   working in the log domain
//!
//! # Design
//! Every cascade stage only emits once its window reports ready, so the
//! cascade has a fixed latency in blocks ([`SmoothingCascade::latency_blocks`])
//! that the lookahead delay line compensates.

use serde::{Deserialize, Serialize};

use drc_core::{DrcError, DrcResult, db_to_linear};

use crate::gain_computer::GainComputer;
use crate::level_detector::energy_to_db;
use crate::ring_window::RingWindow;

/// Number of consecutive block energies combined into one RMS value
pub const RMS_WINDOW_BLOCKS: usize = 4;

/// Smoothing shape selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingMode {
    /// Block-rate RMS + minimum + Gaussian cascade
    #[default]
    Cascade,
    /// Sample-rate attack/release peak smoother
    Exponential,
}

// ============ Window reducers ============

/// Rolling sum of block energies, reduced to one RMS level in dB
#[derive(Debug, Clone)]
pub struct RmsWindow {
    window: RingWindow,
    frame_len: usize,
}

impl RmsWindow {
    pub fn new(blocks: usize, frame_len: usize) -> Self {
        Self {
            window: RingWindow::new(blocks),
            frame_len: frame_len.max(1),
        }
    }

    /// Push a full-block-equivalent energy; returns the window level in dB
    pub fn push(&mut self, energy: f64) -> Option<f64> {
        if !self.window.push(energy) {
            return None;
        }
        let sum: f64 = self.window.iter().sum();
        Some(energy_to_db(sum, self.window.capacity() * self.frame_len))
    }

    pub fn window(&self) -> &RingWindow {
        &self.window
    }

    pub fn reset(&mut self) {
        self.window.reset();
    }
}

/// Sliding minimum: keeps the most conservative value in the neighbourhood
#[derive(Debug, Clone)]
pub struct MinimumFilter {
    window: RingWindow,
}

impl MinimumFilter {
    pub fn new(size: usize) -> Self {
        Self {
            window: RingWindow::new(size),
        }
    }

    pub fn push(&mut self, value: f64) -> Option<f64> {
        if !self.window.push(value) {
            return None;
        }
        Some(self.window.iter().fold(f64::INFINITY, f64::min))
    }

    pub fn window(&self) -> &RingWindow {
        &self.window
    }

    pub fn reset(&mut self) {
        self.window.reset();
    }
}

/// Discrete Gaussian convolution over a centered window
#[derive(Debug, Clone)]
pub struct GaussianFilter {
    window: RingWindow,
    weights: Vec<f64>,
}

impl GaussianFilter {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            window: RingWindow::new(size),
            weights: Self::compute_weights(size),
        }
    }

    /// Normalised weights, `sigma = ((size/2 - 1) / 3) + 1/3`
    pub fn compute_weights(size: usize) -> Vec<f64> {
        let sigma = ((size as f64 / 2.0 - 1.0) / 3.0) + 1.0 / 3.0;
        let offset = (size / 2) as f64;
        let c1 = 1.0 / (sigma * (2.0 * std::f64::consts::PI).sqrt());
        let c2 = 2.0 * sigma * sigma;

        let mut weights: Vec<f64> = (0..size)
            .map(|i| {
                let x = i as f64 - offset;
                c1 * (-(x * x) / c2).exp()
            })
            .collect();

        let total: f64 = weights.iter().sum();
        for w in weights.iter_mut() {
            *w /= total;
        }
        weights
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn push(&mut self, value: f64) -> Option<f64> {
        if !self.window.push(value) {
            return None;
        }
        Some(self.window.iter().zip(&self.weights).map(|(v, w)| v * w).sum())
    }

    pub fn window(&self) -> &RingWindow {
        &self.window
    }

    pub fn reset(&mut self) {
        self.window.reset();
    }
}

// ============ Cascade ============

/// Block-rate smoothing cascade producing linear gain factors
#[derive(Debug, Clone)]
pub struct SmoothingCascade {
    rms: RmsWindow,
    minimum: MinimumFilter,
    gaussian: GaussianFilter,
}

impl SmoothingCascade {
    /// `min_size` and `filter_size` must be odd
    pub fn new(frame_len: usize, min_size: usize, filter_size: usize) -> DrcResult<Self> {
        for (name, size) in [("minimum filter", min_size), ("gaussian filter", filter_size)] {
            if size == 0 || size % 2 == 0 {
                return Err(DrcError::config(format!(
                    "{} length {} is invalid, must be an odd value",
                    name, size
                )));
            }
        }

        Ok(Self {
            rms: RmsWindow::new(RMS_WINDOW_BLOCKS, frame_len),
            minimum: MinimumFilter::new(min_size),
            gaussian: GaussianFilter::new(filter_size),
        })
    }

    /// Blocks between pushing an energy and receiving its smoothed gain
    pub fn latency_blocks(&self) -> usize {
        self.rms.window().warmup_lag()
            + self.minimum.window().warmup_lag()
            + self.gaussian.window().warmup_lag()
    }

    /// Feed one block energy; returns a linear gain once every stage is ready.
    ///
    /// The minimum and Gaussian stages run on linear gain factors.
    pub fn push(&mut self, energy: f64, computer: &GainComputer) -> Option<f64> {
        let level_db = self.rms.push(energy)?;
        let gain = db_to_linear(computer.compute_gain(level_db));
        let floor = self.minimum.push(gain)?;
        self.gaussian.push(floor)
    }

    pub fn reset(&mut self) {
        self.rms.reset();
        self.minimum.reset();
        self.gaussian.reset();
    }
}

// ============ Exponential smoother ============

/// Decoupled peak detector smoothing a gain curve in dB.
///
/// The release stage tracks downward moves instantly and recovers with
/// `alpha_r`; the attack stage then low-passes the result with `alpha_a`.
#[derive(Debug, Clone)]
pub struct ExponentialSmoother {
    alpha_a: f64,
    alpha_r: f64,
    y_a: f64,
    y_r: f64,
}

impl ExponentialSmoother {
    const DENORMAL_GUARD: f64 = 1e-120;

    pub fn new(attack_ms: f64, release_ms: f64, sample_rate: f64) -> Self {
        Self {
            alpha_a: Self::alpha(attack_ms / 1000.0, sample_rate),
            alpha_r: Self::alpha(release_ms / 1000.0, sample_rate),
            y_a: 0.0,
            y_r: 0.0,
        }
    }

    /// `exp(-1 / (t * fs))`, zero for instantaneous response
    pub fn alpha(seconds: f64, sample_rate: f64) -> f64 {
        if seconds > 0.0 {
            (-1.0 / (seconds * sample_rate)).exp()
        } else {
            0.0
        }
    }

    #[inline]
    pub fn process(&mut self, x: f64) -> f64 {
        let eps = Self::DENORMAL_GUARD;
        self.y_r = x.min(self.alpha_r * self.y_r + (1.0 - self.alpha_r) * x + eps - eps);
        self.y_a = self.alpha_a * self.y_a + (1.0 - self.alpha_a) * self.y_r + eps - eps;
        self.y_a
    }

    pub fn coefficients(&self) -> (f64, f64) {
        (self.alpha_a, self.alpha_r)
    }

    pub fn current(&self) -> f64 {
        self.y_a
    }

    pub fn reset(&mut self) {
        self.y_a = 0.0;
        self.y_r = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gaussian_weights_sum_to_one() {
        for size in (1..=301).step_by(2) {
            let weights = GaussianFilter::compute_weights(size);
            let total: f64 = weights.iter().sum();
            assert!((total - 1.0).abs() < 1e-9, "size {} sums to {}", size, total);
        }
    }

    #[test]
    fn test_gaussian_weights_symmetric_peak_center() {
        let weights = GaussianFilter::compute_weights(31);
        for i in 0..15 {
            assert_relative_eq!(weights[i], weights[30 - i], epsilon = 1e-15);
            assert!(weights[i] < weights[i + 1]);
        }
    }

    #[test]
    fn test_gaussian_constant_input() {
        let mut filter = GaussianFilter::new(9);
        let mut outputs = Vec::new();
        for _ in 0..20 {
            if let Some(v) = filter.push(-3.5) {
                outputs.push(v);
            }
        }
        assert!(!outputs.is_empty());
        for v in outputs {
            assert_relative_eq!(v, -3.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_minimum_filter_holds_dips() {
        let mut filter = MinimumFilter::new(3);
        let mut outputs = Vec::new();
        for v in [0.0, 0.0, -6.0, 0.0, 0.0, 0.0] {
            if let Some(m) = filter.push(v) {
                outputs.push(m);
            }
        }
        // window of 3: the dip is held for three consecutive outputs
        assert_eq!(outputs, vec![0.0, -6.0, -6.0, -6.0, 0.0]);
    }

    #[test]
    fn test_cascade_rejects_even_sizes() {
        assert!(SmoothingCascade::new(4800, 4, 31).is_err());
        assert!(SmoothingCascade::new(4800, 5, 30).is_err());
        assert!(SmoothingCascade::new(4800, 5, 31).is_ok());
    }

    #[test]
    fn test_cascade_latency() {
        let computer = GainComputer::new(-35.0, 1.5, 20.0).unwrap();
        let mut cascade = SmoothingCascade::new(4800, 5, 9).unwrap();
        assert_eq!(cascade.latency_blocks(), 2 + 2 + 4);

        let mut pushes = 0;
        loop {
            pushes += 1;
            if cascade.push(1.0, &computer).is_some() {
                break;
            }
        }
        assert_eq!(pushes - 1, cascade.latency_blocks());
    }

    #[test]
    fn test_cascade_steady_state_matches_static_curve() {
        let computer = GainComputer::new(-35.0, 1.5, 20.0).unwrap();
        let mut cascade = SmoothingCascade::new(100, 3, 5).unwrap();

        // mean square 0.01 per sample => -20 dB
        let energy = 0.01 * 100.0;
        let mut gain = None;
        for _ in 0..20 {
            gain = cascade.push(energy, &computer).or(gain);
        }

        let expected = db_to_linear(computer.compute_gain(-20.0));
        assert_relative_eq!(gain.unwrap(), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_cascade_smooths_linear_gain() {
        let computer = GainComputer::new(-35.0, 1.5, 20.0).unwrap();
        let frame_len = 100;
        let mut cascade = SmoothingCascade::new(frame_len, 3, 5).unwrap();

        // stage by stage reference in the linear domain
        let mut rms = RmsWindow::new(RMS_WINDOW_BLOCKS, frame_len);
        let mut minimum = MinimumFilter::new(3);
        let mut gaussian = GaussianFilter::new(5);

        // quiet then loud: the transition separates linear from dB averaging
        let energies = (0..30).map(|b| if b < 15 { 1e-6 } else { 0.4 * frame_len as f64 });
        let mut checked = 0;
        let mut max_gap = 0.0f64;
        for energy in energies {
            let got = cascade.push(energy, &computer);
            let expected = rms
                .push(energy)
                .and_then(|db| minimum.push(db_to_linear(computer.compute_gain(db))))
                .and_then(|g| gaussian.push(g));
            assert_eq!(got.is_some(), expected.is_some());
            if let (Some(got), Some(expected)) = (got, expected) {
                assert_relative_eq!(got, expected, epsilon = 1e-12);
                assert!(got > 0.0 && got <= 1.0);
                checked += 1;
            }
        }
        assert_eq!(checked, 30 - cascade.latency_blocks());

        // averaging dB values instead would give the geometric mean
        let mut db_minimum = MinimumFilter::new(3);
        let mut db_gaussian = GaussianFilter::new(5);
        let mut rms = RmsWindow::new(RMS_WINDOW_BLOCKS, frame_len);
        let mut linear = SmoothingCascade::new(frame_len, 3, 5).unwrap();
        for b in 0..30 {
            let energy = if b < 15 { 1e-6 } else { 0.4 * frame_len as f64 };
            let got = linear.push(energy, &computer);
            let db = rms
                .push(energy)
                .and_then(|db| db_minimum.push(computer.compute_gain(db)))
                .and_then(|g| db_gaussian.push(g))
                .map(db_to_linear);
            if let (Some(got), Some(db)) = (got, db) {
                assert!(got >= db - 1e-12);
                max_gap = max_gap.max(got - db);
            }
        }
        assert!(max_gap > 1e-3);
    }

    #[test]
    fn test_exponential_instantaneous_when_times_zero() {
        let mut smoother = ExponentialSmoother::new(0.0, 0.0, 48000.0);
        assert_eq!(smoother.coefficients(), (0.0, 0.0));
        for x in [-3.0, 0.0, -12.0, -1.0] {
            assert_eq!(smoother.process(x), x);
        }
    }

    #[test]
    fn test_exponential_attack_and_release() {
        let mut smoother = ExponentialSmoother::new(1.0, 100.0, 48000.0);
        let (alpha_a, alpha_r) = smoother.coefficients();
        assert_relative_eq!(alpha_a, (-1.0f64 / 48.0).exp(), epsilon = 1e-15);
        assert_relative_eq!(alpha_r, (-1.0f64 / 4800.0).exp(), epsilon = 1e-15);

        // attack towards -10 dB: monotone approach, ~63% after one time constant
        let mut y = 0.0;
        for _ in 0..48 {
            y = smoother.process(-10.0);
        }
        assert!(y < -5.0 && y > -10.0, "attack reached {}", y);
        for _ in 0..2000 {
            y = smoother.process(-10.0);
        }
        assert_relative_eq!(y, -10.0, epsilon = 1e-6);

        // release back towards 0 dB is much slower
        for _ in 0..48 {
            y = smoother.process(0.0);
        }
        assert!(y < -9.0, "release too fast: {}", y);
    }
}

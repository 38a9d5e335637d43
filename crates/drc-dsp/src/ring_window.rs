//! Fixed-capacity sliding window with edge-mirrored warm-up
//!
//! Building block for every windowed reducer in the smoothing cascade. A
//! centered filter of length K normally needs K/2 future values before its
//! first output; the window instead pre-fills with the first value and, when
//! it first fills up, mirrors the causal prefix so the first window is
//! symmetric around a real sample.

use std::collections::VecDeque;

/// Circular FIFO of `f64` values
#[derive(Debug, Clone)]
pub struct RingWindow {
    capacity: usize,
    values: VecDeque<f64>,
    primed: bool,
}

impl RingWindow {
    /// Create an empty window. `capacity` is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity),
            primed: false,
        }
    }

    /// Push a value, returning true when the window is full and can be reduced
    pub fn push(&mut self, value: f64) -> bool {
        if !self.primed {
            self.primed = true;
            let pre_fill = (self.capacity - 1) / 2 + 1;
            self.values.extend(std::iter::repeat_n(value, pre_fill));
            return self.is_full();
        }

        if self.is_full() {
            self.values.pop_front();
            self.values.push_back(value);
            return true;
        }

        self.values.push_back(value);
        if self.is_full() {
            self.mirror_prefix();
            return true;
        }
        false
    }

    // slot[i] = slot[K-1-i] for the first (K-1)/2 slots
    fn mirror_prefix(&mut self) {
        let k = self.capacity;
        for i in 0..(k - 1) / 2 {
            self.values[i] = self.values[k - 1 - i];
        }
    }

    /// i-th element in logical (oldest first) order
    #[inline]
    pub fn peek(&self, index: usize) -> f64 {
        self.values[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    /// Number of pushes after which the window first reports ready, minus one
    pub fn warmup_lag(&self) -> usize {
        let k = self.capacity;
        k - 1 - (k - 1) / 2
    }

    pub fn reset(&mut self) {
        self.values.clear();
        self.primed = false;
    }
}

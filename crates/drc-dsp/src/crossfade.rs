//! Linear crossfade between successive block gains

/// Precomputed fade-out / fade-in ramp pair
#[derive(Debug, Clone)]
pub struct Crossfader {
    fade_out: Vec<f64>,
    fade_in: Vec<f64>,
}

impl Crossfader {
    pub fn new(len: usize) -> Self {
        let step = 1.0 / len.max(1) as f64;
        let fade_out: Vec<f64> = (0..len).map(|i| 1.0 - step * i as f64).collect();
        let fade_in = fade_out.iter().map(|f| 1.0 - f).collect();
        Self { fade_out, fade_in }
    }

    pub fn len(&self) -> usize {
        self.fade_out.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fade_out.is_empty()
    }

    #[inline]
    pub fn factor(&self, pos: usize, prev: f64, current: f64) -> f64 {
        self.fade_out[pos] * prev + self.fade_in[pos] * current
    }

    /// Fill `output` with the ramp from `prev` towards `current`.
    ///
    /// Uses the precomputed tables when the lengths agree, otherwise a ramp
    /// of the output's own length.
    pub fn fill(&self, prev: f64, current: f64, output: &mut [f64]) {
        if output.len() == self.len() {
            for (pos, out) in output.iter_mut().enumerate() {
                *out = self.factor(pos, prev, current);
            }
        } else {
            let step = 1.0 / output.len().max(1) as f64;
            for (pos, out) in output.iter_mut().enumerate() {
                let fade_out = 1.0 - step * pos as f64;
                *out = fade_out * prev + (1.0 - fade_out) * current;
            }
        }
    }
}

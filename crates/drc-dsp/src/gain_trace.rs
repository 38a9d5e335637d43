//! Applied-gain trace
//!
//! Averages the gain coefficients reaching the output over 10 ms intervals
//! and writes each average as one byte (`0` = silence, `255` = unity).

use std::fmt;
use std::io::Write;

use drc_core::DrcResult;

/// Trace intervals per second
pub const TRACE_RATE_HZ: u32 = 100;

/// Diagnostic sink for applied gain coefficients
pub struct GainTrace<W: Write> {
    writer: W,
    interval: usize,
    sum: f64,
    count: usize,
    written: u64,
}

impl<W: Write> GainTrace<W> {
    pub fn new(writer: W, sample_rate: u32) -> Self {
        Self {
            writer,
            interval: (sample_rate / TRACE_RATE_HZ).max(1) as usize,
            sum: 0.0,
            count: 0,
            written: 0,
        }
    }

    /// Samples averaged per byte
    pub fn interval(&self) -> usize {
        self.interval
    }

    /// Bytes written so far
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    #[inline]
    pub fn quantize(gain: f64) -> u8 {
        (gain.clamp(0.0, 1.0) * 255.0).round() as u8
    }

    /// Accumulate coefficients in output order
    pub fn record(&mut self, coefficients: &[f64]) -> DrcResult<()> {
        for &g in coefficients {
            self.sum += g;
            self.count += 1;
            if self.count == self.interval {
                self.emit()?;
            }
        }
        Ok(())
    }

    /// Write the partial interval, if any, and flush the writer
    pub fn finish(&mut self) -> DrcResult<()> {
        if self.count > 0 {
            self.emit()?;
        }
        self.writer.flush()?;
        log::debug!("GainTrace: {} intervals written", self.written);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.sum = 0.0;
        self.count = 0;
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn emit(&mut self) -> DrcResult<()> {
        let mean = self.sum / self.count as f64;
        self.writer.write_all(&[Self::quantize(mean)])?;
        self.written += 1;
        self.sum = 0.0;
        self.count = 0;
        Ok(())
    }
}

impl<W: Write> fmt::Debug for GainTrace<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GainTrace")
            .field("interval", &self.interval)
            .field("pending", &self.count)
            .field("written", &self.written)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize() {
        assert_eq!(GainTrace::<Vec<u8>>::quantize(1.0), 255);
        assert_eq!(GainTrace::<Vec<u8>>::quantize(0.0), 0);
        assert_eq!(GainTrace::<Vec<u8>>::quantize(0.5), 128);
        assert_eq!(GainTrace::<Vec<u8>>::quantize(1.7), 255);
        assert_eq!(GainTrace::<Vec<u8>>::quantize(-0.2), 0);
    }

    #[test]
    fn test_one_byte_per_interval() {
        let mut trace = GainTrace::new(Vec::new(), 48000);
        assert_eq!(trace.interval(), 480);

        trace.record(&[1.0; 480]).unwrap();
        trace.record(&[0.5; 300]).unwrap();
        trace.record(&[0.5; 180]).unwrap();
        assert_eq!(trace.bytes_written(), 2);

        trace.record(&[0.0; 10]).unwrap();
        trace.finish().unwrap();
        assert_eq!(trace.into_inner(), vec![255, 128, 0]);
    }

    #[test]
    fn test_mean_over_interval() {
        let mut trace = GainTrace::new(Vec::new(), 400);
        trace.record(&[1.0, 0.0, 1.0, 0.0]).unwrap();
        trace.finish().unwrap();
        assert_eq!(trace.into_inner(), vec![128]);
    }
}

//! WAV reading and writing (hound)

use std::path::Path;

use crate::config::OutputFormat;
use crate::error::{OfflineError, OfflineResult};

/// Planar audio decoded from or destined for a WAV file
#[derive(Debug, Clone, PartialEq)]
pub struct WavAudio {
    /// Sample data per channel, nominally in [-1, 1]
    pub channels: Vec<Vec<f64>>,

    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl WavAudio {
    pub fn new(channels: Vec<Vec<f64>>, sample_rate: u32) -> Self {
        Self { channels, sample_rate }
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel
    pub fn num_frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn duration(&self) -> f64 {
        self.num_frames() as f64 / self.sample_rate as f64
    }

    pub fn peak(&self) -> f64 {
        self.channels
            .iter()
            .flatten()
            .fold(0.0f64, |m, s| m.max(s.abs()))
    }
}

/// Read a WAV file (integer or float) into planar f64
pub fn read_wav<P: AsRef<Path>>(path: P) -> OfflineResult<WavAudio> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(OfflineError::InputNotFound(path.display().to_string()));
    }
    let reader = hound::WavReader::open(path)
        .map_err(|e| OfflineError::ReadError(format!("{}: {}", path.display(), e)))?;

    let spec = reader.spec();
    let num_channels = spec.channels as usize;
    if num_channels == 0 {
        return Err(OfflineError::UnsupportedFormat(format!("{}: no channels", path.display())));
    }

    let samples: Vec<f64> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(|v| v as f64))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| OfflineError::ReadError(format!("{}: {}", path.display(), e)))?,
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f64;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f64 / max_val))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| OfflineError::ReadError(format!("{}: {}", path.display(), e)))?
        }
    };

    let num_frames = samples.len() / num_channels;
    let mut channels = vec![Vec::with_capacity(num_frames); num_channels];
    for (i, sample) in samples.into_iter().enumerate() {
        channels[i % num_channels].push(sample);
    }

    log::info!(
        "Read {}: {} ch, {} Hz, {}-bit {:?}, {} frames",
        path.display(),
        num_channels,
        spec.sample_rate,
        spec.bits_per_sample,
        spec.sample_format,
        num_frames
    );

    Ok(WavAudio::new(channels, spec.sample_rate))
}

/// Write planar audio as an interleaved WAV file
pub fn write_wav<P: AsRef<Path>>(path: P, audio: &WavAudio, format: OutputFormat) -> OfflineResult<()> {
    let path = path.as_ref();
    let sample_format = match format {
        OutputFormat::Float32 => hound::SampleFormat::Float,
        OutputFormat::Int16 | OutputFormat::Int24 => hound::SampleFormat::Int,
    };
    let spec = hound::WavSpec {
        channels: audio.num_channels() as u16,
        sample_rate: audio.sample_rate,
        bits_per_sample: format.bits_per_sample(),
        sample_format,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| OfflineError::WriteError(format!("{}: {}", path.display(), e)))?;

    let full_scale = match format {
        OutputFormat::Int16 => i16::MAX as f64,
        OutputFormat::Int24 => ((1i32 << 23) - 1) as f64,
        OutputFormat::Float32 => 1.0,
    };

    for i in 0..audio.num_frames() {
        for channel in &audio.channels {
            let sample = channel[i];
            match format {
                OutputFormat::Float32 => writer.write_sample(sample as f32)?,
                OutputFormat::Int16 | OutputFormat::Int24 => {
                    let quantized = (sample * full_scale).round().clamp(-full_scale - 1.0, full_scale);
                    writer.write_sample(quantized as i32)?
                }
            }
        }
    }

    writer
        .finalize()
        .map_err(|e| OfflineError::WriteError(format!("{}: {}", path.display(), e)))?;

    log::info!(
        "Wrote {}: {} ch, {} Hz, {}-bit, {} frames",
        path.display(),
        audio.num_channels(),
        audio.sample_rate,
        format.bits_per_sample(),
        audio.num_frames()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_stats() {
        let audio = WavAudio::new(vec![vec![0.0, -0.75, 0.5, 0.0], vec![0.25; 4]], 4);
        assert_eq!(audio.num_channels(), 2);
        assert_eq!(audio.num_frames(), 4);
        assert_eq!(audio.duration(), 1.0);
        assert_eq!(audio.peak(), 0.75);
    }

    #[test]
    fn test_missing_input() {
        let err = read_wav("/definitely/not/here.wav").unwrap_err();
        assert!(matches!(err, OfflineError::InputNotFound(_)));
    }
}

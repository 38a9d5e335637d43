//! Whole-file rendering through the streaming chain

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Instant;

use drc_core::{SampleBlock, StreamFormat};
use drc_dsp::{Compressor, MonoParts, ProcessingChain, SpikeLimiter, StreamProcessor};

use crate::config::RenderConfig;
use crate::error::{OfflineError, OfflineResult};
use crate::wav::{WavAudio, read_wav, write_wav};

/// Summary of one render
#[derive(Debug, Clone, PartialEq)]
pub struct RenderStats {
    /// Samples per channel in and out
    pub frames: usize,
    /// Blocks pushed into the chain
    pub blocks: usize,
    /// Stage names in processing order
    pub stages: Vec<&'static str>,
    /// Fixed chain latency in samples
    pub latency: usize,
    pub input_peak: f64,
    pub output_peak: f64,
}

/// Assemble compressor → limiter → mono parts for an input format
pub fn build_chain(config: &RenderConfig, format: StreamFormat) -> OfflineResult<ProcessingChain> {
    config.validate()?;
    let drc = config.drc.clone().with_format(format.channels, format.sample_rate);
    drc.validate()?;

    let mut chain = ProcessingChain::new();

    if config.compressor {
        let mut compressor = Compressor::new(drc.clone())?;
        if let Some(path) = &config.gain_trace {
            let file = File::create(path)
                .map_err(|e| OfflineError::WriteError(format!("{}: {}", path.display(), e)))?;
            compressor = compressor.with_gain_trace(Box::new(BufWriter::new(file)));
        }
        chain.push_stage(Box::new(compressor));
    }

    if config.limiter {
        chain.push_stage(Box::new(SpikeLimiter::new(format, drc.limiter_threshold)?));
    }

    if !config.mono_parts.is_empty() {
        chain.push_stage(Box::new(MonoParts::new(
            format,
            config.mono_parts.clone(),
            drc.frame_len(),
        )?));
    }

    Ok(chain)
}

/// Render decoded audio, pushing nominal-length blocks through the chain
pub fn render(audio: &WavAudio, config: &RenderConfig) -> OfflineResult<(WavAudio, RenderStats)> {
    let format = StreamFormat::new(audio.num_channels(), audio.sample_rate)?;
    let mut chain = build_chain(config, format)?;
    let block_len = config.drc.clone().with_format(format.channels, format.sample_rate).frame_len();

    let frames = audio.num_frames();
    let mut output = vec![Vec::with_capacity(frames); format.channels];
    let mut collect = |blocks: Vec<SampleBlock>| {
        for block in blocks {
            for (out, samples) in output.iter_mut().zip(block.channels()) {
                out.extend_from_slice(samples);
            }
        }
    };

    let mut blocks = 0;
    let mut pos = 0;
    while pos < frames {
        let end = (pos + block_len).min(frames);
        let block = SampleBlock::new(audio.channels.iter().map(|c| c[pos..end].to_vec()).collect())?;
        collect(chain.push(block)?);
        blocks += 1;
        pos = end;
    }
    collect(chain.flush()?);

    let rendered = WavAudio::new(output, audio.sample_rate);
    if rendered.num_frames() != frames {
        return Err(OfflineError::ProcessingFailed(format!(
            "chain returned {} frames for {} input frames",
            rendered.num_frames(),
            frames
        )));
    }

    let stats = RenderStats {
        frames,
        blocks,
        stages: chain.stage_names(),
        latency: chain.latency(),
        input_peak: audio.peak(),
        output_peak: rendered.peak(),
    };
    Ok((rendered, stats))
}

/// Read `input`, render it and write `output`
pub fn render_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    config: &RenderConfig,
) -> OfflineResult<RenderStats> {
    let started = Instant::now();
    let audio = read_wav(input)?;
    let (rendered, stats) = render(&audio, config)?;
    write_wav(output, &rendered, config.output_format)?;

    log::info!(
        "Rendered {} frames in {} blocks through [{}] in {:.2?} (latency {} samples, peak {:.4} -> {:.4})",
        stats.frames,
        stats.blocks,
        stats.stages.join(" -> "),
        started.elapsed(),
        stats.latency,
        stats.input_peak,
        stats.output_peak
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use drc_dsp::MonoPart;

    fn sine(frames: usize, amp: f64) -> Vec<f64> {
        (0..frames)
            .map(|i| amp * (2.0 * std::f64::consts::PI * 440.0 * i as f64 / 48000.0).sin())
            .collect()
    }

    #[test]
    fn test_chain_layout() {
        let format = StreamFormat::new(2, 48000).unwrap();
        let config = RenderConfig::default().with_mono_parts(vec![MonoPart { start: 1, end: 2 }]);
        let chain = build_chain(&config, format).unwrap();
        assert_eq!(chain.stage_names(), vec!["compressor", "spike_limiter", "monoparts"]);

        let limiter_only = RenderConfig::default().with_compressor(false);
        let chain = build_chain(&limiter_only, format).unwrap();
        assert_eq!(chain.stage_names(), vec!["spike_limiter"]);
        assert_eq!(chain.latency(), 0);
    }

    #[test]
    fn test_mono_parts_need_stereo() {
        let format = StreamFormat::new(1, 48000).unwrap();
        let config = RenderConfig::default().with_mono_parts(vec![MonoPart { start: 1, end: 2 }]);
        assert!(matches!(build_chain(&config, format), Err(OfflineError::Dsp(_))));
    }

    #[test]
    fn test_render_keeps_length_and_bounds_peaks() {
        let audio = WavAudio::new(vec![sine(48000 * 2 + 123, 1.4), sine(48000 * 2 + 123, 0.2)], 48000);
        let (rendered, stats) = render(&audio, &RenderConfig::default()).unwrap();

        assert_eq!(rendered.num_frames(), audio.num_frames());
        assert_eq!(stats.blocks, 21);
        assert!(stats.output_peak <= drc_dsp::DEFAULT_LIMITER_THRESHOLD + 1e-4);
        assert!(stats.input_peak > 1.3);
    }

    #[test]
    fn test_empty_input() {
        let audio = WavAudio::new(vec![Vec::new(), Vec::new()], 44100);
        let (rendered, stats) = render(&audio, &RenderConfig::default()).unwrap();
        assert_eq!(rendered.num_frames(), 0);
        assert_eq!(stats.blocks, 0);
    }
}

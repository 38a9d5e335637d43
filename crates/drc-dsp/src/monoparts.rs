//! Stereo → mono sections
//!
//! Folds selected ranges of blocks to mono with short crossfades in and out.
//! Parts are given as inclusive block index ranges `[start, end]` counted
//! from the first block of the stream. Only the edge blocks crossfade; the
//! blocks between them carry `(L + R) / 2` on both channels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use drc_core::{DrcError, DrcResult, SampleBlock, StreamFormat};

use crate::StreamProcessor;

/// One mono section in block indices, `start < end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonoPart {
    pub start: usize,
    pub end: usize,
}

impl MonoPart {
    pub fn new(start: usize, end: usize) -> DrcResult<Self> {
        if start >= end {
            return Err(DrcError::config(format!(
                "mono part {}-{} must start before it ends",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse a `"a-b|c-d"` list
    pub fn parse_list(s: &str) -> DrcResult<Vec<MonoPart>> {
        let parts = s
            .split('|')
            .map(str::parse)
            .collect::<DrcResult<Vec<MonoPart>>>()?;
        validate_parts(&parts)?;
        Ok(parts)
    }
}

impl FromStr for MonoPart {
    type Err = DrcError;

    fn from_str(s: &str) -> DrcResult<Self> {
        let bad = || DrcError::config(format!("cannot parse mono part '{}', expected <start>-<end>", s));
        let (a, b) = s.trim().split_once('-').ok_or_else(bad)?;
        let start = a.trim().parse().map_err(|_| bad())?;
        let end = b.trim().parse().map_err(|_| bad())?;
        Self::new(start, end)
    }
}

impl fmt::Display for MonoPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Parts must be non-empty, well formed and strictly ascending
pub fn validate_parts(parts: &[MonoPart]) -> DrcResult<()> {
    if parts.is_empty() {
        return Err(DrcError::config("mono parts list is empty"));
    }
    for part in parts {
        if part.start >= part.end {
            return Err(DrcError::config(format!("mono part {} must start before it ends", part)));
        }
    }
    for pair in parts.windows(2) {
        if pair[1].start <= pair[0].end {
            return Err(DrcError::config(format!(
                "mono part {} overlaps or precedes {}",
                pair[1], pair[0]
            )));
        }
    }
    Ok(())
}

// ============ Channel mixing ============

/// Ramp from stereo at the block start to mono at its end
fn stereo_to_mono(left: &mut [f64], right: &mut [f64]) {
    let step = 0.5 / (left.len() + 1) as f64;
    for (i, (l, r)) in left.iter_mut().zip(right.iter_mut()).enumerate() {
        let attack = (i + 1) as f64 * step;
        let release = 1.0 - attack;
        let (c0, c1) = (*l, *r);
        *l = c0 * release + c1 * attack;
        *r = c1 * release + c0 * attack;
    }
}

/// Ramp from mono at the block start back to stereo at its end
fn mono_to_stereo(left: &mut [f64], right: &mut [f64]) {
    let step = 0.5 / (left.len() + 1) as f64;
    for (i, (l, r)) in left.iter_mut().zip(right.iter_mut()).enumerate() {
        let attack = 0.5 + (i + 1) as f64 * step;
        let release = 1.0 - attack;
        let (c0, c1) = (*l, *r);
        *l = c0 * attack + c1 * release;
        *r = c1 * attack + c0 * release;
    }
}

fn full_mono(left: &mut [f64], right: &mut [f64]) {
    for (l, r) in left.iter_mut().zip(right.iter_mut()) {
        let avg = (*l + *r) / 2.0;
        *l = avg;
        *r = avg;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mix {
    Passthrough,
    StereoToMono,
    FullMono,
    MonoToStereo,
}

/// Mono section stage for stereo streams
#[derive(Debug, Clone)]
pub struct MonoParts {
    format: StreamFormat,
    parts: Vec<MonoPart>,
    /// Nominal block length; shorter blocks are treated as the stream tail
    block_len: usize,
    current_part: usize,
    block_index: usize,
    finished: bool,
}

impl MonoParts {
    pub fn new(format: StreamFormat, parts: Vec<MonoPart>, block_len: usize) -> DrcResult<Self> {
        format.validate()?;
        if format.channels != 2 {
            return Err(DrcError::config(format!(
                "mono parts need a stereo stream, got {} channels",
                format.channels
            )));
        }
        validate_parts(&parts)?;

        log::debug!(
            "MonoParts: {} sections over {}-sample blocks: {}",
            parts.len(),
            block_len,
            parts.iter().map(ToString::to_string).collect::<Vec<_>>().join("|")
        );

        Ok(Self {
            format,
            parts,
            block_len,
            current_part: 0,
            block_index: 0,
            finished: false,
        })
    }

    pub fn parts(&self) -> &[MonoPart] {
        &self.parts
    }

    /// Blocks seen so far
    pub fn block_index(&self) -> usize {
        self.block_index
    }

    fn mix_for(&mut self, index: usize, len: usize) -> Mix {
        let Some(part) = self.parts.get(self.current_part).copied() else {
            return Mix::Passthrough;
        };

        if index < part.start {
            Mix::Passthrough
        } else if index == part.start {
            if index == 0 { Mix::FullMono } else { Mix::StereoToMono }
        } else if index < part.end {
            Mix::FullMono
        } else {
            self.current_part += 1;
            let last_part = self.current_part == self.parts.len();
            if last_part && len < self.block_len {
                Mix::FullMono
            } else {
                Mix::MonoToStereo
            }
        }
    }
}

impl StreamProcessor for MonoParts {
    fn name(&self) -> &'static str {
        "monoparts"
    }

    fn push(&mut self, block: SampleBlock) -> DrcResult<Vec<SampleBlock>> {
        if self.finished {
            return Err(DrcError::StreamFinished);
        }
        self.format.check_block(&block)?;
        if block.is_empty() {
            return Ok(Vec::new());
        }

        let index = self.block_index;
        self.block_index += 1;

        let mix = self.mix_for(index, block.len());
        if mix == Mix::Passthrough {
            return Ok(vec![block]);
        }

        log::trace!("MonoParts: block {} {:?}", index, mix);
        let got = block.num_channels();
        let mut block = block;
        let [left, right] = block.channels_mut() else {
            return Err(DrcError::ChannelMismatch { expected: 2, got });
        };
        match mix {
            Mix::StereoToMono => stereo_to_mono(left, right),
            Mix::FullMono => full_mono(left, right),
            Mix::MonoToStereo => mono_to_stereo(left, right),
            Mix::Passthrough => {}
        }
        Ok(vec![block])
    }

    fn flush(&mut self) -> DrcResult<Vec<SampleBlock>> {
        if self.finished {
            return Err(DrcError::StreamFinished);
        }
        self.finished = true;
        if self.current_part < self.parts.len() {
            log::warn!(
                "MonoParts: stream ended after {} blocks with {} sections not completed",
                self.block_index,
                self.parts.len() - self.current_part
            );
        }
        Ok(Vec::new())
    }

    fn reset(&mut self) {
        self.current_part = 0;
        self.block_index = 0;
        self.finished = false;
    }
}

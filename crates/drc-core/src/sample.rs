//! Sample types and planar audio blocks

use std::sync::Arc;

use crate::error::{DrcError, DrcResult};

/// Type alias for audio samples (always f64 for maximum precision)
pub type Sample = f64;

/// Planar block of audio: one sample vector per channel, all the same length.
///
/// Cloning is cheap and shares the underlying storage. Every mutable accessor
/// first makes the storage exclusive (copy-on-write), so a stage holding a
/// clone never observes another stage's edits.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBlock {
    data: Arc<Vec<Vec<Sample>>>,
    len: usize,
}

impl SampleBlock {
    /// Build a block from planar channel data
    pub fn new(channels: Vec<Vec<Sample>>) -> DrcResult<Self> {
        let len = channels.first().map_or(0, Vec::len);
        for (channel, samples) in channels.iter().enumerate() {
            if samples.len() != len {
                return Err(DrcError::RaggedBlock {
                    channel,
                    expected: len,
                    got: samples.len(),
                });
            }
        }

        Ok(Self {
            data: Arc::new(channels),
            len,
        })
    }

    /// Block of `len` zero samples per channel
    pub fn silence(num_channels: usize, len: usize) -> Self {
        Self {
            data: Arc::new(vec![vec![0.0; len]; num_channels]),
            len,
        }
    }

    /// Deinterleave `frames * num_channels` samples into a block
    pub fn from_interleaved(samples: &[Sample], num_channels: usize) -> DrcResult<Self> {
        if num_channels == 0 {
            return Err(DrcError::config("block needs at least one channel"));
        }
        if samples.len() % num_channels != 0 {
            return Err(DrcError::RaggedBlock {
                channel: samples.len() % num_channels,
                expected: samples.len() / num_channels + 1,
                got: samples.len() / num_channels,
            });
        }

        let frames = samples.len() / num_channels;
        let mut channels = vec![Vec::with_capacity(frames); num_channels];
        for frame in samples.chunks_exact(num_channels) {
            for (ch, &s) in channels.iter_mut().zip(frame) {
                ch.push(s);
            }
        }

        Self::new(channels)
    }

    /// Samples per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn channel(&self, index: usize) -> &[Sample] {
        &self.data[index]
    }

    pub fn channels(&self) -> impl Iterator<Item = &[Sample]> {
        self.data.iter().map(Vec::as_slice)
    }

    /// True when another holder shares this block's storage
    #[inline]
    pub fn is_shared(&self) -> bool {
        Arc::strong_count(&self.data) > 1
    }

    /// Exclusive mutable access to one channel (clones shared storage first)
    pub fn channel_mut(&mut self, index: usize) -> &mut [Sample] {
        &mut self.make_exclusive()[index]
    }

    /// Exclusive mutable access to all channels (clones shared storage first)
    pub fn channels_mut(&mut self) -> &mut [Vec<Sample>] {
        self.make_exclusive().as_mut_slice()
    }

    fn make_exclusive(&mut self) -> &mut Vec<Vec<Sample>> {
        if self.is_shared() {
            log::trace!(
                "SampleBlock: copy-on-write of {} x {} samples",
                self.num_channels(),
                self.len
            );
        }
        Arc::make_mut(&mut self.data)
    }

    /// Multiply every channel's sample `offset + i` by `gains[i]`
    pub fn apply_gains(&mut self, offset: usize, gains: &[Sample]) {
        debug_assert!(offset + gains.len() <= self.len);
        for channel in self.channels_mut() {
            for (s, &g) in channel[offset..offset + gains.len()].iter_mut().zip(gains) {
                *s *= g;
            }
        }
    }

    /// Interleave into a single vector (frame-major)
    pub fn to_interleaved(&self) -> Vec<Sample> {
        let channels = self.num_channels();
        let mut out = Vec::with_capacity(self.len * channels);
        for i in 0..self.len {
            for ch in self.data.iter() {
                out.push(ch[i]);
            }
        }
        out
    }

    /// Take the planar data out, cloning only if still shared
    pub fn into_channels(self) -> Vec<Vec<Sample>> {
        Arc::try_unwrap(self.data).unwrap_or_else(|shared| (*shared).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ragged_block_rejected() {
        let err = SampleBlock::new(vec![vec![0.0; 4], vec![0.0; 3]]).unwrap_err();
        assert!(matches!(
            err,
            DrcError::RaggedBlock {
                channel: 1,
                expected: 4,
                got: 3
            }
        ));
    }

    #[test]
    fn test_copy_on_write() {
        let original = SampleBlock::new(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let mut copy = original.clone();
        assert!(original.is_shared());

        copy.channel_mut(0)[0] = 10.0;

        assert_eq!(original.channel(0), &[1.0, 2.0]);
        assert_eq!(copy.channel(0), &[10.0, 2.0]);
        assert!(!original.is_shared());
        assert!(!copy.is_shared());
    }

    #[test]
    fn test_interleave_roundtrip() {
        let interleaved = [1.0, -1.0, 2.0, -2.0, 3.0, -3.0];
        let block = SampleBlock::from_interleaved(&interleaved, 2).unwrap();

        assert_eq!(block.len(), 3);
        assert_eq!(block.channel(0), &[1.0, 2.0, 3.0]);
        assert_eq!(block.channel(1), &[-1.0, -2.0, -3.0]);
        assert_eq!(block.to_interleaved(), interleaved);
    }

    #[test]
    fn test_apply_gains_offset() {
        let mut block = SampleBlock::new(vec![vec![1.0; 4], vec![2.0; 4]]).unwrap();
        block.apply_gains(2, &[0.5, 0.25]);

        assert_eq!(block.channel(0), &[1.0, 1.0, 0.5, 0.25]);
        assert_eq!(block.channel(1), &[2.0, 2.0, 1.0, 0.5]);
    }
}

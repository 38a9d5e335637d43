//! Rebuffering of host blocks into fixed-length analysis frames
//!
//! The block-rate smoothing cascade measures one frame per push, so blocks of
//! arbitrary size are cut into frames of exactly `frame_len` samples. Only
//! the final frame of a stream may be shorter.

use drc_core::{DrcResult, Sample, SampleBlock};

/// Planar accumulator handing out back-to-back frames
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    frame_len: usize,
    /// Samples of the frame under construction, per channel
    pending: Vec<Vec<Sample>>,
    frame_index: u64,
}

impl FrameBuffer {
    pub fn new(channels: usize, frame_len: usize) -> Self {
        let frame_len = frame_len.max(1);
        Self {
            frame_len,
            pending: (0..channels).map(|_| Vec::with_capacity(frame_len)).collect(),
            frame_index: 0,
        }
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Samples per channel waiting for the frame to fill
    pub fn len(&self) -> usize {
        self.pending.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frames handed out so far
    pub fn total_frames(&self) -> u64 {
        self.frame_index
    }

    /// Append a block; returns every frame it completes, in order
    pub fn push(&mut self, block: SampleBlock) -> DrcResult<Vec<SampleBlock>> {
        if block.is_empty() {
            return Ok(Vec::new());
        }

        // aligned full frame: pass the block through without copying
        if self.is_empty() && block.len() == self.frame_len {
            self.frame_index += 1;
            return Ok(vec![block]);
        }

        let mut frames = Vec::new();
        let mut pos = 0;
        while pos < block.len() {
            let take = (self.frame_len - self.len()).min(block.len() - pos);
            for (buf, samples) in self.pending.iter_mut().zip(block.channels()) {
                buf.extend_from_slice(&samples[pos..pos + take]);
            }
            pos += take;

            if self.len() == self.frame_len {
                frames.push(self.take_pending()?);
            }
        }
        Ok(frames)
    }

    /// Partial frame left at end of stream
    pub fn take_remainder(&mut self) -> DrcResult<Option<SampleBlock>> {
        if self.is_empty() {
            return Ok(None);
        }
        self.take_pending().map(Some)
    }

    fn take_pending(&mut self) -> DrcResult<SampleBlock> {
        let frame_len = self.frame_len;
        let channels = self
            .pending
            .iter_mut()
            .map(|buf| std::mem::replace(buf, Vec::with_capacity(frame_len)))
            .collect();
        self.frame_index += 1;
        SampleBlock::new(channels)
    }

    pub fn reset(&mut self) {
        for buf in &mut self.pending {
            buf.clear();
        }
        self.frame_index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(start: usize, len: usize) -> SampleBlock {
        let left: Vec<f64> = (start..start + len).map(|i| i as f64).collect();
        let right = left.iter().map(|s| -s).collect();
        SampleBlock::new(vec![left, right]).unwrap()
    }

    #[test]
    fn test_odd_blocks_become_whole_frames() {
        let mut buffer = FrameBuffer::new(2, 8);
        let mut frames = Vec::new();
        let mut pos = 0;
        for len in [3, 5, 1, 13, 7, 2] {
            frames.extend(buffer.push(ramp(pos, len)).unwrap());
            pos += len;
        }

        // 31 samples: three full frames, 7 left over
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.len() == 8));
        assert_eq!(buffer.len(), 7);
        assert_eq!(buffer.total_frames(), 3);

        let remainder = buffer.take_remainder().unwrap().unwrap();
        assert_eq!(remainder.len(), 7);
        frames.push(remainder);
        assert!(buffer.is_empty());
        assert!(buffer.take_remainder().unwrap().is_none());

        let left: Vec<f64> = frames.iter().flat_map(|f| f.channel(0).to_vec()).collect();
        let right: Vec<f64> = frames.iter().flat_map(|f| f.channel(1).to_vec()).collect();
        assert_eq!(left, (0..31).map(|i| i as f64).collect::<Vec<_>>());
        assert!(left.iter().zip(&right).all(|(l, r)| *l == -r));
    }

    #[test]
    fn test_aligned_block_passes_through() {
        let mut buffer = FrameBuffer::new(2, 8);
        let block = ramp(0, 8);
        let frames = buffer.push(block.clone()).unwrap();

        assert_eq!(frames, vec![block.clone()]);
        // same storage, no copy was made
        assert!(block.is_shared());
    }

    #[test]
    fn test_large_block_splits() {
        let mut buffer = FrameBuffer::new(2, 4);
        assert!(buffer.push(ramp(0, 1)).unwrap().is_empty());
        let frames = buffer.push(ramp(1, 12)).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].channel(0), &[8.0, 9.0, 10.0, 11.0]);
        assert_eq!(buffer.len(), 1);

        buffer.reset();
        assert!(buffer.is_empty());
        assert_eq!(buffer.total_frames(), 0);
    }
}

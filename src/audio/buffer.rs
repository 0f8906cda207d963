//! Frame assembly for outbound audio
//!
//! Device callbacks deliver buffers of whatever length the host picks.
//! The protocol wants fixed-size blocks, so captured samples are collected
//! here and cut into frames of exactly `block_size` samples.

use bytes::Bytes;

use crate::codec::encode_frame;

/// One encoded outbound block of mono 16-bit PCM
#[derive(Clone, Debug, PartialEq)]
pub struct AudioFrame {
    /// Little-endian 16-bit PCM words
    pub pcm: Bytes,
    /// Number of samples in the frame
    pub samples: usize,
    /// Capture order, starting at 0 for each capture stream
    pub sequence: u64,
}

impl AudioFrame {
    /// Get frame duration in microseconds
    pub fn duration_us(&self, sample_rate: u32) -> u64 {
        (self.samples as u64 * 1_000_000) / sample_rate as u64
    }
}

/// Cuts a continuous sample stream into fixed-size encoded frames
pub struct FrameAssembler {
    block_size: usize,
    pending: Vec<f32>,
    sequence: u64,
}

impl FrameAssembler {
    pub fn new(block_size: usize) -> Self {
        let block_size = block_size.max(1);
        Self {
            block_size,
            pending: Vec::with_capacity(block_size * 2),
            sequence: 0,
        }
    }

    /// Append samples and emit every block that became complete, in order.
    pub fn push(&mut self, samples: &[f32], mut emit: impl FnMut(AudioFrame)) {
        self.pending.extend_from_slice(samples);

        let mut offset = 0;
        while self.pending.len() - offset >= self.block_size {
            let block = &self.pending[offset..offset + self.block_size];
            emit(AudioFrame {
                pcm: encode_frame(block),
                samples: self.block_size,
                sequence: self.sequence,
            });
            self.sequence += 1;
            offset += self.block_size;
        }

        if offset > 0 {
            self.pending.drain(..offset);
        }
    }

    /// Samples waiting for the next block boundary
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Drop buffered samples and restart sequence numbering
    pub fn reset(&mut self) {
        self.pending.clear();
        self.sequence = 0;
    }
}

/// Average interleaved channels down to one
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

//! Chunk accumulator: turns arbitrary source pieces into upload-sized chunks.
//!
//! Pieces are appended to a single buffer. Once the buffer reaches the
//! threshold the whole buffer is released as one chunk, so every chunk except
//! the last one is at least `threshold` bytes. The sink may confirm only part
//! of a chunk; [`ChunkAccumulator::restore_tail`] puts the unconfirmed bytes
//! back in front of whatever arrives next.

use bytes::{Bytes, BytesMut};

/// Buffers source bytes until a chunk is ready to push.
#[derive(Debug)]
pub struct ChunkAccumulator {
    buffer: BytesMut,
    threshold: usize,
}

impl ChunkAccumulator {
    /// Creates an accumulator releasing chunks of at least `threshold` bytes.
    ///
    /// A zero threshold is treated as one byte.
    #[must_use]
    pub fn new(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            buffer: BytesMut::with_capacity(threshold),
            threshold,
        }
    }

    /// Appends `piece` and returns a chunk if the buffer reached the threshold.
    pub fn feed(&mut self, piece: &[u8]) -> Option<Bytes> {
        self.buffer.extend_from_slice(piece);
        self.take_ready()
    }

    /// Releases the buffer if it holds at least `threshold` bytes.
    pub fn take_ready(&mut self) -> Option<Bytes> {
        if self.buffer.len() >= self.threshold {
            Some(self.buffer.split().freeze())
        } else {
            None
        }
    }

    /// Releases whatever is buffered, regardless of size. `None` when empty.
    pub fn flush(&mut self) -> Option<Bytes> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.buffer.split().freeze())
        }
    }

    /// Puts bytes the sink did not confirm back at the front of the buffer.
    pub fn restore_tail(&mut self, tail: &Bytes) {
        if tail.is_empty() {
            return;
        }
        let mut restored = BytesMut::with_capacity(tail.len() + self.buffer.len());
        restored.extend_from_slice(tail);
        restored.extend_from_slice(&self.buffer);
        self.buffer = restored;
    }

    /// Number of buffered bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The release threshold.
    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

//! Byte-stream to frame splitter.
//!
//! Serial links deliver arbitrary chunks: part of a frame, several frames
//! back to back, or line noise.  The splitter accumulates bytes and yields
//! complete 7-byte frames.
//!
//! Alignment is checked on the terminator position only.  When a
//! seven-byte window does not end in `0x0A` the splitter discards up to and
//! including the first `0x0A` inside the window (or the whole window if
//! there is none) and continues from there.

use crate::protocol::frame::{FRAME_LEN, RawFrame, TERMINATOR};

/// Streaming frame splitter.
pub struct FrameSplitter {
    buf: RawFrame,
    collected: usize,
    discarded: u64,
}

impl Default for FrameSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self {
            buf: [0; FRAME_LEN],
            collected: 0,
            discarded: 0,
        }
    }

    /// Push one byte.  Returns a frame when one completes.
    pub fn push(&mut self, byte: u8) -> Option<RawFrame> {
        self.buf[self.collected] = byte;
        self.collected += 1;

        if self.collected < FRAME_LEN {
            return None;
        }

        if self.buf[FRAME_LEN - 1] == TERMINATOR {
            self.collected = 0;
            return Some(self.buf);
        }

        // Misaligned: resync after the first terminator in the window.
        match self.buf.iter().position(|&b| b == TERMINATOR) {
            Some(pos) => {
                let keep = FRAME_LEN - pos - 1;
                self.buf.copy_within(pos + 1.., 0);
                self.collected = keep;
                self.discarded += (pos + 1) as u64;
            }
            None => {
                self.collected = 0;
                self.discarded += FRAME_LEN as u64;
            }
        }
        None
    }

    /// Feed a chunk.  Every frame completed by it is returned, in order.
    pub fn feed(&mut self, data: &[u8]) -> Vec<RawFrame> {
        data.iter().filter_map(|&b| self.push(b)).collect()
    }

    /// Bytes currently buffered toward the next frame.
    pub fn buffered(&self) -> usize {
        self.collected
    }

    /// Total bytes thrown away while resynchronising.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

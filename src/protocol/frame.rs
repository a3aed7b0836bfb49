//! Fixed-width frame codec.
//!
//! Wire format (both directions, no escaping, no checksum):
//! ```text
//! ┌──────────┬──────────┬─────────────────────┬──────┐
//! │ cmd (1B) │ tgt (1B) │ value (4B, LE u32)  │ 0x0A │
//! └──────────┴──────────┴─────────────────────┴──────┘
//! ```
//!
//! The codec never buffers: a chunk shorter than [`FRAME_LEN`] is rejected
//! outright and trailing bytes beyond the first frame are ignored.  Splitting
//! a byte stream into frames is the transport's job
//! (see [`FrameSplitter`](crate::transport::FrameSplitter)).

use core::fmt::Write as _;

use crate::error::CodecError;

use super::command::CommandId;

/// Exact size of every frame on the wire.
pub const FRAME_LEN: usize = 7;

/// Fixed last byte of every frame (`'\n'`).
pub const TERMINATOR: u8 = 0x0A;

/// An encoded frame, ready for the transport.
pub type RawFrame = [u8; FRAME_LEN];

/// Positional fields of a frame.  The command id is kept raw: whether it is
/// known is a dispatch concern, not a codec concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecodedFrame {
    pub command_id: u8,
    pub target_id: u8,
    pub value: u32,
}

impl DecodedFrame {
    pub const fn new(command_id: u8, target_id: u8, value: u32) -> Self {
        Self {
            command_id,
            target_id,
            value,
        }
    }

    /// The recognised command, if any.
    pub const fn command(&self) -> Option<CommandId> {
        CommandId::from_u8(self.command_id)
    }

    pub fn encode(&self) -> RawFrame {
        encode(self.command_id, self.target_id, self.value)
    }
}

/// Encode a `(command, target, value)` triple.  Total; cannot fail.
pub fn encode(command_id: u8, target_id: u8, value: u32) -> RawFrame {
    let mut out = [0u8; FRAME_LEN];
    out[0] = command_id;
    out[1] = target_id;
    out[2..6].copy_from_slice(&value.to_le_bytes());
    out[6] = TERMINATOR;
    out
}

/// Decode the first [`FRAME_LEN`] bytes of `bytes`.
pub fn decode(bytes: &[u8]) -> Result<DecodedFrame, CodecError> {
    if bytes.len() < FRAME_LEN {
        return Err(CodecError::TooShort(bytes.len()));
    }

    let value = u32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);

    Ok(DecodedFrame {
        command_id: bytes[0],
        target_id: bytes[1],
        value,
    })
}

/// Space-separated upper-case hex dump (`08 01 50 00 00 00 0A`).
pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{b:02X}");
    }
    out
}

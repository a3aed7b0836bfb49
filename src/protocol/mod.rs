//! Device wire protocol.
//!
//! ```text
//!   Intent ──▶ dispatch ──▶ OutboundFrame ──▶ frame::encode ──▶ [u8; 7]
//!   [u8; N] ──▶ frame::decode ──▶ DecodedFrame ──▶ CommandId::from_u8
//! ```

pub mod command;
pub mod dispatch;
pub mod frame;

pub use command::{CommandId, EntityKind};
pub use dispatch::{FrameBatch, OutboundFrame, dispatch};
pub use frame::{DecodedFrame, FRAME_LEN, RawFrame, TERMINATOR, decode, encode};

//! Transport gateway abstraction: any link that carries 7-byte frames.
//!
//! Concrete implementations:
//! - [`LoopbackGateway`]: in-memory device stand-in (demo, tests)
//! - `SerialGateway`: USB/UART serial port (`serial` feature)
//!
//! The console is generic over `TransportGateway`, so adding a new link
//! requires zero changes to the reconciliation logic.

pub mod loopback;
pub mod splitter;

use futures_lite::Stream;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

pub use loopback::{LoopbackDevice, LoopbackGateway};
pub use splitter::FrameSplitter;

/// Default serial line speed.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Where and how to open the link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkParams {
    /// Port path (`/dev/ttyACM0`, `COM3`).  Empty means "first available".
    pub port: String,
    pub baud_rate: u32,
}

impl Default for LinkParams {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

/// Frame-oriented, connection-based transport.
///
/// Each item yielded by [`subscribe`](Self::subscribe) is exactly one
/// frame; aligning chunks to frames is the gateway's job.  The inbound
/// stream ending means the link was lost.
#[allow(async_fn_in_trait)]
pub trait TransportGateway {
    /// Ordered inbound chunks.
    type Inbound: Stream<Item = Vec<u8>> + Unpin + 'static;

    async fn connect(&mut self, params: &LinkParams) -> Result<(), TransportError>;

    async fn disconnect(&mut self);

    /// Send one frame.
    async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Inbound stream for the current connection.
    fn subscribe(&mut self) -> Result<Self::Inbound, TransportError>;

    fn is_connected(&self) -> bool;
}

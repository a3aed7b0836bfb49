//! Serial port transport adapter (`serial` feature).
//!
//! Opens the rig's USB/UART port through `serialport` and implements
//! [`TransportGateway`] on it.  The inbound side polls the port on an
//! `async-io-mini` reactor timer (wake-based, no busy spin) and splits the
//! byte stream into 7-byte frames with [`FrameSplitter`].

use core::cell::Cell;
use core::time::Duration;
use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::rc::Rc;

use futures_lite::StreamExt;
use futures_lite::stream::{self, BoxedLocal};
use log::{info, warn};
use serialport::SerialPort;

use crate::error::TransportError;
use crate::protocol::frame::RawFrame;
use crate::transport::{FrameSplitter, LinkParams, TransportGateway};

const READ_BUF_SIZE: usize = 256;

/// Upper bound for a read once bytes are known to be waiting.
const READ_TIMEOUT: Duration = Duration::from_millis(1);

/// Reader sleep when the port had nothing to read.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Names of the serial ports present on this host.
pub fn list_ports() -> Result<Vec<String>, TransportError> {
    serialport::available_ports()
        .map(|ports| ports.into_iter().map(|p| p.port_name).collect())
        .map_err(|e| TransportError::Io(e.to_string()))
}

pub struct SerialGateway {
    port: Option<Box<dyn SerialPort>>,
    open: Rc<Cell<bool>>,
}

impl Default for SerialGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialGateway {
    pub fn new() -> Self {
        Self {
            port: None,
            open: Rc::new(Cell::new(false)),
        }
    }

    fn resolve_port(params: &LinkParams) -> Result<String, TransportError> {
        if !params.port.is_empty() {
            return Ok(params.port.clone());
        }
        list_ports()?
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::PortUnavailable("no serial ports found".into()))
    }
}

impl TransportGateway for SerialGateway {
    type Inbound = BoxedLocal<Vec<u8>>;

    async fn connect(&mut self, params: &LinkParams) -> Result<(), TransportError> {
        let path = Self::resolve_port(params)?;
        let port = serialport::new(&path, params.baud_rate)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| TransportError::PortUnavailable(format!("{path}: {e}")))?;

        info!("serial: opened {} @ {} baud", path, params.baud_rate);
        self.port = Some(port);
        // Readers from an earlier connection keep watching the old flag.
        self.open.set(false);
        self.open = Rc::new(Cell::new(true));
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.open.set(false);
        if self.port.take().is_some() {
            info!("serial: closed");
        }
    }

    async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::NotConnected)?;
        port.write_all(frame)
            .and_then(|()| port.flush())
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    fn subscribe(&mut self) -> Result<Self::Inbound, TransportError> {
        let port = self.port.as_ref().ok_or(TransportError::NotConnected)?;
        let reader = port
            .try_clone()
            .map_err(|e| TransportError::Io(e.to_string()))?;

        let state = ReaderState {
            reader,
            splitter: FrameSplitter::new(),
            ready: VecDeque::new(),
            open: self.open.clone(),
        };
        Ok(stream::unfold(state, |mut state| async move {
            let frame = state.next_frame().await?;
            Some((frame.to_vec(), state))
        })
        .boxed_local())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some() && self.open.get()
    }
}

struct ReaderState {
    reader: Box<dyn SerialPort>,
    splitter: FrameSplitter,
    ready: VecDeque<RawFrame>,
    open: Rc<Cell<bool>>,
}

impl ReaderState {
    /// Next complete frame, or `None` once the port is closed or fails.
    async fn next_frame(&mut self) -> Option<RawFrame> {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Some(frame);
            }
            if !self.open.get() {
                return None;
            }
            let available = match self.reader.bytes_to_read() {
                Ok(n) => n,
                Err(e) => {
                    warn!("serial: cannot query port: {}", e);
                    self.open.set(false);
                    return None;
                }
            };
            match read_available(&mut self.reader, available, &mut self.splitter, &mut self.ready) {
                Ok(_) => {}
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {}
                Err(e) => {
                    warn!("serial: read failed: {}", e);
                    self.open.set(false);
                    return None;
                }
            }
            if self.ready.is_empty() {
                async_io_mini::Timer::after(POLL_INTERVAL).await;
            }
        }
    }
}

/// Read only the `available` bytes the driver already holds, so the
/// executor thread never blocks on the port.  Completed frames are queued.
fn read_available(
    reader: &mut impl Read,
    available: u32,
    splitter: &mut FrameSplitter,
    ready: &mut VecDeque<RawFrame>,
) -> std::io::Result<usize> {
    let want = (available as usize).min(READ_BUF_SIZE);
    if want == 0 {
        return Ok(0);
    }
    let mut buf = [0u8; READ_BUF_SIZE];
    let n = reader.read(&mut buf[..want])?;
    ready.extend(splitter.feed(&buf[..n]));
    Ok(n)
}

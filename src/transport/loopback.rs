//! In-memory transport.
//!
//! [`LoopbackGateway`] is the console side; [`LoopbackDevice`] is a handle
//! standing in for the firmware.  The device handle can push inbound
//! frames, inspect what was sent, inject send failures, drop the link, and
//! optionally echo every sent frame back as a confirmation.
//!
//! ```text
//!   Console ──send──▶ LoopbackGateway ──▶ sent log ──▶ LoopbackDevice
//!   Console ◀─subscribe── inbound channel ◀──inject──── LoopbackDevice
//! ```

use core::cell::RefCell;
use std::rc::Rc;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use futures_lite::StreamExt;
use futures_lite::stream::{self, BoxedLocal};
use log::debug;

use crate::error::TransportError;

use super::{LinkParams, TransportGateway};

/// Channel depth for inbound chunks.
const INBOUND_DEPTH: usize = 64;

enum LinkMsg {
    Chunk(Vec<u8>),
    Closed,
}

#[derive(Default)]
struct LinkState {
    connected: bool,
    sent: Vec<Vec<u8>>,
    fail_next: usize,
    refuse_connect: bool,
    auto_ack: bool,
}

struct Shared {
    state: RefCell<LinkState>,
    inbound: Channel<NoopRawMutex, LinkMsg, INBOUND_DEPTH>,
}

impl Shared {
    fn close(&self) {
        let was_connected = core::mem::replace(&mut self.state.borrow_mut().connected, false);
        if was_connected {
            let _ = self.inbound.try_send(LinkMsg::Closed);
        }
    }
}

/// Console-side end of the loopback link.
pub struct LoopbackGateway {
    shared: Rc<Shared>,
}

/// Device-side end of the loopback link.
#[derive(Clone)]
pub struct LoopbackDevice {
    shared: Rc<Shared>,
}

impl LoopbackGateway {
    pub fn new() -> (Self, LoopbackDevice) {
        let shared = Rc::new(Shared {
            state: RefCell::new(LinkState::default()),
            inbound: Channel::new(),
        });
        (
            Self {
                shared: shared.clone(),
            },
            LoopbackDevice { shared },
        )
    }
}

impl TransportGateway for LoopbackGateway {
    type Inbound = BoxedLocal<Vec<u8>>;

    async fn connect(&mut self, params: &LinkParams) -> Result<(), TransportError> {
        let mut state = self.shared.state.borrow_mut();
        if state.refuse_connect {
            return Err(TransportError::PortUnavailable(params.port.clone()));
        }
        state.connected = true;
        // Leftovers belong to the previous connection.
        while self.shared.inbound.try_receive().is_ok() {}
        debug!("loopback: connected ({} baud)", params.baud_rate);
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.shared.close();
    }

    async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let mut state = self.shared.state.borrow_mut();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(TransportError::Io("injected send failure".into()));
        }
        state.sent.push(frame.to_vec());
        if state.auto_ack {
            let _ = self.shared.inbound.try_send(LinkMsg::Chunk(frame.to_vec()));
        }
        Ok(())
    }

    fn subscribe(&mut self) -> Result<Self::Inbound, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let shared = self.shared.clone();
        Ok(stream::unfold(shared, |shared| async move {
            let msg = shared.inbound.receive().await;
            match msg {
                LinkMsg::Chunk(bytes) => Some((bytes, shared)),
                LinkMsg::Closed => None,
            }
        })
        .boxed_local())
    }

    fn is_connected(&self) -> bool {
        self.shared.state.borrow().connected
    }
}

impl LoopbackDevice {
    /// Deliver one inbound chunk.  Returns `false` if the link is down or
    /// the inbound queue is full.
    pub fn inject(&self, bytes: &[u8]) -> bool {
        if !self.shared.state.borrow().connected {
            return false;
        }
        self.shared
            .inbound
            .try_send(LinkMsg::Chunk(bytes.to_vec()))
            .is_ok()
    }

    /// Every frame the console has sent so far.
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.shared.state.borrow().sent.clone()
    }

    pub fn clear_sent(&self) {
        self.shared.state.borrow_mut().sent.clear();
    }

    /// Make the next `n` sends fail with an I/O error.
    pub fn fail_next_sends(&self, n: usize) {
        self.shared.state.borrow_mut().fail_next = n;
    }

    /// Refuse connection attempts until turned off again.
    pub fn refuse_connect(&self, refuse: bool) {
        self.shared.state.borrow_mut().refuse_connect = refuse;
    }

    /// Echo every sent frame back as inbound, like firmware that
    /// acknowledges by reporting the applied value.
    pub fn set_auto_ack(&self, on: bool) {
        self.shared.state.borrow_mut().auto_ack = on;
    }

    /// Simulate the cable being pulled.
    pub fn drop_link(&self) {
        self.shared.close();
    }

    pub fn is_connected(&self) -> bool {
        self.shared.state.borrow().connected
    }
}

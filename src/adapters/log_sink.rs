//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing one operator-readable line per
//! engine event to the `log` facade, in the wording of the console's log
//! panel:
//!
//! ```text
//! TX     | SET_LED_INTENSITY -> ID: 1, VALUE: 80% | [08 01 50 00 00 00 0A]
//! RX     | TOGGLE_LIGHT_BARRIER -> ID: 1, VALUE: ACTIVE | [14 01 01 00 00 00 0A]
//! REVERT | SET_LED_INTENSITY#1 timed out, restored VALUE: 0%
//! ```

use log::{info, warn};

use crate::app::events::{DropReason, EngineEvent};
use crate::app::ports::EventSink;
use crate::protocol::command::describe;
use crate::protocol::frame::to_hex;
use crate::state::entity::{DeviceEntity, EntitySnapshot};

/// Adapter that logs every [`EngineEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink {
    /// Also log every store change (noisy).
    verbose: bool,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self { verbose: false }
    }

    pub fn verbose() -> Self {
        Self { verbose: true }
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::Changed(change) => {
                if self.verbose {
                    info!("STATE  | {:?} | {}", change.source, render(&change.snapshot));
                }
            }
            EngineEvent::FrameSent(frame) => {
                info!("TX     | {}", annotate(frame.command.id(), frame.target_id, frame.value));
            }
            EngineEvent::FrameReceived(frame) => {
                info!("RX     | {}", annotate(frame.command_id, frame.target_id, frame.value));
            }
            EngineEvent::FrameDropped(reason) => {
                warn!("DROP   | {}", drop_reason(reason));
            }
            EngineEvent::Confirmed(key) => {
                info!("ACK    | {}", key);
            }
            EngineEvent::Superseded(key) => {
                info!("SUPER  | {} replaced by newer write", key);
            }
            EngineEvent::Reverted { key, snapshot } => {
                let restored = snapshot
                    .entity
                    .field(key.command)
                    .map(|u| key.command.describe_value(u.value()))
                    .unwrap_or_default();
                warn!("REVERT | {} timed out, restored VALUE: {}", key, restored);
            }
            EngineEvent::SendFailed { frame, error } => {
                warn!(
                    "FAIL   | {} | {}",
                    describe(frame.command.id(), frame.target_id, frame.value),
                    error
                );
            }
            EngineEvent::ProductionModeChanged(on) => {
                info!("MODE   | production {}", if *on { "ON" } else { "OFF" });
            }
            EngineEvent::LinkUp => info!("LINK   | up"),
            EngineEvent::LinkDown => warn!("LINK   | down"),
            EngineEvent::Frozen { cleared } => {
                warn!("FROZEN | {} pending write(s) dropped, state kept", cleared);
            }
        }
    }
}

/// `"<description> | [<hex>]"` for one frame.
pub fn annotate(command_id: u8, target_id: u8, value: u32) -> String {
    let raw = crate::protocol::frame::encode(command_id, target_id, value);
    format!("{} | [{}]", describe(command_id, target_id, value), to_hex(&raw))
}

fn drop_reason(reason: &DropReason) -> String {
    match reason {
        DropReason::TooShort(len) => format!("frame too short ({len} of 7 bytes)"),
        DropReason::UnknownCommand(id) => format!("UNKNOWN_COMMAND({id})"),
        DropReason::UnknownTarget { command, target_id } => {
            format!("{} -> unknown ID: {}", command, target_id)
        }
        DropReason::InvalidValue { command, value } => {
            format!("{} -> invalid VALUE: {}", command, value)
        }
        DropReason::OutboundOnly(command) => format!("{} echo ignored", command),
    }
}

fn render(snapshot: &EntitySnapshot) -> String {
    match snapshot.entity {
        DeviceEntity::Led(l) => format!("LED {} {:?} {}%", l.id, l.status, l.intensity),
        DeviceEntity::Motor(m) => format!(
            "motor {} {:?} {}Hz {:?}",
            m.id, m.status, m.speed, m.direction
        ),
        DeviceEntity::LightBarrier(b) => format!("light barrier {} {:?}", b.id, b.status),
    }
}

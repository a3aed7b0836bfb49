//! Outbound engine events.
//!
//! The [`ReconciliationEngine`](crate::engine::ReconciliationEngine) emits
//! these through the [`EventSink`](super::ports::EventSink) port.  Adapters
//! on the other side decide what to do with them: write the operator log,
//! feed a UI change stream, count them in a test.

use crate::engine::pending::PendingKey;
use crate::error::TransportError;
use crate::protocol::command::CommandId;
use crate::protocol::dispatch::OutboundFrame;
use crate::protocol::frame::DecodedFrame;
use crate::state::entity::EntitySnapshot;

/// Which path produced a store mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSource {
    /// Local prediction applied before the device answered.
    Optimistic,
    /// Authoritative value reported by the device.
    Confirmed,
    /// Rollback after a timeout or a failed send.
    Reverted,
}

/// Pushed to the UI on every store mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityChangeEvent {
    pub snapshot: EntitySnapshot,
    pub source: ChangeSource,
}

/// Why an inbound chunk was discarded without touching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Fewer than seven bytes.
    TooShort(usize),
    UnknownCommand(u8),
    /// No entity with this id exists for the command's entity kind.
    UnknownTarget { command: CommandId, target_id: u8 },
    InvalidValue { command: CommandId, value: u32 },
    /// The device echoed a command that carries no state (reset).
    OutboundOnly(CommandId),
}

/// Result of feeding one inbound chunk to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundOutcome {
    /// Matched a pending write; the write is settled.
    Confirmed(EntitySnapshot),
    /// No pending write for this key; applied as a device-pushed change.
    Unsolicited(EntitySnapshot),
    ProductionMode(bool),
    Dropped(DropReason),
}

/// Structured events emitted by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Changed(EntityChangeEvent),

    /// A frame was handed to the transport.
    FrameSent(OutboundFrame),

    /// A well-formed frame arrived, before it is interpreted.
    FrameReceived(DecodedFrame),

    FrameDropped(DropReason),

    /// A pending write was settled by a matching device frame.
    Confirmed(PendingKey),

    /// A pending write was replaced by a newer write for the same key.
    Superseded(PendingKey),

    /// A pending write timed out and its field was rolled back.
    Reverted {
        key: PendingKey,
        snapshot: EntitySnapshot,
    },

    /// The transport rejected a frame; its optimistic update was undone.
    SendFailed {
        frame: OutboundFrame,
        error: TransportError,
    },

    ProductionModeChanged(bool),

    LinkUp,
    LinkDown,

    /// Link lost: every pending write was cleared without rollback.
    Frozen { cleared: usize },
}

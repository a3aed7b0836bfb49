//! Reconciliation engine: the hexagonal core.
//!
//! [`ReconciliationEngine`] owns the [`DeviceStore`] and the
//! [`PendingTable`] and is the only thing that mutates either.  It is a
//! plain synchronous state machine over a [`Clock`] port: hosts feed it
//! intents, inbound chunks, timer expiries and link transitions, and it
//! reports everything through an [`EventSink`] injected at the call site.
//!
//! ```text
//!   Intent ──▶ ┌─────────────────────────┐ ──▶ OutboundFrame(s)
//!              │  ReconciliationEngine   │
//!  inbound ──▶ │  Store · PendingTable   │ ──▶ EventSink
//!              └─────────────────────────┘
//! ```
//!
//! Per pending write:
//!
//! ```text
//!            issue                 matching inbound frame
//!   ──────▶ Issued ────────────────────────────────────▶ Confirmed
//!             │  │
//!             │  └─ deadline / send failure ───────────▶ Reverted
//!             └──── newer write, same key ─────────────▶ Superseded
//!             └──── link lost ─────────────────────────▶ Frozen (no rollback)
//! ```
//!
//! The engine itself never sleeps.  [`crate::runtime::Console`] arms real
//! timers that call [`ReconciliationEngine::expire`]; tick-driven hosts call
//! [`ReconciliationEngine::expire_due`] instead.

pub mod pending;

use heapless::Vec;
use log::{debug, info, warn};

use crate::app::commands::Intent;
use crate::app::events::{ChangeSource, DropReason, EngineEvent, EntityChangeEvent, InboundOutcome};
use crate::app::ports::{Clock, ConfigError, EventSink};
use crate::config::ConsoleConfig;
use crate::error::{DispatchError, Error, TransportError};
use crate::protocol::command::{CommandId, GLOBAL_TARGET};
use crate::protocol::dispatch::{FrameBatch, MAX_FRAMES_PER_INTENT, OutboundFrame, dispatch};
use crate::protocol::frame::{DecodedFrame, decode, to_hex};
use crate::state::entity::{EntityRef, EntitySnapshot, EntityUpdate};
use crate::state::store::DeviceStore;

pub use pending::{PendingKey, PendingTable, PendingWrite, PendingWriteHandle, WriteId, WriteTicket};

/// One outbound frame plus the ticket of the write it opened, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuedFrame {
    pub frame: OutboundFrame,
    pub ticket: Option<WriteTicket>,
}

/// Everything `issue` produced, in send order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Issued {
    pub frames: Vec<IssuedFrame, MAX_FRAMES_PER_INTENT>,
}

impl Issued {
    pub fn handle(&self) -> PendingWriteHandle {
        PendingWriteHandle {
            tickets: self.frames.iter().filter_map(|f| f.ticket).collect(),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// ReconciliationEngine
// ───────────────────────────────────────────────────────────────

pub struct ReconciliationEngine<C: Clock> {
    store: DeviceStore,
    pending: PendingTable,
    clock: C,
    revert_timeout_ms: u64,
    linked: bool,
}

impl<C: Clock> ReconciliationEngine<C> {
    /// Build the store from the configured layout.  The link starts down.
    pub fn new(config: &ConsoleConfig, clock: C) -> Result<Self, ConfigError> {
        config.validate()?;
        let store = DeviceStore::new(&config.entities)?;
        Ok(Self {
            store,
            pending: PendingTable::new(),
            clock,
            revert_timeout_ms: config.revert_timeout_ms,
            linked: false,
        })
    }

    // ── Reads ─────────────────────────────────────────────────

    pub fn snapshot_all(&self) -> std::vec::Vec<EntitySnapshot> {
        self.store.snapshot_all()
    }

    pub fn get(&self, reference: EntityRef) -> Option<EntitySnapshot> {
        self.store.get(reference)
    }

    pub fn store(&self) -> &DeviceStore {
        &self.store
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn pending(&self, key: &PendingKey) -> Option<&PendingWrite> {
        self.pending.get(key)
    }

    pub fn is_current(&self, ticket: &WriteTicket) -> bool {
        self.pending.is_current(&ticket.key, ticket.id)
    }

    pub fn is_linked(&self) -> bool {
        self.linked
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    // ── Link lifecycle ────────────────────────────────────────

    pub fn link_up(&mut self, sink: &mut impl EventSink) {
        self.linked = true;
        info!("link up");
        sink.emit(&EngineEvent::LinkUp);
    }

    /// Enter the frozen state: every pending write is dropped and the store
    /// keeps its last-known values.  Returns how many writes were cleared.
    pub fn disconnect(&mut self, sink: &mut impl EventSink) -> usize {
        self.linked = false;
        let cleared = self.pending.clear();
        info!("link down, {} pending write(s) frozen", cleared);
        sink.emit(&EngineEvent::LinkDown);
        sink.emit(&EngineEvent::Frozen { cleared });
        cleared
    }

    // ── Outbound ──────────────────────────────────────────────

    /// Validate an intent, apply its optimistic update and open one pending
    /// write per entity-scoped frame.
    ///
    /// Fails before touching the store if the link is down, a value is out
    /// of range, an entity is unknown, or the pending table has no room.
    pub fn issue(&mut self, intent: &Intent, sink: &mut impl EventSink) -> Result<Issued, Error> {
        if !self.linked {
            return Err(TransportError::NotConnected.into());
        }
        let batch = dispatch(intent)?;
        self.check_batch(&batch)?;

        let now = self.clock.now_ms();
        let deadline_ms = now.saturating_add(self.revert_timeout_ms);
        let mut issued = Issued::default();

        for frame in batch {
            let ticket = match EntityUpdate::from_wire(frame.command, frame.value) {
                Some(update) => Some(self.open_write(&frame, update, now, deadline_ms, sink)?),
                None => None,
            };
            // Capacity equals the batch capacity.
            let _ = issued.frames.push(IssuedFrame { frame, ticket });
        }

        Ok(issued)
    }

    /// Record that a frame reached the transport.
    pub fn frame_sent(&mut self, frame: &OutboundFrame, sink: &mut impl EventSink) {
        debug!("TX {} [{}]", frame.command, to_hex(&frame.encode()));
        sink.emit(&EngineEvent::FrameSent(*frame));
    }

    /// The transport rejected a frame: undo its optimistic update now rather
    /// than waiting for the deadline.
    pub fn send_failed(
        &mut self,
        issued: &IssuedFrame,
        error: TransportError,
        sink: &mut impl EventSink,
    ) -> Option<EntitySnapshot> {
        warn!("send of {} to {} failed: {}", issued.frame.command, issued.frame.target_id, error);
        sink.emit(&EngineEvent::SendFailed {
            frame: issued.frame,
            error,
        });

        self.abandon(issued, sink)
    }

    /// Roll back a frame that was never handed to the transport, because an
    /// earlier frame of the same intent failed.  No `SendFailed` is emitted.
    pub fn abandon(
        &mut self,
        issued: &IssuedFrame,
        sink: &mut impl EventSink,
    ) -> Option<EntitySnapshot> {
        let ticket = issued.ticket?;
        let write = self.pending.take_if_current(&ticket.key, ticket.id)?;
        debug!("{} not sent, rolled back", ticket.key);
        self.roll_back(ticket.key, &write, sink)
    }

    // ── Inbound ───────────────────────────────────────────────

    /// Interpret one inbound chunk.  Never fails: anything unusable is
    /// dropped, logged and reported as [`InboundOutcome::Dropped`].
    pub fn handle_inbound(&mut self, bytes: &[u8], sink: &mut impl EventSink) -> InboundOutcome {
        let frame = match decode(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("inbound dropped: {} [{}]", e, to_hex(bytes));
                return self.drop_frame(DropReason::TooShort(bytes.len()), sink);
            }
        };
        sink.emit(&EngineEvent::FrameReceived(frame));

        let Some(command) = frame.command() else {
            warn!("inbound dropped: unknown command id {}", frame.command_id);
            return self.drop_frame(DropReason::UnknownCommand(frame.command_id), sink);
        };

        match command.entity_kind() {
            Some(kind) => self.confirm(frame, command, EntityRef { kind, id: frame.target_id }, sink),
            None => self.device_wide(frame, command, sink),
        }
    }

    // ── Expiry ────────────────────────────────────────────────

    /// Revert the write identified by `(key, id)` if it is still current.
    /// A stale id (confirmed, superseded or frozen since) is a no-op.
    pub fn expire(
        &mut self,
        key: PendingKey,
        id: WriteId,
        sink: &mut impl EventSink,
    ) -> Option<EntitySnapshot> {
        let write = self.pending.take_if_current(&key, id)?;
        let snapshot = self.roll_back(key, &write, sink)?;
        sink.emit(&EngineEvent::Reverted { key, snapshot });
        Some(snapshot)
    }

    /// Revert every write whose deadline has passed.  Returns how many.
    pub fn expire_due(&mut self, sink: &mut impl EventSink) -> usize {
        let now = self.clock.now_ms();
        self.pending
            .due(now)
            .into_iter()
            .filter_map(|(key, id)| self.expire(key, id, sink))
            .count()
    }

    // ── Internals ─────────────────────────────────────────────

    fn check_batch(&self, batch: &FrameBatch) -> Result<(), DispatchError> {
        let mut keys: Vec<PendingKey, MAX_FRAMES_PER_INTENT> = Vec::new();
        for frame in batch {
            let Some(kind) = frame.command.entity_kind() else {
                continue;
            };
            if !self.store.contains(EntityRef { kind, id: frame.target_id }) {
                return Err(DispatchError::UnknownEntity {
                    kind,
                    id: frame.target_id,
                });
            }
            let _ = keys.push(PendingKey::of(frame));
        }
        if !self.pending.has_room_for(&keys) {
            return Err(DispatchError::PendingTableFull);
        }
        Ok(())
    }

    fn open_write(
        &mut self,
        frame: &OutboundFrame,
        update: EntityUpdate,
        now: u64,
        deadline_ms: u64,
        sink: &mut impl EventSink,
    ) -> Result<WriteTicket, DispatchError> {
        let key = PendingKey::of(frame);
        let reference = EntityRef {
            kind: update.kind(),
            id: frame.target_id,
        };
        let before = self.store.get(reference).ok_or(DispatchError::UnknownEntity {
            kind: reference.kind,
            id: reference.id,
        })?;
        let rollback = before
            .entity
            .field(frame.command)
            .ok_or(DispatchError::NotEntityScoped(frame.command))?;

        let (ticket, superseded) = self.pending.install(key, before, rollback, deadline_ms)?;
        if superseded.is_some() {
            info!("{} superseded by a newer write", key);
            sink.emit(&EngineEvent::Superseded(key));
        }

        let snapshot = self.store.apply_optimistic(frame.target_id, update, now)?;
        sink.emit(&EngineEvent::Changed(EntityChangeEvent {
            snapshot,
            source: ChangeSource::Optimistic,
        }));
        Ok(ticket)
    }

    fn roll_back(
        &mut self,
        key: PendingKey,
        write: &PendingWrite,
        sink: &mut impl EventSink,
    ) -> Option<EntitySnapshot> {
        let now = self.clock.now_ms();
        let snapshot = self
            .store
            .apply_revert(key.target_id, write.rollback, now)
            .ok()?;
        sink.emit(&EngineEvent::Changed(EntityChangeEvent {
            snapshot,
            source: ChangeSource::Reverted,
        }));
        Some(snapshot)
    }

    fn confirm(
        &mut self,
        frame: DecodedFrame,
        command: CommandId,
        reference: EntityRef,
        sink: &mut impl EventSink,
    ) -> InboundOutcome {
        if !self.store.contains(reference) {
            warn!("inbound dropped: no {}", reference);
            return self.drop_frame(
                DropReason::UnknownTarget {
                    command,
                    target_id: frame.target_id,
                },
                sink,
            );
        }

        let now = self.clock.now_ms();
        let snapshot = match self.store.apply_confirmed(frame.target_id, command, frame.value, now) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("inbound dropped: {}", e);
                return self.drop_frame(
                    DropReason::InvalidValue {
                        command,
                        value: frame.value,
                    },
                    sink,
                );
            }
        };
        sink.emit(&EngineEvent::Changed(EntityChangeEvent {
            snapshot,
            source: ChangeSource::Confirmed,
        }));

        let key = PendingKey::new(frame.target_id, command);
        if self.pending.settle(&key).is_some() {
            debug!("{} confirmed", key);
            sink.emit(&EngineEvent::Confirmed(key));
            InboundOutcome::Confirmed(snapshot)
        } else {
            InboundOutcome::Unsolicited(snapshot)
        }
    }

    fn device_wide(
        &mut self,
        frame: DecodedFrame,
        command: CommandId,
        sink: &mut impl EventSink,
    ) -> InboundOutcome {
        if command != CommandId::ProductionMode {
            debug!("inbound {} carries no state", command);
            return self.drop_frame(DropReason::OutboundOnly(command), sink);
        }
        if frame.target_id != GLOBAL_TARGET {
            warn!("inbound dropped: {} for target {}", command, frame.target_id);
            return self.drop_frame(
                DropReason::UnknownTarget {
                    command,
                    target_id: frame.target_id,
                },
                sink,
            );
        }
        if command.validate(frame.value).is_err() {
            warn!("inbound dropped: {} value {}", command, frame.value);
            return self.drop_frame(
                DropReason::InvalidValue {
                    command,
                    value: frame.value,
                },
                sink,
            );
        }

        let on = frame.value == 1;
        if self.store.set_production_mode(on) {
            info!("production mode {}", if on { "on" } else { "off" });
            sink.emit(&EngineEvent::ProductionModeChanged(on));
        }
        InboundOutcome::ProductionMode(on)
    }

    fn drop_frame(&mut self, reason: DropReason, sink: &mut impl EventSink) -> InboundOutcome {
        sink.emit(&EngineEvent::FrameDropped(reason));
        InboundOutcome::Dropped(reason)
    }
}

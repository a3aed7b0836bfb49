//! Pending-write bookkeeping.
//!
//! One [`PendingWrite`] per `(target_id, command)` key at most.  Each write
//! gets a fresh [`WriteId`]; timers and failed sends carry that id and only
//! act if it is still the current one for the key, so a stale timer can
//! never revert a write that was already confirmed or superseded.

use core::fmt;

use heapless::{FnvIndexMap, Vec};

use crate::error::DispatchError;
use crate::protocol::command::CommandId;
use crate::protocol::dispatch::{MAX_FRAMES_PER_INTENT, OutboundFrame};
use crate::state::entity::{EntitySnapshot, EntityUpdate};

/// Capacity of the pending table.  Must be a power of two.
pub const MAX_PENDING: usize = 64;

/// Identity of the field a write addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingKey {
    pub target_id: u8,
    pub command: CommandId,
}

impl PendingKey {
    pub const fn new(target_id: u8, command: CommandId) -> Self {
        Self { target_id, command }
    }

    pub const fn of(frame: &OutboundFrame) -> Self {
        Self::new(frame.target_id, frame.command)
    }
}

impl fmt::Display for PendingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.command.label(), self.target_id)
    }
}

/// Generation number of one write.  Strictly increasing per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WriteId(pub u64);

/// An optimistic write waiting for device confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingWrite {
    pub id: WriteId,
    /// Entity as it was immediately before this write.
    pub before: EntitySnapshot,
    /// Field value to restore on rollback, taken from `before`.
    pub rollback: EntityUpdate,
    pub deadline_ms: u64,
}

/// What a caller needs to arm and later cancel the revert timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteTicket {
    pub key: PendingKey,
    pub id: WriteId,
    pub deadline_ms: u64,
}

/// Returned by `issue`: one ticket per frame that opened a pending write.
/// Device-wide intents (reset, production mode) carry no tickets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingWriteHandle {
    pub tickets: Vec<WriteTicket, MAX_FRAMES_PER_INTENT>,
}

impl PendingWriteHandle {
    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = PendingKey> + '_ {
        self.tickets.iter().map(|t| t.key)
    }
}

/// Fixed-capacity map of in-flight writes.
#[derive(Debug, Default)]
pub struct PendingTable {
    entries: FnvIndexMap<PendingKey, PendingWrite, MAX_PENDING>,
    next_id: u64,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &PendingKey) -> Option<&PendingWrite> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &PendingKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Free slots counting keys that would be replaced rather than added.
    pub fn has_room_for(&self, keys: &[PendingKey]) -> bool {
        let fresh = keys.iter().filter(|k| !self.contains(k)).count();
        self.entries.len() + fresh <= MAX_PENDING
    }

    /// Install a write, replacing any write already pending for the key.
    /// Returns the new ticket and the superseded write, if there was one.
    pub fn install(
        &mut self,
        key: PendingKey,
        before: EntitySnapshot,
        rollback: EntityUpdate,
        deadline_ms: u64,
    ) -> Result<(WriteTicket, Option<PendingWrite>), DispatchError> {
        self.next_id += 1;
        let id = WriteId(self.next_id);
        let write = PendingWrite {
            id,
            before,
            rollback,
            deadline_ms,
        };
        let superseded = self
            .entries
            .insert(key, write)
            .map_err(|_| DispatchError::PendingTableFull)?;
        Ok((
            WriteTicket {
                key,
                id,
                deadline_ms,
            },
            superseded,
        ))
    }

    /// Remove whatever write is pending for `key`.
    pub fn settle(&mut self, key: &PendingKey) -> Option<PendingWrite> {
        self.entries.remove(key)
    }

    pub fn is_current(&self, key: &PendingKey, id: WriteId) -> bool {
        self.entries.get(key).is_some_and(|w| w.id == id)
    }

    /// Remove the write only if `id` is still the current one for `key`.
    pub fn take_if_current(&mut self, key: &PendingKey, id: WriteId) -> Option<PendingWrite> {
        if self.is_current(key, id) {
            self.entries.remove(key)
        } else {
            None
        }
    }

    /// Writes whose deadline is at or before `now_ms`.
    pub fn due(&self, now_ms: u64) -> std::vec::Vec<(PendingKey, WriteId)> {
        self.entries
            .iter()
            .filter(|(_, w)| w.deadline_ms <= now_ms)
            .map(|(k, w)| (*k, w.id))
            .collect()
    }

    /// Drop every pending write.  Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        n
    }
}

//! Device State Store.
//!
//! Owns every [`DeviceEntity`] for the process lifetime.  The entity set is
//! fixed at construction from an [`EntityLayout`] and never grows or shrinks.
//! The store has no interior mutability: all writes go through `&mut self`,
//! so whoever owns it (the reconciliation engine) is the single writer.

use heapless::Vec;
use log::debug;

use crate::app::ports::ConfigError;
use crate::config::EntityLayout;
use crate::error::DispatchError;
use crate::protocol::command::CommandId;

use super::entity::{DeviceEntity, EntityRef, EntitySnapshot, EntityUpdate};

/// Upper bound on entities tracked by one store.
pub const MAX_ENTITIES: usize = 32;

#[derive(Debug, Clone)]
pub struct DeviceStore {
    entities: Vec<EntitySnapshot, MAX_ENTITIES>,
    production_mode: bool,
}

impl DeviceStore {
    /// Build the fixed entity set, every entity in its power-on state.
    pub fn new(layout: &EntityLayout) -> Result<Self, ConfigError> {
        let mut entities = Vec::new();
        for reference in layout.references() {
            if entities.iter().any(|s: &EntitySnapshot| s.reference() == reference) {
                return Err(ConfigError::ValidationFailed("duplicate entity id"));
            }
            entities
                .push(EntitySnapshot {
                    entity: DeviceEntity::initial(reference),
                    last_changed: None,
                })
                .map_err(|_| ConfigError::ValidationFailed("too many entities"))?;
        }
        Ok(Self {
            entities,
            production_mode: false,
        })
    }

    // ── Reads ─────────────────────────────────────────────────

    pub fn get(&self, reference: EntityRef) -> Option<EntitySnapshot> {
        self.entities
            .iter()
            .find(|s| s.reference() == reference)
            .copied()
    }

    pub fn contains(&self, reference: EntityRef) -> bool {
        self.get(reference).is_some()
    }

    /// Copy of every entity, in layout order.
    pub fn snapshot_all(&self) -> std::vec::Vec<EntitySnapshot> {
        self.entities.to_vec()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn production_mode(&self) -> bool {
        self.production_mode
    }

    // ── Writes ────────────────────────────────────────────────

    /// Apply an authoritative device value.  Idempotent: re-applying the
    /// same value leaves the entity unchanged apart from `last_changed`.
    pub fn apply_confirmed(
        &mut self,
        target_id: u8,
        command: CommandId,
        value: u32,
        now_ms: u64,
    ) -> Result<EntitySnapshot, DispatchError> {
        let Some(kind) = command.entity_kind() else {
            return Err(DispatchError::NotEntityScoped(command));
        };
        let update = EntityUpdate::from_wire(command, value)
            .ok_or(DispatchError::InvalidValue { command, value })?;
        let reference = EntityRef { kind, id: target_id };
        self.write(reference, update, now_ms)
    }

    /// Apply a locally-predicted value ahead of device confirmation.
    pub fn apply_optimistic(
        &mut self,
        target_id: u8,
        update: EntityUpdate,
        now_ms: u64,
    ) -> Result<EntitySnapshot, DispatchError> {
        let reference = EntityRef {
            kind: update.kind(),
            id: target_id,
        };
        self.write(reference, update, now_ms)
    }

    /// Restore a field from a pre-write snapshot.
    pub fn apply_revert(
        &mut self,
        target_id: u8,
        update: EntityUpdate,
        now_ms: u64,
    ) -> Result<EntitySnapshot, DispatchError> {
        self.apply_optimistic(target_id, update, now_ms)
    }

    /// Returns `true` if the flag actually changed.
    pub fn set_production_mode(&mut self, on: bool) -> bool {
        let changed = self.production_mode != on;
        self.production_mode = on;
        changed
    }

    fn write(
        &mut self,
        reference: EntityRef,
        update: EntityUpdate,
        now_ms: u64,
    ) -> Result<EntitySnapshot, DispatchError> {
        let slot = self
            .entities
            .iter_mut()
            .find(|s| s.reference() == reference)
            .ok_or(DispatchError::UnknownEntity {
                kind: reference.kind,
                id: reference.id,
            })?;

        // Kind is part of the lookup key, so this cannot miss.
        slot.entity.apply(update);
        slot.last_changed = Some(now_ms);
        debug!("store: {} <- {:?} @ {}ms", reference, update, now_ms);
        Ok(*slot)
    }
}

//! Console configuration parameters
//!
//! All tunable parameters for the rig console.
//! Values can be overridden from a JSON file (see
//! [`JsonFileConfig`](crate::adapters::config_file::JsonFileConfig)).

use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::protocol::command::{EntityKind, GLOBAL_TARGET};
use crate::state::entity::EntityRef;
use crate::state::store::MAX_ENTITIES;
use crate::transport::LinkParams;

/// Upper bound on ids listed per entity kind.
pub const MAX_IDS_PER_KIND: usize = 16;

/// Longest revert timeout accepted, in milliseconds.
pub const MAX_REVERT_TIMEOUT_MS: u64 = 60_000;

/// Core console configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    // --- Reconciliation ---
    /// How long an optimistic write waits for device confirmation (milliseconds)
    pub revert_timeout_ms: u64,

    // --- Device layout ---
    pub entities: EntityLayout,

    // --- Link ---
    pub link: LinkParams,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            revert_timeout_ms: 3000,
            entities: EntityLayout::default(),
            link: LinkParams::default(),
        }
    }
}

impl ConsoleConfig {
    /// Reject out-of-range values.  Never clamps.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.revert_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("revert_timeout_ms must be > 0"));
        }
        if self.revert_timeout_ms > MAX_REVERT_TIMEOUT_MS {
            return Err(ConfigError::ValidationFailed(
                "revert_timeout_ms must be <= 60000",
            ));
        }
        if self.link.baud_rate == 0 {
            return Err(ConfigError::ValidationFailed("link.baud_rate must be > 0"));
        }
        self.entities.validate()
    }

    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|_| ConfigError::Corrupted)?;
        config.validate()?;
        Ok(config)
    }
}

/// Hardware ids of every entity the device exposes.  Fixed for the process
/// lifetime once the store is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityLayout {
    pub leds: Vec<u8, MAX_IDS_PER_KIND>,
    pub motors: Vec<u8, MAX_IDS_PER_KIND>,
    pub light_barriers: Vec<u8, MAX_IDS_PER_KIND>,
}

impl Default for EntityLayout {
    /// Reference rig: LEDs 1–4, motors 2–4, light barriers 1–4.
    fn default() -> Self {
        Self {
            leds: id_range(1..=4),
            motors: id_range(2..=4),
            light_barriers: id_range(1..=4),
        }
    }
}

impl EntityLayout {
    /// Every entity, LEDs first, then motors, then light barriers.
    pub fn references(&self) -> impl Iterator<Item = EntityRef> + '_ {
        let leds = self.leds.iter().map(|&id| EntityRef::led(id));
        let motors = self.motors.iter().map(|&id| EntityRef::motor(id));
        let barriers = self.light_barriers.iter().map(|&id| EntityRef::light_barrier(id));
        leds.chain(motors).chain(barriers)
    }

    pub fn ids(&self, kind: EntityKind) -> &[u8] {
        match kind {
            EntityKind::Led => &self.leds,
            EntityKind::Motor => &self.motors,
            EntityKind::LightBarrier => &self.light_barriers,
        }
    }

    pub fn len(&self) -> usize {
        self.leds.len() + self.motors.len() + self.light_barriers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.len() > MAX_ENTITIES {
            return Err(ConfigError::ValidationFailed("too many entities"));
        }
        for kind in [EntityKind::Led, EntityKind::Motor, EntityKind::LightBarrier] {
            let list = self.ids(kind);
            if list.contains(&GLOBAL_TARGET) {
                return Err(ConfigError::ValidationFailed(
                    "entity id 0 is reserved for global commands",
                ));
            }
            for (i, id) in list.iter().enumerate() {
                if list[i + 1..].contains(id) {
                    return Err(ConfigError::ValidationFailed("duplicate entity id"));
                }
            }
        }
        Ok(())
    }
}

fn id_range(range: core::ops::RangeInclusive<u8>) -> Vec<u8, MAX_IDS_PER_KIND> {
    range.take(MAX_IDS_PER_KIND).collect()
}

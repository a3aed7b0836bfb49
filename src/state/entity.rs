//! Device entities and the field-level updates that mutate them.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::protocol::command::{CommandId, EntityKind, MAX_LED_INTENSITY, MAX_MOTOR_SPEED_HZ};

// ───────────────────────────────────────────────────────────────
// Field value types
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Power {
    #[default]
    Off,
    On,
}

impl Power {
    pub const fn from_wire(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Off),
            1 => Some(Self::On),
            _ => None,
        }
    }

    pub const fn value(self) -> u32 {
        match self {
            Self::Off => 0,
            Self::On => 1,
        }
    }

    pub const fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

impl From<bool> for Power {
    fn from(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}

/// Motor rotation direction.  CW is the wire value 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Cw,
    Ccw,
}

impl Direction {
    pub const fn from_wire(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Cw),
            1 => Some(Self::Ccw),
            _ => None,
        }
    }

    pub const fn value(self) -> u32 {
        match self {
            Self::Cw => 0,
            Self::Ccw => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BarrierStatus {
    #[default]
    Inactive,
    Active,
}

impl BarrierStatus {
    pub const fn from_wire(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Inactive),
            1 => Some(Self::Active),
            _ => None,
        }
    }

    pub const fn value(self) -> u32 {
        match self {
            Self::Inactive => 0,
            Self::Active => 1,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Entities
// ───────────────────────────────────────────────────────────────

/// Stable identity of one entity: kind plus hardware id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: u8,
}

impl EntityRef {
    pub const fn led(id: u8) -> Self {
        Self { kind: EntityKind::Led, id }
    }

    pub const fn motor(id: u8) -> Self {
        Self { kind: EntityKind::Motor, id }
    }

    pub const fn light_barrier(id: u8) -> Self {
        Self { kind: EntityKind::LightBarrier, id }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Led {
    pub id: u8,
    pub status: Power,
    /// Percent, 0–100.
    pub intensity: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Motor {
    pub id: u8,
    pub status: Power,
    /// Hz, 0–5000.
    pub speed: u16,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightBarrier {
    pub id: u8,
    pub status: BarrierStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceEntity {
    Led(Led),
    Motor(Motor),
    LightBarrier(LightBarrier),
}

impl DeviceEntity {
    /// Power-on state of a fresh entity: everything off, zeroed, CW.
    pub const fn initial(reference: EntityRef) -> Self {
        let id = reference.id;
        match reference.kind {
            EntityKind::Led => Self::Led(Led {
                id,
                status: Power::Off,
                intensity: 0,
            }),
            EntityKind::Motor => Self::Motor(Motor {
                id,
                status: Power::Off,
                speed: 0,
                direction: Direction::Cw,
            }),
            EntityKind::LightBarrier => Self::LightBarrier(LightBarrier {
                id,
                status: BarrierStatus::Inactive,
            }),
        }
    }

    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Led(_) => EntityKind::Led,
            Self::Motor(_) => EntityKind::Motor,
            Self::LightBarrier(_) => EntityKind::LightBarrier,
        }
    }

    pub const fn id(&self) -> u8 {
        match self {
            Self::Led(l) => l.id,
            Self::Motor(m) => m.id,
            Self::LightBarrier(b) => b.id,
        }
    }

    pub const fn reference(&self) -> EntityRef {
        EntityRef {
            kind: self.kind(),
            id: self.id(),
        }
    }

    /// Apply a field update.  Returns `false` (and leaves the entity
    /// untouched) when the update addresses a different entity kind.
    ///
    /// LED power only flips the status; intensity is kept.
    pub fn apply(&mut self, update: EntityUpdate) -> bool {
        match (self, update) {
            (Self::Led(l), EntityUpdate::LedPower(p)) => l.status = p,
            (Self::Led(l), EntityUpdate::LedIntensity(pct)) => l.intensity = pct,
            (Self::Motor(m), EntityUpdate::MotorPower(p)) => m.status = p,
            (Self::Motor(m), EntityUpdate::MotorSpeed(hz)) => m.speed = hz,
            (Self::Motor(m), EntityUpdate::MotorDirection(d)) => m.direction = d,
            (Self::LightBarrier(b), EntityUpdate::Barrier(s)) => b.status = s,
            _ => return false,
        }
        true
    }

    /// Current value of the field a command addresses, expressed as the
    /// update that would restore it.
    pub fn field(&self, command: CommandId) -> Option<EntityUpdate> {
        match (self, command) {
            (Self::Led(l), CommandId::LedPower) => Some(EntityUpdate::LedPower(l.status)),
            (Self::Led(l), CommandId::LedIntensity) => Some(EntityUpdate::LedIntensity(l.intensity)),
            (Self::Motor(m), CommandId::MotorPower) => Some(EntityUpdate::MotorPower(m.status)),
            (Self::Motor(m), CommandId::MotorSpeed) => Some(EntityUpdate::MotorSpeed(m.speed)),
            (Self::Motor(m), CommandId::MotorDirection) => {
                Some(EntityUpdate::MotorDirection(m.direction))
            }
            (Self::LightBarrier(b), CommandId::LightBarrierState) => {
                Some(EntityUpdate::Barrier(b.status))
            }
            _ => None,
        }
    }
}

/// A point-in-time copy of one entity, as handed to readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub entity: DeviceEntity,
    /// Clock reading (ms) of the last mutation; `None` until first touched.
    pub last_changed: Option<u64>,
}

impl EntitySnapshot {
    pub const fn reference(&self) -> EntityRef {
        self.entity.reference()
    }
}

// ───────────────────────────────────────────────────────────────
// Field-level updates
// ───────────────────────────────────────────────────────────────

/// One typed field change.  Each variant corresponds to exactly one
/// entity-scoped [`CommandId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityUpdate {
    LedPower(Power),
    LedIntensity(u8),
    MotorPower(Power),
    MotorSpeed(u16),
    MotorDirection(Direction),
    Barrier(BarrierStatus),
}

impl EntityUpdate {
    /// Interpret a wire `(command, value)` pair.  `None` for device-wide
    /// commands and for values outside the command's range.
    pub fn from_wire(command: CommandId, value: u32) -> Option<Self> {
        match command {
            CommandId::LedPower => Power::from_wire(value).map(Self::LedPower),
            CommandId::LedIntensity if value <= MAX_LED_INTENSITY => {
                u8::try_from(value).ok().map(Self::LedIntensity)
            }
            CommandId::MotorPower => Power::from_wire(value).map(Self::MotorPower),
            CommandId::MotorSpeed if value <= MAX_MOTOR_SPEED_HZ => {
                u16::try_from(value).ok().map(Self::MotorSpeed)
            }
            CommandId::MotorDirection => Direction::from_wire(value).map(Self::MotorDirection),
            CommandId::LightBarrierState => BarrierStatus::from_wire(value).map(Self::Barrier),
            CommandId::LedIntensity
            | CommandId::MotorSpeed
            | CommandId::Reset
            | CommandId::ProductionMode => None,
        }
    }

    pub const fn command(self) -> CommandId {
        match self {
            Self::LedPower(_) => CommandId::LedPower,
            Self::LedIntensity(_) => CommandId::LedIntensity,
            Self::MotorPower(_) => CommandId::MotorPower,
            Self::MotorSpeed(_) => CommandId::MotorSpeed,
            Self::MotorDirection(_) => CommandId::MotorDirection,
            Self::Barrier(_) => CommandId::LightBarrierState,
        }
    }

    pub const fn kind(self) -> EntityKind {
        match self {
            Self::LedPower(_) | Self::LedIntensity(_) => EntityKind::Led,
            Self::MotorPower(_) | Self::MotorSpeed(_) | Self::MotorDirection(_) => {
                EntityKind::Motor
            }
            Self::Barrier(_) => EntityKind::LightBarrier,
        }
    }

    /// Wire value for this update.
    pub const fn value(self) -> u32 {
        match self {
            Self::LedPower(p) | Self::MotorPower(p) => p.value(),
            Self::LedIntensity(pct) => pct as u32,
            Self::MotorSpeed(hz) => hz as u32,
            Self::MotorDirection(d) => d.value(),
            Self::Barrier(s) => s.value(),
        }
    }
}

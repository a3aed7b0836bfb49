//! Closed command-id enumeration shared by both wire directions.
//!
//! | id | command              | value                          |
//! |----|----------------------|--------------------------------|
//! | 1  | motor direction      | 0 = CW, 1 = CCW                |
//! | 2  | motor speed          | 0–5000 Hz                      |
//! | 3  | motor on/off         | 0 = off, 1 = on                |
//! | 7  | LED on/off           | 0 = off, 1 = on                |
//! | 8  | LED intensity        | 0–100 %                        |
//! | 9  | reset                | ignored                        |
//! | 10 | production mode      | 0 = off, 1 = on                |
//! | 20 | light-barrier state  | 0 = inactive, 1 = active (in)  |
//!
//! Adding a command is a single-point change: extend the enum and every
//! exhaustive match below stops compiling until it is handled.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

/// Maximum motor speed in Hz.
pub const MAX_MOTOR_SPEED_HZ: u32 = 5000;

/// Maximum LED intensity in percent.
pub const MAX_LED_INTENSITY: u32 = 100;

/// Target id used by device-wide commands.
pub const GLOBAL_TARGET: u8 = 0;

/// Which class of device entity a command addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Led,
    Motor,
    LightBarrier,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Led => write!(f, "LED"),
            Self::Motor => write!(f, "motor"),
            Self::LightBarrier => write!(f, "light barrier"),
        }
    }
}

/// Device operations understood by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CommandId {
    MotorDirection = 1,
    MotorSpeed = 2,
    MotorPower = 3,
    LedPower = 7,
    LedIntensity = 8,
    Reset = 9,
    ProductionMode = 10,
    /// Pushed by the device only; never issued.
    LightBarrierState = 20,
}

impl CommandId {
    pub const ALL: [Self; 8] = [
        Self::MotorDirection,
        Self::MotorSpeed,
        Self::MotorPower,
        Self::LedPower,
        Self::LedIntensity,
        Self::Reset,
        Self::ProductionMode,
        Self::LightBarrierState,
    ];

    /// Wire byte for this command.
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Map a wire byte back to a command.  `None` for unknown ids.
    pub const fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(Self::MotorDirection),
            2 => Some(Self::MotorSpeed),
            3 => Some(Self::MotorPower),
            7 => Some(Self::LedPower),
            8 => Some(Self::LedIntensity),
            9 => Some(Self::Reset),
            10 => Some(Self::ProductionMode),
            20 => Some(Self::LightBarrierState),
            _ => None,
        }
    }

    /// Entity class this command mutates; `None` for device-wide commands.
    pub const fn entity_kind(self) -> Option<EntityKind> {
        match self {
            Self::MotorDirection | Self::MotorSpeed | Self::MotorPower => Some(EntityKind::Motor),
            Self::LedPower | Self::LedIntensity => Some(EntityKind::Led),
            Self::LightBarrierState => Some(EntityKind::LightBarrier),
            Self::Reset | Self::ProductionMode => None,
        }
    }

    /// Largest value accepted for this command.
    pub const fn max_value(self) -> u32 {
        match self {
            Self::MotorSpeed => MAX_MOTOR_SPEED_HZ,
            Self::LedIntensity => MAX_LED_INTENSITY,
            Self::Reset => u32::MAX,
            Self::MotorDirection
            | Self::MotorPower
            | Self::LedPower
            | Self::ProductionMode
            | Self::LightBarrierState => 1,
        }
    }

    /// Reject values outside the documented range.  Never clamps.
    pub fn validate(self, value: u32) -> Result<u32, DispatchError> {
        if value > self.max_value() {
            return Err(DispatchError::InvalidValue {
                command: self,
                value,
            });
        }
        Ok(value)
    }

    /// Upper-case label used in log annotations.
    pub const fn label(self) -> &'static str {
        match self {
            Self::MotorDirection => "SET_MOTOR_DIRECTION",
            Self::MotorSpeed => "SET_MOTOR_SPEED",
            Self::MotorPower => "TOGGLE_MOTOR",
            Self::LedPower => "TOGGLE_LED",
            Self::LedIntensity => "SET_LED_INTENSITY",
            Self::Reset => "RESET",
            Self::ProductionMode => "PRODUCTION_MODE",
            Self::LightBarrierState => "TOGGLE_LIGHT_BARRIER",
        }
    }

    /// Render a value the way an operator reads it (`ON`, `80%`, `CCW`...).
    pub fn describe_value(self, value: u32) -> String {
        match self {
            Self::MotorPower | Self::LedPower | Self::ProductionMode => {
                (if value == 1 { "ON" } else { "OFF" }).to_string()
            }
            Self::LedIntensity => format!("{value}%"),
            Self::MotorSpeed => format!("{value}Hz"),
            Self::MotorDirection => (if value == 0 { "CW" } else { "CCW" }).to_string(),
            Self::LightBarrierState => (if value == 1 { "ACTIVE" } else { "INACTIVE" }).to_string(),
            Self::Reset => value.to_string(),
        }
    }
}

impl TryFrom<u8> for CommandId {
    type Error = u8;

    fn try_from(raw: u8) -> Result<Self, u8> {
        Self::from_u8(raw).ok_or(raw)
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One-line description of a raw `(command, target, value)` triple.
///
/// Unknown command ids are rendered as `UNKNOWN_COMMAND(<id>)`.
pub fn describe(command_id: u8, target_id: u8, value: u32) -> String {
    match CommandId::from_u8(command_id) {
        Some(cmd) => format!(
            "{} -> ID: {}, VALUE: {}",
            cmd.label(),
            target_id,
            cmd.describe_value(value)
        ),
        None => format!("UNKNOWN_COMMAND({command_id}) -> ID: {target_id}, VALUE: {value}"),
    }
}

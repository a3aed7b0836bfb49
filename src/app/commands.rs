//! Inbound intents to the reconciliation engine.
//!
//! These represent changes requested by the operator UI.  The
//! [`Console`](crate::runtime::Console) (or a host driving the
//! [`ReconciliationEngine`](crate::engine::ReconciliationEngine) directly)
//! turns each one into optimistic store updates plus outbound frames.

use serde::{Deserialize, Serialize};

use crate::state::entity::Direction;

/// Operator requests, addressed by entity id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    /// Switch an LED on or off.
    SetLedPower(u8, bool),

    /// Set LED intensity in percent (0–100).
    SetLedIntensity(u8, u8),

    /// Switch a motor on or off.
    SetMotorPower(u8, bool),

    /// Set motor speed in Hz (0–5000).
    SetMotorSpeed(u8, u16),

    /// Set motor rotation direction.
    SetMotorDirection(u8, Direction),

    /// Apply speed and direction together.  Sent as two independent frames.
    UpdateMotor(u8, u16, Direction),

    /// Reset the whole apparatus.
    Reset,

    /// Enter or leave production mode.
    SetProductionMode(bool),
}

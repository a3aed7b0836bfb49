//! Command dispatch table: operator intent → outbound frames.
//!
//! Pure functions only; no I/O, no store access.  Every `(intent → bytes)`
//! pair is therefore deterministic and unit-testable.
//!
//! Values are range-checked here and rejected with
//! [`DispatchError::InvalidValue`]; the table never clamps.

use heapless::Vec;

use crate::app::commands::Intent;
use crate::error::DispatchError;

use super::command::{CommandId, GLOBAL_TARGET};
use super::frame::{RawFrame, encode};

/// Upper bound on frames produced by a single intent.
pub const MAX_FRAMES_PER_INTENT: usize = 2;

/// A typed outbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutboundFrame {
    pub command: CommandId,
    pub target_id: u8,
    pub value: u32,
}

impl OutboundFrame {
    pub fn encode(&self) -> RawFrame {
        encode(self.command.id(), self.target_id, self.value)
    }
}

/// Frames produced by one intent, in send order.
pub type FrameBatch = Vec<OutboundFrame, MAX_FRAMES_PER_INTENT>;

/// Translate an intent into its frame(s).
pub fn dispatch(intent: &Intent) -> Result<FrameBatch, DispatchError> {
    let mut batch = FrameBatch::new();

    match *intent {
        Intent::SetLedPower(id, on) => {
            push(&mut batch, frame(CommandId::LedPower, id, u32::from(on))?);
        }
        Intent::SetLedIntensity(id, percent) => {
            push(&mut batch, frame(CommandId::LedIntensity, id, u32::from(percent))?);
        }
        Intent::SetMotorPower(id, on) => {
            push(&mut batch, frame(CommandId::MotorPower, id, u32::from(on))?);
        }
        Intent::SetMotorSpeed(id, hz) => {
            push(&mut batch, frame(CommandId::MotorSpeed, id, u32::from(hz))?);
        }
        Intent::SetMotorDirection(id, direction) => {
            push(&mut batch, frame(CommandId::MotorDirection, id, direction.value())?);
        }
        Intent::UpdateMotor(id, hz, direction) => {
            // Validate both halves before emitting either.
            let dir = frame(CommandId::MotorDirection, id, direction.value())?;
            let speed = frame(CommandId::MotorSpeed, id, u32::from(hz))?;
            push(&mut batch, dir);
            push(&mut batch, speed);
        }
        Intent::Reset => {
            push(&mut batch, frame(CommandId::Reset, GLOBAL_TARGET, 0)?);
        }
        Intent::SetProductionMode(on) => {
            push(&mut batch, frame(CommandId::ProductionMode, GLOBAL_TARGET, u32::from(on))?);
        }
    }

    Ok(batch)
}

fn frame(command: CommandId, target_id: u8, value: u32) -> Result<OutboundFrame, DispatchError> {
    Ok(OutboundFrame {
        command,
        target_id,
        value: command.validate(value)?,
    })
}

fn push(batch: &mut FrameBatch, frame: OutboundFrame) {
    // Capacity matches the largest arm above.
    let _ = batch.push(frame);
}

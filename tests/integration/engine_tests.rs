//! Reconciliation engine scenarios driven by a manual clock.
//!
//! These mirror what an operator sees at the console: optimistic updates,
//! confirmations, timeouts, supersession and link loss.

use rigsync::app::commands::Intent;
use rigsync::app::events::{ChangeSource, DropReason, EngineEvent, InboundOutcome};
use rigsync::engine::PendingKey;
use rigsync::error::{DispatchError, Error, TransportError};
use rigsync::protocol::command::CommandId;
use rigsync::state::entity::{
    BarrierStatus, DeviceEntity, Direction, EntityRef, EntityUpdate, Led, Motor, Power,
};

use crate::mocks::linked_engine;

fn led(e: &rigsync::ReconciliationEngine<crate::mocks::ManualClock>, id: u8) -> Led {
    match e.get(EntityRef::led(id)).map(|s| s.entity) {
        Some(DeviceEntity::Led(l)) => l,
        other => panic!("expected LED {id}, got {other:?}"),
    }
}

fn motor(e: &rigsync::ReconciliationEngine<crate::mocks::ManualClock>, id: u8) -> Motor {
    match e.get(EntityRef::motor(id)).map(|s| s.entity) {
        Some(DeviceEntity::Motor(m)) => m,
        other => panic!("expected motor {id}, got {other:?}"),
    }
}

// ── Outbound validation ───────────────────────────────────────

#[test]
fn out_of_range_intensity_is_rejected_without_side_effects() {
    let (mut engine, _clock, mut sink) = linked_engine();
    let before = engine.snapshot_all();

    let result = engine.issue(&Intent::SetLedIntensity(1, 150), &mut sink);

    assert_eq!(
        result,
        Err(Error::Dispatch(DispatchError::InvalidValue {
            command: CommandId::LedIntensity,
            value: 150,
        }))
    );
    assert_eq!(engine.snapshot_all(), before);
    assert_eq!(engine.pending_count(), 0);
    assert!(sink.events().is_empty());
}

#[test]
fn out_of_range_speed_is_rejected() {
    let (mut engine, _clock, mut sink) = linked_engine();
    let result = engine.issue(&Intent::SetMotorSpeed(2, 5001), &mut sink);
    assert!(matches!(
        result,
        Err(Error::Dispatch(DispatchError::InvalidValue { value: 5001, .. }))
    ));
    assert_eq!(motor(&engine, 2).speed, 0);
}

#[test]
fn update_motor_with_bad_speed_sends_nothing() {
    let (mut engine, _clock, mut sink) = linked_engine();
    let result = engine.issue(&Intent::UpdateMotor(3, 9000, Direction::Ccw), &mut sink);
    assert!(result.is_err());
    // Direction must not be applied when the speed half is invalid.
    assert_eq!(motor(&engine, 3).direction, Direction::Cw);
    assert_eq!(engine.pending_count(), 0);
}

// ── Optimistic then confirmed ─────────────────────────────────

#[test]
fn motor_power_confirmed_by_device() {
    let (mut engine, clock, mut sink) = linked_engine();

    let issued = engine.issue(&Intent::SetMotorPower(2, true), &mut sink).unwrap();
    assert_eq!(issued.frames.len(), 1);
    assert_eq!(issued.frames[0].frame.encode(), [3, 2, 1, 0, 0, 0, 0x0A]);
    assert_eq!(motor(&engine, 2).status, Power::On);
    assert_eq!(engine.pending_count(), 1);

    let outcome = engine.handle_inbound(&[3, 2, 1, 0, 0, 0, 0x0A], &mut sink);
    assert!(matches!(outcome, InboundOutcome::Confirmed(_)));
    assert_eq!(engine.pending_count(), 0);
    assert_eq!(motor(&engine, 2).status, Power::On);

    clock.advance(10_000);
    assert_eq!(engine.expire_due(&mut sink), 0);
    assert_eq!(motor(&engine, 2).status, Power::On);
    assert_eq!(sink.reverts(), 0);
    assert_eq!(
        sink.count(|e| *e == EngineEvent::Confirmed(PendingKey::new(2, CommandId::MotorPower))),
        1
    );
}

#[test]
fn confirmation_takes_the_device_value() {
    let (mut engine, _clock, mut sink) = linked_engine();
    engine.issue(&Intent::SetLedIntensity(1, 80), &mut sink).unwrap();

    // The firmware clamps to 75 and reports what it actually applied.
    let outcome = engine.handle_inbound(&[8, 1, 75, 0, 0, 0, 0x0A], &mut sink);

    assert!(matches!(outcome, InboundOutcome::Confirmed(_)));
    assert_eq!(led(&engine, 1).intensity, 75);
    assert_eq!(engine.pending_count(), 0);
}

// ── Optimistic then reverted ──────────────────────────────────

#[test]
fn unconfirmed_intensity_reverts_after_timeout() {
    let (mut engine, clock, mut sink) = linked_engine();

    engine.issue(&Intent::SetLedIntensity(1, 80), &mut sink).unwrap();
    assert_eq!(led(&engine, 1).intensity, 80);
    assert_eq!(sink.changes(ChangeSource::Optimistic), 1);

    clock.advance(2_999);
    assert_eq!(engine.expire_due(&mut sink), 0);
    assert_eq!(led(&engine, 1).intensity, 80);

    clock.advance(1);
    assert_eq!(engine.expire_due(&mut sink), 1);
    assert_eq!(led(&engine, 1).intensity, 0);
    assert_eq!(sink.reverts(), 1);
    assert_eq!(sink.changes(ChangeSource::Reverted), 1);
    assert_eq!(engine.pending_count(), 0);

    // Expiring again has nothing left to do.
    clock.advance(5_000);
    assert_eq!(engine.expire_due(&mut sink), 0);
    assert_eq!(sink.reverts(), 1);
}

#[test]
fn revert_restores_only_the_written_field() {
    let (mut engine, clock, mut sink) = linked_engine();
    engine.issue(&Intent::SetLedIntensity(1, 80), &mut sink).unwrap();

    // Meanwhile the device reports the LED switched on by itself.
    let outcome = engine.handle_inbound(&[7, 1, 1, 0, 0, 0, 0x0A], &mut sink);
    assert!(matches!(outcome, InboundOutcome::Unsolicited(_)));

    clock.advance(3_000);
    assert_eq!(engine.expire_due(&mut sink), 1);

    let l = led(&engine, 1);
    assert_eq!(l.intensity, 0);
    assert_eq!(l.status, Power::On);
}

// ── Supersession ──────────────────────────────────────────────

#[test]
fn newer_write_supersedes_older_one() {
    let (mut engine, clock, mut sink) = linked_engine();
    let key = PendingKey::new(3, CommandId::MotorSpeed);

    engine.issue(&Intent::SetMotorSpeed(3, 1000), &mut sink).unwrap();
    clock.advance(1_000);
    engine.issue(&Intent::SetMotorSpeed(3, 2000), &mut sink).unwrap();

    assert_eq!(engine.pending_count(), 1);
    let pending = engine.pending(&key).unwrap();
    assert_eq!(pending.rollback, EntityUpdate::MotorSpeed(1000));
    assert_eq!(pending.deadline_ms, 4_000);
    assert_eq!(sink.count(|e| *e == EngineEvent::Superseded(key)), 1);
    assert_eq!(motor(&engine, 3).speed, 2000);

    // The first write's deadline passes without effect.
    clock.advance(2_000);
    assert_eq!(engine.expire_due(&mut sink), 0);
    assert_eq!(motor(&engine, 3).speed, 2000);

    clock.advance(1_000);
    assert_eq!(engine.expire_due(&mut sink), 1);
    assert_eq!(motor(&engine, 3).speed, 1000);
    assert_eq!(sink.reverts(), 1);
}

#[test]
fn writes_to_different_fields_are_independent() {
    let (mut engine, clock, mut sink) = linked_engine();

    let issued = engine
        .issue(&Intent::UpdateMotor(4, 1200, Direction::Ccw), &mut sink)
        .unwrap();
    assert_eq!(issued.frames.len(), 2);
    assert_eq!(issued.frames[0].frame.command, CommandId::MotorDirection);
    assert_eq!(issued.frames[1].frame.command, CommandId::MotorSpeed);
    assert_eq!(issued.handle().tickets.len(), 2);
    assert_eq!(engine.pending_count(), 2);

    // Only the direction is confirmed.
    engine.handle_inbound(&[1, 4, 1, 0, 0, 0, 0x0A], &mut sink);
    assert_eq!(engine.pending_count(), 1);

    clock.advance(3_000);
    assert_eq!(engine.expire_due(&mut sink), 1);
    let m = motor(&engine, 4);
    assert_eq!(m.direction, Direction::Ccw);
    assert_eq!(m.speed, 0);
}

// ── Unsolicited and malformed inbound ─────────────────────────

#[test]
fn unsolicited_light_barrier_report() {
    let (mut engine, _clock, mut sink) = linked_engine();

    let outcome = engine.handle_inbound(&[20, 1, 1, 0, 0, 0, 0x0A], &mut sink);

    assert!(matches!(outcome, InboundOutcome::Unsolicited(_)));
    match engine.get(EntityRef::light_barrier(1)).map(|s| s.entity) {
        Some(DeviceEntity::LightBarrier(b)) => assert_eq!(b.status, BarrierStatus::Active),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(sink.changes(ChangeSource::Confirmed), 1);
    assert_eq!(engine.pending_count(), 0);
}

#[test]
fn short_frame_is_dropped() {
    let (mut engine, _clock, mut sink) = linked_engine();
    let before = engine.snapshot_all();

    let outcome = engine.handle_inbound(&[8, 1, 80, 0, 0], &mut sink);

    assert_eq!(outcome, InboundOutcome::Dropped(DropReason::TooShort(5)));
    assert_eq!(engine.snapshot_all(), before);
    assert_eq!(
        sink.events(),
        vec![EngineEvent::FrameDropped(DropReason::TooShort(5))]
    );
}

#[test]
fn unknown_command_is_dropped() {
    let (mut engine, _clock, mut sink) = linked_engine();
    let outcome = engine.handle_inbound(&[42, 1, 1, 0, 0, 0, 0x0A], &mut sink);
    assert_eq!(outcome, InboundOutcome::Dropped(DropReason::UnknownCommand(42)));
}

#[test]
fn report_for_unknown_entity_is_dropped() {
    let (mut engine, _clock, mut sink) = linked_engine();
    let before = engine.snapshot_all();

    let outcome = engine.handle_inbound(&[7, 9, 1, 0, 0, 0, 0x0A], &mut sink);

    assert_eq!(
        outcome,
        InboundOutcome::Dropped(DropReason::UnknownTarget {
            command: CommandId::LedPower,
            target_id: 9,
        })
    );
    assert_eq!(engine.snapshot_all(), before);
}

#[test]
fn out_of_range_report_is_dropped_and_keeps_pending() {
    let (mut engine, _clock, mut sink) = linked_engine();
    engine.issue(&Intent::SetLedIntensity(2, 30), &mut sink).unwrap();

    let outcome = engine.handle_inbound(&[8, 2, 150, 0, 0, 0, 0x0A], &mut sink);

    assert!(matches!(
        outcome,
        InboundOutcome::Dropped(DropReason::InvalidValue { value: 150, .. })
    ));
    assert_eq!(led(&engine, 2).intensity, 30);
    assert_eq!(engine.pending_count(), 1);
}

// ── Link loss ─────────────────────────────────────────────────

#[test]
fn disconnect_freezes_state_and_cancels_reverts() {
    let (mut engine, clock, mut sink) = linked_engine();
    engine.issue(&Intent::SetLedPower(3, true), &mut sink).unwrap();
    engine.issue(&Intent::SetMotorSpeed(2, 500), &mut sink).unwrap();

    assert_eq!(engine.disconnect(&mut sink), 2);
    assert!(!engine.is_linked());
    assert_eq!(engine.pending_count(), 0);
    assert!(sink.events().contains(&EngineEvent::Frozen { cleared: 2 }));

    clock.advance(10_000);
    assert_eq!(engine.expire_due(&mut sink), 0);
    assert_eq!(led(&engine, 3).status, Power::On);
    assert_eq!(motor(&engine, 2).speed, 500);
    assert_eq!(sink.reverts(), 0);

    assert_eq!(
        engine.issue(&Intent::SetLedPower(3, false), &mut sink),
        Err(Error::Transport(TransportError::NotConnected))
    );
}

#[test]
fn relink_accepts_new_writes() {
    let (mut engine, _clock, mut sink) = linked_engine();
    engine.disconnect(&mut sink);
    engine.link_up(&mut sink);

    engine.issue(&Intent::SetLedPower(4, true), &mut sink).unwrap();
    assert_eq!(engine.pending_count(), 1);
    assert_eq!(led(&engine, 4).status, Power::On);
}

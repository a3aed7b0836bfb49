//! Console runtime over the loopback link, with real revert timers.
//!
//! The revert timeout is shortened to 50ms so these run quickly; waits are
//! generous multiples of it.

use edge_executor::LocalExecutor;
use embassy_time::Timer;
use rigsync::adapters::time::MonotonicClock;
use rigsync::app::commands::Intent;
use rigsync::app::events::{ChangeSource, EngineEvent};
use rigsync::config::ConsoleConfig;
use rigsync::error::{Error, TransportError};
use rigsync::engine::PendingKey;
use rigsync::protocol::command::CommandId;
use rigsync::runtime::{CHANGE_DEPTH, Console};
use rigsync::state::entity::{DeviceEntity, Direction, EntityRef, Led, Motor, Power};
use rigsync::transport::{LoopbackDevice, LoopbackGateway};

use crate::mocks::{RecordingSink, drive};

const TIMEOUT_MS: u64 = 50;

type TestConsole<'ex> = Console<'ex, LoopbackGateway, MonotonicClock, RecordingSink>;

fn console<'a>(ex: &'a LocalExecutor<'static>) -> (TestConsole<'a>, LoopbackDevice, RecordingSink) {
    let config = ConsoleConfig {
        revert_timeout_ms: TIMEOUT_MS,
        ..ConsoleConfig::default()
    };
    let (gateway, device) = LoopbackGateway::new();
    let sink = RecordingSink::new();
    let console = Console::new(ex, &config, gateway, MonotonicClock::new(), sink.clone())
        .expect("default layout is valid");
    (console, device, sink)
}

async fn wait_ms(ms: u64) {
    Timer::after_millis(ms).await;
}

fn led(console: &TestConsole<'_>, id: u8) -> Led {
    match console.get(EntityRef::led(id)).map(|s| s.entity) {
        Some(DeviceEntity::Led(l)) => l,
        other => panic!("expected LED {id}, got {other:?}"),
    }
}

fn motor(console: &TestConsole<'_>, id: u8) -> Motor {
    match console.get(EntityRef::motor(id)).map(|s| s.entity) {
        Some(DeviceEntity::Motor(m)) => m,
        other => panic!("expected motor {id}, got {other:?}"),
    }
}

// ── Connect ───────────────────────────────────────────────────

#[test]
fn issue_before_connect_fails() {
    let ex = LocalExecutor::new();
    let (console, device, _sink) = console(&ex);

    let result = drive(&ex, console.issue(Intent::SetLedPower(1, true)));

    assert_eq!(result, Err(Error::Transport(TransportError::NotConnected)));
    assert!(device.sent_frames().is_empty());
    assert_eq!(led(&console, 1).status, Power::Off);
}

#[test]
fn refused_connection_leaves_console_unlinked() {
    let ex = LocalExecutor::new();
    let (console, device, _sink) = console(&ex);
    device.refuse_connect(true);

    let result = drive(&ex, console.connect());

    assert!(matches!(
        result,
        Err(Error::Transport(TransportError::PortUnavailable(_)))
    ));
    assert!(!console.is_linked());
}

// ── Revert timers ─────────────────────────────────────────────

#[test]
fn unconfirmed_write_reverts_on_timer() {
    let ex = LocalExecutor::new();
    let (console, device, sink) = console(&ex);

    drive(&ex, async {
        console.connect().await.unwrap();
        console.issue(Intent::SetLedIntensity(1, 80)).await.unwrap();

        assert_eq!(device.sent_frames(), vec![vec![8, 1, 80, 0, 0, 0, 0x0A]]);
        assert_eq!(led(&console, 1).intensity, 80);
        assert_eq!(console.armed_timers(), 1);

        wait_ms(TIMEOUT_MS * 3).await;
    });

    assert_eq!(led(&console, 1).intensity, 0);
    assert_eq!(console.pending_count(), 0);
    assert_eq!(console.armed_timers(), 0);
    assert_eq!(sink.reverts(), 1);
}

#[test]
fn device_echo_confirms_and_cancels_timer() {
    let ex = LocalExecutor::new();
    let (console, device, sink) = console(&ex);

    drive(&ex, async {
        console.connect().await.unwrap();
        console.issue(Intent::SetMotorPower(2, true)).await.unwrap();
        assert!(device.inject(&[3, 2, 1, 0, 0, 0, 0x0A]));

        wait_ms(10).await;
        assert_eq!(console.pending_count(), 0);
        assert_eq!(console.armed_timers(), 0);

        wait_ms(TIMEOUT_MS * 3).await;
    });

    assert_eq!(motor(&console, 2).status, Power::On);
    assert_eq!(sink.reverts(), 0);
    assert_eq!(sink.count(|e| matches!(e, EngineEvent::Confirmed(_))), 1);
}

#[test]
fn auto_ack_device_confirms_every_write() {
    let ex = LocalExecutor::new();
    let (console, device, sink) = console(&ex);
    device.set_auto_ack(true);

    drive(&ex, async {
        console.connect().await.unwrap();
        console
            .issue(Intent::UpdateMotor(3, 2500, Direction::Ccw))
            .await
            .unwrap();
        wait_ms(TIMEOUT_MS * 3).await;
    });

    let m = motor(&console, 3);
    assert_eq!(m.speed, 2500);
    assert_eq!(m.direction, Direction::Ccw);
    assert_eq!(console.pending_count(), 0);
    assert_eq!(sink.reverts(), 0);
}

#[test]
fn superseded_write_keeps_a_single_timer() {
    let ex = LocalExecutor::new();
    let (console, _device, sink) = console(&ex);

    drive(&ex, async {
        console.connect().await.unwrap();
        let first = console.issue(Intent::SetMotorSpeed(3, 1000)).await.unwrap();
        let second = console.issue(Intent::SetMotorSpeed(3, 2000)).await.unwrap();
        assert!(first.keys().eq(second.keys()));
        assert_eq!(
            second.keys().collect::<Vec<_>>(),
            vec![PendingKey::new(3, CommandId::MotorSpeed)]
        );

        assert_eq!(console.pending_count(), 1);
        assert_eq!(console.armed_timers(), 1);

        wait_ms(TIMEOUT_MS * 3).await;
    });

    assert_eq!(motor(&console, 3).speed, 1000);
    assert_eq!(sink.reverts(), 1);
    assert_eq!(sink.count(|e| matches!(e, EngineEvent::Superseded(_))), 1);
}

// ── Send failure ──────────────────────────────────────────────

#[test]
fn failed_send_rolls_back_immediately() {
    let ex = LocalExecutor::new();
    let (console, device, sink) = console(&ex);

    let result = drive(&ex, async {
        console.connect().await.unwrap();
        device.fail_next_sends(1);
        console.issue(Intent::SetMotorPower(2, true)).await
    });

    assert!(matches!(result, Err(Error::Transport(TransportError::Io(_)))));
    assert_eq!(motor(&console, 2).status, Power::Off);
    assert_eq!(console.pending_count(), 0);
    assert_eq!(console.armed_timers(), 0);
    assert_eq!(sink.count(|e| matches!(e, EngineEvent::SendFailed { .. })), 1);
    assert_eq!(sink.changes(ChangeSource::Reverted), 1);
    assert_eq!(sink.reverts(), 0);
}

#[test]
fn failed_first_frame_abandons_the_rest_of_the_intent() {
    let ex = LocalExecutor::new();
    let (console, device, sink) = console(&ex);

    let result = drive(&ex, async {
        console.connect().await.unwrap();
        device.fail_next_sends(1);
        console.issue(Intent::UpdateMotor(4, 1500, Direction::Ccw)).await
    });

    assert!(matches!(result, Err(Error::Transport(TransportError::Io(_)))));
    assert!(device.sent_frames().is_empty());
    // Only the frame that actually failed is reported; the speed frame was
    // never attempted but is still rolled back.
    assert_eq!(sink.count(|e| matches!(e, EngineEvent::SendFailed { .. })), 1);
    assert_eq!(sink.changes(ChangeSource::Reverted), 2);
    let m = motor(&console, 4);
    assert_eq!((m.speed, m.direction), (0, Direction::Cw));
    assert_eq!(console.pending_count(), 0);
    assert_eq!(console.armed_timers(), 0);
}

// ── Link loss ─────────────────────────────────────────────────

#[test]
fn dropped_link_freezes_state() {
    let ex = LocalExecutor::new();
    let (console, device, sink) = console(&ex);

    let after = drive(&ex, async {
        console.connect().await.unwrap();
        console.issue(Intent::SetLedPower(2, true)).await.unwrap();
        device.drop_link();

        wait_ms(TIMEOUT_MS * 3).await;
        console.issue(Intent::SetLedPower(2, false)).await
    });

    assert!(!console.is_linked());
    assert_eq!(console.pending_count(), 0);
    assert_eq!(console.armed_timers(), 0);
    assert_eq!(led(&console, 2).status, Power::On);
    assert_eq!(sink.reverts(), 0);
    assert!(sink.events().contains(&EngineEvent::Frozen { cleared: 1 }));
    assert_eq!(after, Err(Error::Transport(TransportError::NotConnected)));
}

#[test]
fn reconnect_after_disconnect() {
    let ex = LocalExecutor::new();
    let (console, device, _sink) = console(&ex);
    device.set_auto_ack(true);

    drive(&ex, async {
        console.connect().await.unwrap();
        console.issue(Intent::SetLedPower(1, true)).await.unwrap();
        console.disconnect().await;
        assert!(!console.is_linked());
        device.clear_sent();

        console.connect().await.unwrap();
        console.issue(Intent::SetLedPower(4, true)).await.unwrap();
        wait_ms(10).await;
    });

    assert_eq!(device.sent_frames(), vec![vec![7, 4, 1, 0, 0, 0, 0x0A]]);

    assert!(console.is_linked());
    assert_eq!(led(&console, 4).status, Power::On);
    assert_eq!(console.pending_count(), 0);
}

// ── Change stream ─────────────────────────────────────────────

#[test]
fn change_stream_reports_sources_in_order() {
    let ex = LocalExecutor::new();
    let (console, device, _sink) = console(&ex);
    let changes = console.changes();

    drive(&ex, async {
        console.connect().await.unwrap();
        console.issue(Intent::SetLedIntensity(3, 40)).await.unwrap();
        device.inject(&[20, 2, 1, 0, 0, 0, 0x0A]);
        wait_ms(TIMEOUT_MS * 3).await;
    });

    let sources: Vec<(EntityRef, ChangeSource)> = changes
        .drain()
        .into_iter()
        .map(|c| (c.snapshot.reference(), c.source))
        .collect();
    assert_eq!(
        sources,
        vec![
            (EntityRef::led(3), ChangeSource::Optimistic),
            (EntityRef::light_barrier(2), ChangeSource::Confirmed),
            (EntityRef::led(3), ChangeSource::Reverted),
        ]
    );
}

#[test]
fn overflowing_change_stream_keeps_the_latest_state() {
    let ex = LocalExecutor::new();
    let (console, device, _sink) = console(&ex);
    device.set_auto_ack(true);
    let changes = console.changes();

    drive(&ex, async {
        console.connect().await.unwrap();
        for pct in 0..40 {
            console.issue(Intent::SetLedIntensity(1, pct)).await.unwrap();
        }
        wait_ms(20).await;
    });

    // 40 optimistic plus 40 confirmed changes; only the newest fit.
    let drained = changes.drain();
    assert_eq!(drained.len(), CHANGE_DEPTH);
    let last = drained.last().unwrap();
    assert_eq!(Some(last.snapshot), console.get(EntityRef::led(1)));
    assert_eq!(led(&console, 1).intensity, 39);
    assert_eq!(last.source, ChangeSource::Confirmed);
}

#[test]
fn inbound_production_mode_is_tracked() {
    let ex = LocalExecutor::new();
    let (console, device, _sink) = console(&ex);

    drive(&ex, async {
        console.connect().await.unwrap();
        device.inject(&[10, 0, 1, 0, 0, 0, 0x0A]);
        wait_ms(10).await;
    });

    assert!(console.production_mode());
}

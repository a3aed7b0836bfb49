//! Rig console entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SerialGateway / LoopbackGateway   LogEventSink   JsonFileConfig│
//! │  (TransportGateway)                (EventSink)    (ConfigPort)  │
//! │  MonotonicClock (Clock)                                        │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │   Console (runtime) ──▶ ReconciliationEngine           │    │
//! │  │   Dispatch · Codec · Store · PendingTable              │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `rigsync [--verbose] [config.json]`.  Commands are read from stdin, one per
//! line (`help` lists them).  Without the `serial` feature the console
//! talks to an in-memory device that acknowledges every frame.
#![deny(unused_must_use)]

use anyhow::{Context, Result};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use futures_lite::StreamExt;
use log::{debug, info, warn};

use rigsync::adapters::config_file::JsonFileConfig;
use rigsync::adapters::log_sink::LogEventSink;
use rigsync::adapters::time::MonotonicClock;
use rigsync::app::commands::Intent;
use rigsync::app::ports::{Clock, EventSink};
use rigsync::config::ConsoleConfig;
use rigsync::runtime::Console;
use rigsync::state::entity::{DeviceEntity, Direction};
use rigsync::transport::TransportGateway;

// ── Operator input ────────────────────────────────────────────
//
// A blocking stdin thread parses lines and hands them to the async side
// through a static channel.

enum Command {
    Issue(Intent),
    Status,
    Quit,
}

static INPUT_CHANNEL: Channel<CriticalSectionRawMutex, Command, 8> = Channel::new();

const HELP: &str = "\
led <id> on|off          toggle an LED
intensity <id> <0-100>   set LED intensity
motor <id> on|off        toggle a motor
speed <id> <0-5000>      set motor speed (Hz)
dir <id> cw|ccw          set motor direction
update <id> <hz> cw|ccw  set speed and direction together
reset                    reset the rig
prod on|off              production mode
status                   print every entity
quit";

fn parse_on_off(word: &str) -> Option<bool> {
    match word {
        "on" | "1" => Some(true),
        "off" | "0" => Some(false),
        _ => None,
    }
}

fn parse_direction(word: &str) -> Option<Direction> {
    match word {
        "cw" => Some(Direction::Cw),
        "ccw" => Some(Direction::Ccw),
        _ => None,
    }
}

fn parse_line(line: &str) -> Option<Command> {
    let words: Vec<String> = line.split_whitespace().map(str::to_lowercase).collect();
    let words: Vec<&str> = words.iter().map(String::as_str).collect();
    let id = |i: usize| words.get(i).and_then(|w| w.parse::<u8>().ok());

    let intent = match words.as_slice() {
        ["led", _, state] => Intent::SetLedPower(id(1)?, parse_on_off(state)?),
        ["intensity", _, pct] => Intent::SetLedIntensity(id(1)?, pct.parse().ok()?),
        ["motor", _, state] => Intent::SetMotorPower(id(1)?, parse_on_off(state)?),
        ["speed", _, hz] => Intent::SetMotorSpeed(id(1)?, hz.parse().ok()?),
        ["dir", _, dir] => Intent::SetMotorDirection(id(1)?, parse_direction(dir)?),
        ["update", _, hz, dir] => {
            Intent::UpdateMotor(id(1)?, hz.parse().ok()?, parse_direction(dir)?)
        }
        ["reset"] => Intent::Reset,
        ["prod", state] => Intent::SetProductionMode(parse_on_off(state)?),
        ["status"] => return Some(Command::Status),
        ["quit" | "exit"] => return Some(Command::Quit),
        _ => return None,
    };
    Some(Command::Issue(intent))
}

fn spawn_stdin_reader() -> Result<()> {
    std::thread::Builder::new()
        .name("stdin".into())
        .spawn(|| {
            for line in std::io::stdin().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_line(&line) {
                    Some(cmd) => futures_lite::future::block_on(INPUT_CHANNEL.send(cmd)),
                    None => println!("{HELP}"),
                }
            }
            futures_lite::future::block_on(INPUT_CHANNEL.send(Command::Quit));
        })
        .context("failed to spawn stdin reader")?;
    Ok(())
}

// ── Console loop ──────────────────────────────────────────────

fn print_status<G, C, S>(console: &Console<'_, G, C, S>)
where
    G: TransportGateway + 'static,
    C: Clock + 'static,
    S: EventSink + 'static,
{
    for snap in console.snapshot_all() {
        match snap.entity {
            DeviceEntity::Led(l) => println!("LED {}: {:?} {}%", l.id, l.status, l.intensity),
            DeviceEntity::Motor(m) => {
                println!("motor {}: {:?} {}Hz {:?}", m.id, m.status, m.speed, m.direction);
            }
            DeviceEntity::LightBarrier(b) => println!("light barrier {}: {:?}", b.id, b.status),
        }
    }
    println!(
        "production mode: {} | pending writes: {}",
        if console.production_mode() { "ON" } else { "OFF" },
        console.pending_count()
    );
}

async fn run<G>(
    executor: &edge_executor::LocalExecutor<'static>,
    config: ConsoleConfig,
    gateway: G,
    log_sink: LogEventSink,
) -> Result<()>
where
    G: TransportGateway + 'static,
{
    let console = Console::new(executor, &config, gateway, MonotonicClock::new(), log_sink)?;
    console.connect().await.context("failed to open link")?;

    let mut changes = console.changes();
    let ui = executor.spawn(async move {
        while let Some(change) = changes.next().await {
            debug!("UI | {:?} {:?}", change.source, change.snapshot.entity);
        }
    });

    loop {
        match INPUT_CHANNEL.receive().await {
            Command::Issue(intent) => {
                if let Err(e) = console.issue(intent).await {
                    warn!("{:?} rejected: {}", intent, e);
                }
            }
            Command::Status => print_status(&console),
            Command::Quit => break,
        }
    }

    console.disconnect().await;
    drop(ui);
    info!("bye");
    Ok(())
}

// ── Entry point ───────────────────────────────────────────────

struct Args {
    verbose: bool,
    config_path: Option<String>,
}

fn parse_args(args: impl Iterator<Item = String>) -> Args {
    let mut parsed = Args {
        verbose: false,
        config_path: None,
    };
    for arg in args {
        match arg.as_str() {
            "-v" | "--verbose" => parsed.verbose = true,
            _ => parsed.config_path = Some(arg),
        }
    }
    parsed
}

fn load_config(path: Option<String>) -> Result<ConsoleConfig> {
    match path {
        Some(path) => {
            let port = JsonFileConfig::new(&path);
            let config = port
                .load_or_default()
                .with_context(|| format!("cannot load config from {path}"))?;
            info!("config loaded from {}", port.path().display());
            Ok(config)
        }
        None => Ok(ConsoleConfig::default()),
    }
}

#[cfg(feature = "serial")]
fn gateway() -> rigsync::adapters::serial::SerialGateway {
    match rigsync::adapters::serial::list_ports() {
        Ok(ports) => info!("serial ports: {:?}", ports),
        Err(e) => warn!("cannot list serial ports: {}", e),
    }
    rigsync::adapters::serial::SerialGateway::new()
}

#[cfg(not(feature = "serial"))]
fn gateway() -> rigsync::transport::LoopbackGateway {
    let (gateway, device) = rigsync::transport::LoopbackGateway::new();
    device.set_auto_ack(true);
    info!("no serial support compiled in, using loopback device");
    gateway
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("rigsync v{}", env!("CARGO_PKG_VERSION"));

    let args = parse_args(std::env::args().skip(1));
    let config = load_config(args.config_path)?;
    info!(
        "revert timeout {}ms, {} entities, link '{}' @ {} baud",
        config.revert_timeout_ms,
        config.entities.len(),
        config.link.port,
        config.link.baud_rate
    );

    spawn_stdin_reader()?;
    println!("{HELP}");

    let log_sink = if args.verbose {
        LogEventSink::verbose()
    } else {
        LogEventSink::new()
    };
    let executor: edge_executor::LocalExecutor<'static> = edge_executor::LocalExecutor::new();

    // The console future borrows the executor to spawn tasks, so it is
    // raced against the executor's own run loop instead of passed into it.
    futures_lite::future::block_on(futures_lite::future::or(
        run(&executor, config, gateway(), log_sink),
        executor.run(core::future::pending()),
    ))
}

//! Rig console core library.
//!
//! Device command protocol and state synchronization for a bench rig of
//! LEDs, motors and light barriers driven over a 7-byte frame link.
//! Exposes the pure-logic modules for integration testing; the async
//! [`runtime::Console`] ties them to a [`transport::TransportGateway`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod runtime;
pub mod state;
pub mod transport;

pub use app::commands::Intent;
pub use app::events::{ChangeSource, EngineEvent, EntityChangeEvent};
pub use config::ConsoleConfig;
pub use engine::ReconciliationEngine;
pub use error::{Error, Result};
pub use runtime::Console;

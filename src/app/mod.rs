//! Application boundary: the request vocabulary, the event vocabulary, and
//! the port traits adapters implement.
//!
//! Nothing in here performs I/O.  The engine in [`crate::engine`] consumes
//! [`commands::Intent`]s and emits [`events::EngineEvent`]s through
//! [`ports::EventSink`], so every path is testable with in-memory mocks.

pub mod commands;
pub mod events;
pub mod ports;

//! Unified error types for the rig console core.
//!
//! A single [`Error`] enum that every layer can convert into, keeping the
//! binary's top-level handling uniform.  The per-layer enums stay small and
//! descriptive so callers can match on exactly the failure they care about.
//!
//! Nothing here is fatal to the process: the worst outcome of any error
//! path is a store rollback or a dropped frame.

use core::fmt;

use crate::app::ports::ConfigError;
use crate::protocol::command::{CommandId, EntityKind};

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible console operation funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An inbound byte sequence could not be decoded.
    Codec(CodecError),
    /// An intent was rejected before anything was sent.
    Dispatch(DispatchError),
    /// The transport gateway failed to connect or send.
    Transport(TransportError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Codec(e) => write!(f, "codec: {e}"),
            Self::Dispatch(e) => write!(f, "dispatch: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Codec errors
// ---------------------------------------------------------------------------

/// Frame decoding failures.
///
/// Recovered locally by logging and discarding; it indicates transport
/// framing noise, not a device fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// Fewer than seven bytes were delivered (carries the actual length).
    TooShort(usize),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort(len) => write!(f, "frame too short ({len} of 7 bytes)"),
        }
    }
}

impl std::error::Error for CodecError {}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Self::Codec(e)
    }
}

// ---------------------------------------------------------------------------
// Dispatch errors
// ---------------------------------------------------------------------------

/// Caller errors surfaced synchronously from `issue`, before any frame is
/// sent or any optimistic update applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// Value outside the documented range for the command.
    InvalidValue { command: CommandId, value: u32 },
    /// The addressed entity is not part of the configured layout.
    UnknownEntity { kind: EntityKind, id: u8 },
    /// The command is device-wide and has no entity to update.
    NotEntityScoped(CommandId),
    /// Every pending-write slot is occupied.
    PendingTableFull,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { command, value } => {
                write!(f, "value {value} out of range for {}", command.label())
            }
            Self::UnknownEntity { kind, id } => write!(f, "unknown {kind} {id}"),
            Self::NotEntityScoped(command) => {
                write!(f, "{} does not address an entity", command.label())
            }
            Self::PendingTableFull => write!(f, "pending-write table full"),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<DispatchError> for Error {
    fn from(e: DispatchError) -> Self {
        Self::Dispatch(e)
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Failures reported by a [`TransportGateway`](crate::transport::TransportGateway).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No link is open.
    NotConnected,
    /// The requested port does not exist or could not be opened.
    PortUnavailable(String),
    /// An I/O operation on an open link failed.
    Io(String),
    /// The inbound side of the link has shut down.
    Closed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::PortUnavailable(port) => write!(f, "port unavailable: {port}"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
            Self::Closed => write!(f, "link closed"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

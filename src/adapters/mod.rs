//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements        | Connects to                 |
//! |---------------|-------------------|-----------------------------|
//! | `log_sink`    | EventSink         | `log` facade (operator log) |
//! | `time`        | Clock             | embassy-time monotonic base |
//! | `config_file` | ConfigPort        | JSON file on disk           |
//! | `serial`      | TransportGateway  | USB/UART serial port        |

pub mod config_file;
pub mod log_sink;
#[cfg(feature = "serial")]
pub mod serial;
pub mod time;

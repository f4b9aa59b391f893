//! Byte-level protocol for the display bus of Philips-style coffee machines.
//!
//! This is deliberately a small corner of the real mainboard protocol: fixed
//! command payloads we replay verbatim, the LED fields of the telemetry
//! frame, and the coarse status tokens. Nothing here performs I/O.

mod commands;
mod frame;
mod machine_enum;
mod status;

pub use commands::*;
pub use frame::*;
pub use machine_enum::*;
pub use status::*;

/// Renders a payload as lowercase hex for trace logging.
pub fn stringify(buffer: &[u8]) -> String {
    hex::encode(buffer)
}

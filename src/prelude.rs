//! Universal imports for this crate.

pub use std::time::Duration;

pub use crate::{info, trace_packet, warning};

//! Device-control state machines.
//!
//! Both controllers are pure: every entry point takes the current monotonic
//! millisecond counter and returns a list of side effects for the shell to
//! execute. Timing logic is therefore testable without real time or real
//! hardware.

mod beverage;
mod power;

pub use beverage::*;
pub use power::*;

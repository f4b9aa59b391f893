//! Drive a Philips-style coffee machine from software!
//!
//! Crema impersonates the machine's own display over the shared serial bus:
//! it injects the display's button-press and power messages, decodes the
//! telemetry stream to learn what the machine is really doing, and — when the
//! display is asleep and deaf to the bus — briefly cuts its power to force it
//! awake ("power trip") before injecting the power-on sequence.
//!
//! # Examples
//!
//! Watch the (simulated) machine:
//! ```text
//! $ crema monitor
//! ● on  │ coffee selected │ beans ▮▮▯ size ▮▯▯ milk ▮▮▯
//! ```
//!
//! Turn it on, tripping the display first if it is silent:
//! ```text
//! $ crema power
//! Display not communicating, power tripping first
//! Power is now on
//! ```
//!
//! Drive the cup size to level 2:
//! ```text
//! $ crema set --kind size --value 2
//! Level 2 reached
//! ```

pub mod control;
pub mod display;
pub mod logging;
pub mod machine;
pub mod prelude;
pub mod protocol;
pub mod store;

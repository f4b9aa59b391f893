use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::control::PinLevel;
use crate::machine::MachineError;

/// Fire-and-forget writer onto the shared display bus. There is no
/// acknowledgement and no read-back of what was written.
pub trait CommandBus: Send {
    fn write(&mut self, payload: &[u8]) -> Result<(), MachineError>;
    fn flush(&mut self) -> Result<(), MachineError>;
}

/// Binary output supplying power to the display subsystem.
pub trait PowerPin: Send {
    fn set_level(&mut self, high: bool) -> Result<(), MachineError>;
}

/// Monotonic millisecond counter; all controller timing is relative to it.
pub trait Clock: Send {
    fn now_ms(&self) -> u64;
}

/// Clock backed by [`Instant`], starting at zero.
pub struct MonotonicClock {
    started: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        MonotonicClock {
            started: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Hand-advanced clock for tests and embedders that drive time themselves.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        ManualClock {
            now: Arc::new(AtomicU64::new(now_ms)),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::Relaxed);
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }
}

/// Maps logical cut/restore drives onto the physical pin, honouring the
/// configured idle level and inversion.
pub struct DisplayPowerPin {
    pin: Box<dyn PowerPin>,
    idle_level: bool,
}

impl DisplayPowerPin {
    pub fn new(pin: Box<dyn PowerPin>, initial_level: bool, invert: bool) -> Self {
        DisplayPowerPin {
            pin,
            idle_level: initial_level != invert,
        }
    }

    pub fn drive(&mut self, level: PinLevel) -> Result<(), MachineError> {
        let value = match level {
            PinLevel::Idle => self.idle_level,
            PinLevel::Cut => !self.idle_level,
        };
        self.pin.set_level(value)
    }
}

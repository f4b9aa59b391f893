//! Simulated machine, no hardware required.
//!
//! Models just enough of the real thing to exercise the controllers: a
//! display that only communicates while powered and booted, power commands
//! that work only while it is communicating, and press commands that bump
//! LED levels. A burst of identical writes counts as one press, the way the
//! mainboard debounces repeated messages.

use std::sync::{Arc, Mutex};

use tokio_stream::Stream;

use crate::machine::{CommandBus, MachineError, PowerPin};
use crate::prelude::*;
use crate::protocol::{Command, LedLevel, LED_ON, TOKEN_COFFEE, TOKEN_IDLE, TOKEN_OFF};

/// Time the simulated display takes to boot after a power restore.
const DISPLAY_BOOT_MS: u64 = 3000;
/// Ticks of uptime before the simulated user opens the coffee screen.
const TICKS_UNTIL_SELECTED: u32 = 8;

struct SimState {
    /// Display supply present (the power pin).
    powered: bool,
    /// Display booted and sending status messages.
    communicating: bool,
    /// Machine itself on (idle screen or a selection screen).
    machine_on: bool,
    boot_remaining_ms: u64,
    on_ticks: u32,
    bean: u8,
    size: u8,
    milk: u8,
}

#[derive(Clone)]
pub struct SimulatedMachine {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedMachine {
    /// A machine whose display is asleep: the hard case that needs a power
    /// trip before anything listens.
    pub fn new() -> Self {
        SimulatedMachine {
            state: Arc::new(Mutex::new(SimState {
                powered: true,
                communicating: false,
                machine_on: false,
                boot_remaining_ms: 0,
                on_ticks: 0,
                bean: 2,
                size: 1,
                milk: 2,
            })),
        }
    }

    /// A machine that is already on with the coffee screen open.
    pub fn new_awake() -> Self {
        let sim = Self::new();
        {
            let mut state = sim.state.lock().unwrap();
            state.communicating = true;
            state.machine_on = true;
            state.on_ticks = TICKS_UNTIL_SELECTED + 1;
        }
        sim
    }

    pub fn bus(&self) -> SimBus {
        SimBus {
            state: self.state.clone(),
            last: None,
        }
    }

    pub fn pin(&self) -> SimPin {
        SimPin {
            state: self.state.clone(),
        }
    }

    fn advance(&self, elapsed_ms: u64) -> Option<(String, Vec<u8>)> {
        let mut state = self.state.lock().unwrap();

        if state.powered && state.boot_remaining_ms > 0 {
            state.boot_remaining_ms = state.boot_remaining_ms.saturating_sub(elapsed_ms);
            if state.boot_remaining_ms == 0 {
                state.communicating = true;
            }
        }

        if !state.communicating {
            return None;
        }

        if !state.machine_on {
            state.on_ticks = 0;
            return Some((TOKEN_OFF.to_owned(), blank_frame()));
        }

        state.on_ticks += 1;
        if state.on_ticks <= TICKS_UNTIL_SELECTED {
            Some((TOKEN_IDLE.to_owned(), blank_frame()))
        } else {
            Some((
                TOKEN_COFFEE.to_owned(),
                coffee_frame(state.bean, state.size),
            ))
        }
    }

    /// Status feed the bus reader would produce, one message per period.
    pub fn status_stream(&self, period: Duration) -> impl Stream<Item = (String, Vec<u8>)> {
        let sim = self.clone();
        async_stream::stream! {
            loop {
                tokio::time::sleep(period).await;
                if let Some(message) = sim.advance(period.as_millis() as u64) {
                    yield message;
                }
            }
        }
    }
}

impl Default for SimulatedMachine {
    fn default() -> Self {
        Self::new()
    }
}

fn blank_frame() -> Vec<u8> {
    let mut frame = vec![0u8; 14];
    frame[0] = 0xd5;
    frame[1] = 0x55;
    frame
}

/// Coffee selection screen: bean and size LEDs lit.
fn coffee_frame(bean: u8, size: u8) -> Vec<u8> {
    let mut frame = blank_frame();
    frame[9] = LED_ON;
    frame[8] = LedLevel::from_level(bean).map(u8::from).unwrap_or(0);
    frame[11] = LED_ON;
    frame[10] = LedLevel::from_level(size).map(u8::from).unwrap_or(0);
    frame
}

fn bump(level: u8) -> u8 {
    level % 3 + 1
}

pub struct SimBus {
    state: Arc<Mutex<SimState>>,
    last: Option<Command>,
}

impl CommandBus for SimBus {
    fn write(&mut self, payload: &[u8]) -> Result<(), MachineError> {
        let command = Command::from_payload(payload);
        let edge = command != self.last;
        self.last = command;

        let mut state = self.state.lock().unwrap();
        match command {
            Some(Command::PowerOnWithCleaning) | Some(Command::PowerOnWithoutCleaning) => {
                // The mainboard also catches the command while the display is
                // still booting; a fully dead display hears nothing.
                let listening = state.communicating || state.boot_remaining_ms > 0;
                if listening && !state.machine_on {
                    state.machine_on = true;
                    state.on_ticks = 0;
                }
            }
            Some(Command::PowerOff) => {
                state.machine_on = false;
            }
            Some(Command::PressBean) if edge && state.machine_on => {
                state.bean = bump(state.bean);
            }
            Some(Command::PressSize) if edge && state.machine_on => {
                state.size = bump(state.size);
            }
            Some(Command::PressMilk) if edge && state.machine_on => {
                state.milk = bump(state.milk);
            }
            _ => {}
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), MachineError> {
        // End of a burst; the next identical command is a fresh press.
        self.last = None;
        Ok(())
    }
}

pub struct SimPin {
    state: Arc<Mutex<SimState>>,
}

impl PowerPin for SimPin {
    fn set_level(&mut self, high: bool) -> Result<(), MachineError> {
        let mut state = self.state.lock().unwrap();
        if high {
            if !state.powered {
                state.powered = true;
                state.boot_remaining_ms = DISPLAY_BOOT_MS;
            }
        } else {
            state.powered = false;
            state.communicating = false;
            state.machine_on = false;
            state.boot_remaining_ms = 0;
        }
        Ok(())
    }
}

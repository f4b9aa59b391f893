//! Status display utilities for the monitor CLI.

use atty::Stream;
use colored::*;
use itertools::Itertools;
use lazy_static::lazy_static;
use std::io::Write;
use std::sync::Mutex;

use crate::protocol::{Beverage, MachineStatus, SelectionVariant};

lazy_static! {
    static ref DISPLAY: Mutex<Box<dyn StatusDisplay>> = Mutex::new(make_display());
}

fn make_display() -> Box<dyn StatusDisplay> {
    if atty::is(Stream::Stdout) {
        Box::new(AnsiStatusDisplay::default())
    } else {
        Box::new(PlainStatusDisplay::default())
    }
}

/// One snapshot of machine state, as rendered for the user.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusLine {
    pub power_on: bool,
    pub status: Option<MachineStatus>,
    pub bean: Option<u8>,
    pub size: Option<u8>,
    pub milk: Option<u8>,
}

/// Renders the snapshot according to the current terminal mode.
pub fn display_status(line: &StatusLine) {
    if let Ok(mut display) = DISPLAY.lock() {
        display.display(line);
    }
}

trait StatusDisplay: Send {
    fn display(&mut self, line: &StatusLine);
}

fn level_bar(level: Option<u8>) -> String {
    match level {
        Some(level) => (1..=3).map(|i| if i <= level { '\u{25ae}' } else { '\u{25af}' }).join(""),
        None => "---".to_owned(),
    }
}

fn describe(status: Option<MachineStatus>) -> String {
    let beverage_name = |beverage: Beverage| match beverage {
        Beverage::Coffee => "coffee",
        Beverage::Espresso => "espresso",
        Beverage::Americano => "americano",
        Beverage::Cappuccino => "cappuccino",
        Beverage::LatteMacchiato => "latte macchiato",
    };
    match status {
        None => "waiting for display...".to_owned(),
        Some(MachineStatus::Off) => "off".to_owned(),
        Some(MachineStatus::Idle) => "idle".to_owned(),
        Some(MachineStatus::Selected(beverage, variant)) => {
            let prefix = match variant {
                SelectionVariant::Single => "",
                SelectionVariant::Double => "2x ",
                SelectionVariant::Ground => "ground ",
            };
            format!("{}{} selected", prefix, beverage_name(beverage))
        }
        Some(MachineStatus::HotWaterSelected) => "hot water selected".to_owned(),
        Some(MachineStatus::Unknown) => "busy".to_owned(),
    }
}

#[derive(Default)]
struct PlainStatusDisplay {
    last: Option<StatusLine>,
}

impl StatusDisplay for PlainStatusDisplay {
    fn display(&mut self, line: &StatusLine) {
        // Non-TTY output only logs changes.
        if self.last.as_ref() == Some(line) {
            return;
        }
        self.last = Some(line.clone());
        println!(
            "power={} status={:?} beans={} size={} milk={}",
            if line.power_on { "on" } else { "off" },
            describe(line.status),
            level_bar(line.bean),
            level_bar(line.size),
            level_bar(line.milk),
        );
    }
}

#[derive(Default)]
struct AnsiStatusDisplay {}

impl StatusDisplay for AnsiStatusDisplay {
    fn display(&mut self, line: &StatusLine) {
        let power = if line.power_on {
            "\u{25cf} on ".green()
        } else {
            "\u{25cf} off".red()
        };
        print!(
            "\r{} \u{2502} {:<24} \u{2502} beans {} size {} milk {}   ",
            power,
            describe(line.status),
            level_bar(line.bean),
            level_bar(line.size),
            level_bar(line.milk),
        );
        let _ = std::io::stdout().flush();
    }
}

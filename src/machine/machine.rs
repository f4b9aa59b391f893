use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::control::{
    BeverageSetting, PowerConfig, PowerController, PowerEffect, SettingConfig, SettingEffect,
};
use crate::machine::{Clock, CommandBus, DisplayPowerPin, MachineError, PowerPin};
use crate::prelude::*;
use crate::protocol::{stringify, BeverageSource, DisplayFrame, MachineStatus, SettingKind};
use crate::store::SettingStore;

#[derive(Clone, Debug, Default)]
pub struct MachineConfig {
    pub power: PowerConfig,
    pub settings: Vec<SettingConfig>,
    /// Idle logic level of the display power pin.
    pub pin_initial_level: bool,
    pub pin_invert: bool,
}

/// State change reported to the host.
#[derive(Clone, Debug, PartialEq)]
pub enum HostEvent {
    PowerChanged(bool),
    LevelChanged {
        kind: SettingKind,
        source: BeverageSource,
        level: Option<u8>,
    },
}

/// The glue between the pure controllers and the outside world.
///
/// A single cooperative execution context is assumed: the host calls
/// [`Machine::tick`] periodically and [`Machine::push_status`] whenever the
/// bus reader decodes a telemetry message. Effects are executed in order;
/// sleep effects stall the caller for their duration, which only happens
/// during explicit user-initiated power transitions.
pub struct Machine {
    bus: Box<dyn CommandBus>,
    pin: DisplayPowerPin,
    clock: Box<dyn Clock>,
    store: Box<dyn SettingStore>,
    power: PowerController,
    settings: Vec<BeverageSetting>,
    last_token: Option<String>,
    last_status: Option<MachineStatus>,
    injecting: Arc<AtomicBool>,
}

impl Machine {
    pub fn new(
        config: MachineConfig,
        bus: Box<dyn CommandBus>,
        pin: Box<dyn PowerPin>,
        clock: Box<dyn Clock>,
        store: Box<dyn SettingStore>,
    ) -> Machine {
        let settings = config
            .settings
            .into_iter()
            .map(|setting| {
                let restored = if setting.restore {
                    store.load(&setting.store_key())
                } else {
                    None
                };
                BeverageSetting::with_restored(setting, restored)
            })
            .collect();

        Machine {
            bus,
            pin: DisplayPowerPin::new(pin, config.pin_initial_level, config.pin_invert),
            clock,
            store,
            power: PowerController::new(config.power),
            settings,
            last_token: None,
            last_status: None,
            injecting: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared flag the bus reader can check before decoding: while set, the
    /// traffic on the bus is our own injection, not the display.
    pub fn injecting_flag(&self) -> Arc<AtomicBool> {
        self.injecting.clone()
    }

    pub fn is_injecting(&self) -> bool {
        self.injecting.load(Ordering::Relaxed)
    }

    pub fn power_is_on(&self) -> bool {
        self.power.published_on()
    }

    pub fn status(&self) -> Option<MachineStatus> {
        self.last_status
    }

    /// True once at least one status token has been received.
    pub fn has_state(&self) -> bool {
        self.last_status.is_some()
    }

    /// The raw token of the most recent status message.
    pub fn raw_token(&self) -> Option<&str> {
        self.last_token.as_deref()
    }

    /// Observed level of the first setting of the given kind, if readable.
    pub fn setting_level(&self, kind: SettingKind) -> Option<u8> {
        self.settings
            .iter()
            .find(|s| s.config().kind == kind)
            .and_then(|s| s.observed_level())
    }

    /// Feeds one telemetry message (status token plus raw frame) from the
    /// bus reader.
    pub async fn push_status(
        &mut self,
        token: &str,
        frame: &[u8],
    ) -> Result<Vec<HostEvent>, MachineError> {
        if self.is_injecting() {
            trace_packet!("discarding frame produced by our own injection");
            return Ok(vec![]);
        }

        let now = self.clock.now_ms();
        let status = MachineStatus::parse(token);
        let mut events = vec![];

        // Run the restore policy against the fresh token first: leaving a
        // selection screen resets the observed level, so the idle check must
        // see the level from the screen we are leaving.
        for setting in &mut self.settings {
            setting.apply_restore(&status);
        }

        if let Some(parsed) = DisplayFrame::new(frame) {
            for index in 0..self.settings.len() {
                let effects = self.settings[index].update_status(&status, &parsed, now);
                self.apply_setting_effects(index, effects, &mut events)?;
            }
        } else {
            trace_packet!("runt frame ({} bytes): {}", frame.len(), stringify(frame));
        }

        // Any telemetry at all means the display is alive; only an explicit
        // off token counts as the machine being off.
        let effects = self.power.update_state(!status.is_off(), now);
        self.apply_power_effects(effects, &mut events).await?;

        self.last_token = Some(token.to_owned());
        self.last_status = Some(status);
        Ok(events)
    }

    /// Periodic entry point driving all time-based logic.
    pub async fn tick(&mut self) -> Result<Vec<HostEvent>, MachineError> {
        let now = self.clock.now_ms();
        let mut events = vec![];

        if let Some(status) = self.last_status {
            for setting in &mut self.settings {
                setting.apply_restore(&status);
            }
        }

        let effects = self.power.tick(now);
        self.apply_power_effects(effects, &mut events).await?;
        Ok(events)
    }

    /// Host power request. May stall for the power-off settle delay or, for
    /// power-on against a silent display, merely arm the trip sequence that
    /// subsequent ticks drive.
    pub async fn power(&mut self, on: bool) -> Result<Vec<HostEvent>, MachineError> {
        let mut events = vec![];
        let effects = self.power.write_state(on);
        self.apply_power_effects(effects, &mut events).await?;
        Ok(events)
    }

    /// Host request to drive a beverage setting to `value`; NaN clears it.
    pub fn set_amount(
        &mut self,
        kind: SettingKind,
        source: BeverageSource,
        value: f64,
    ) -> Result<Vec<HostEvent>, MachineError> {
        let mut events = vec![];
        for index in 0..self.settings.len() {
            let config = self.settings[index].config();
            if config.kind == kind && config.source == source {
                let effects = self.settings[index].control(value);
                self.apply_setting_effects(index, effects, &mut events)?;
            }
        }
        Ok(events)
    }

    fn apply_setting_effects(
        &mut self,
        index: usize,
        effects: Vec<SettingEffect>,
        events: &mut Vec<HostEvent>,
    ) -> Result<(), MachineError> {
        for effect in effects {
            match effect {
                SettingEffect::Send(command) => {
                    trace_packet!("W: {}", stringify(command.payload()));
                    self.bus.write(command.payload())?;
                }
                SettingEffect::Flush => self.bus.flush()?,
                SettingEffect::Publish(level) => {
                    let config = self.settings[index].config();
                    events.push(HostEvent::LevelChanged {
                        kind: config.kind,
                        source: config.source,
                        level,
                    });
                }
                SettingEffect::Persist(value) => {
                    let key = self.settings[index].config().store_key();
                    self.store.save(&key, value)?;
                }
            }
        }
        Ok(())
    }

    async fn apply_power_effects(
        &mut self,
        effects: Vec<PowerEffect>,
        events: &mut Vec<HostEvent>,
    ) -> Result<(), MachineError> {
        for effect in effects {
            match effect {
                PowerEffect::Pin(level) => self.pin.drive(level)?,
                PowerEffect::Send(command) => {
                    trace_packet!("W: {}", stringify(command.payload()));
                    self.bus.write(command.payload())?;
                }
                PowerEffect::Flush => self.bus.flush()?,
                PowerEffect::Sleep(duration) => tokio::time::sleep(duration).await,
                PowerEffect::Injecting(on) => self.injecting.store(on, Ordering::Relaxed),
                PowerEffect::Publish(on) => events.push(HostEvent::PowerChanged(on)),
            }
        }
        Ok(())
    }
}

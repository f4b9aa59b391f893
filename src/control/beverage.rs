//! Beverage-amount controller.
//!
//! Owns one logical setting (bean quantity, cup size or milk amount for a
//! given beverage) and converts a desired level into repeated button-press
//! bursts on the display bus, reconciling against the level the telemetry
//! actually shows. There is no acknowledgement; a press is only known to have
//! landed when the next frame shows a different LED pattern.

use crate::prelude::*;
use crate::protocol::{
    BeverageSource, Command, DisplayFrame, LedLevel, MachineStatus, SettingKind,
};

/// Minimum spacing between press bursts for the same setting.
pub const PRESS_DEBOUNCE_MS: u64 = 500;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettingConfig {
    pub kind: SettingKind,
    pub source: BeverageSource,
    /// Each press command is written `repetitions + 1` times.
    pub repetitions: u32,
    pub debounce_ms: u64,
    /// Re-apply the persisted level after every power-on.
    pub restore: bool,
}

impl SettingConfig {
    pub fn new(kind: SettingKind, source: BeverageSource) -> Self {
        SettingConfig {
            kind,
            source,
            repetitions: 5,
            debounce_ms: PRESS_DEBOUNCE_MS,
            restore: false,
        }
    }

    /// Stable identifier under which this setting is persisted.
    pub fn store_key(&self) -> String {
        format!("{}_{}", self.kind.slug(), self.source.slug())
    }
}

/// Side effect requested by the setting.
#[derive(Clone, Debug, PartialEq)]
pub enum SettingEffect {
    Send(Command),
    Flush,
    /// Observed level changed; `None` is unknown.
    Publish(Option<u8>),
    /// Persist the given level as the restore value.
    Persist(f64),
}

pub struct BeverageSetting {
    config: SettingConfig,
    observed: Option<u8>,
    target: Option<u8>,
    restore_level: Option<u8>,
    restore_applied: bool,
    last_press: u64,
}

fn valid_level(value: f64) -> Option<u8> {
    if !value.is_finite() {
        return None;
    }
    let level = value as i64;
    if (1..=3).contains(&level) {
        Some(level as u8)
    } else {
        None
    }
}

impl BeverageSetting {
    pub fn new(config: SettingConfig) -> Self {
        Self::with_restored(config, None)
    }

    /// Creates the setting with a value loaded from persisted storage.
    pub fn with_restored(config: SettingConfig, restored: Option<f64>) -> Self {
        let restore_level = restored.and_then(valid_level);
        if let Some(level) = restore_level {
            info!("{}: restored level {}", config.store_key(), level);
        }
        BeverageSetting {
            config,
            observed: None,
            target: None,
            restore_level,
            restore_applied: false,
            last_press: 0,
        }
    }

    pub fn config(&self) -> &SettingConfig {
        &self.config
    }

    pub fn observed_level(&self) -> Option<u8> {
        self.observed
    }

    pub fn target_level(&self) -> Option<u8> {
        self.target
    }

    pub fn restore_applied(&self) -> bool {
        self.restore_applied
    }

    fn set_observed(&mut self, level: Option<u8>, out: &mut Vec<SettingEffect>) {
        if self.observed != level {
            self.observed = level;
            out.push(SettingEffect::Publish(level));
        }
    }

    /// Feeds one decoded telemetry message (status token plus raw frame).
    ///
    /// Emits press bursts while a target is armed and the machine shows a
    /// different level; hands control back to the physical buttons as soon
    /// as the target is reached.
    pub fn update_status(
        &mut self,
        status: &MachineStatus,
        frame: &DisplayFrame,
        now: u64,
    ) -> Vec<SettingEffect> {
        let mut out = vec![];

        if status.is_off() && self.restore_applied {
            // Re-arm so the restore fires again on the next power-on.
            self.restore_applied = false;
        }

        if status.selects(self.config.source, self.config.kind)
            && frame.setting_enabled(self.config.kind)
        {
            let level = frame.amount(self.config.kind).known().map(LedLevel::level);
            self.set_observed(level, &mut out);

            if let (Some(target), Some(observed)) = (self.target, self.observed) {
                if observed != target && now - self.last_press > self.config.debounce_ms {
                    for _ in 0..=self.config.repetitions {
                        out.push(SettingEffect::Send(self.config.kind.press_command()));
                    }
                    out.push(SettingEffect::Flush);
                    self.last_press = now;
                }
                if observed == target {
                    // Reached: unset so manual button use works again.
                    self.target = None;
                }
            }
            return out;
        }

        // The relevant screen is not showing; the level cannot be read and
        // presses would land on whatever screen is up.
        self.set_observed(None, &mut out);
        out
    }

    /// External request to drive the setting to `value`. NaN clears the
    /// target, as does any value we cannot reach or observe.
    pub fn control(&mut self, value: f64) -> Vec<SettingEffect> {
        let mut out = vec![];
        let requested = valid_level(value);

        // Refuse to target an unobservable state.
        self.target = match (requested, self.observed) {
            (Some(level), Some(_)) => Some(level),
            _ => None,
        };

        if let (Some(level), true) = (requested, self.config.restore) {
            self.restore_level = Some(level);
            out.push(SettingEffect::Persist(level as f64));
        }
        out
    }

    /// Restore-on-idle policy, driven from the periodic tick and from status
    /// transitions: once the machine reports idle after a power-on, arm the
    /// persisted level as the target. Waits indefinitely while the level is
    /// unreadable.
    pub fn apply_restore(&mut self, status: &MachineStatus) {
        if !self.config.restore || self.restore_applied {
            return;
        }
        let Some(restore) = self.restore_level else {
            return;
        };
        if !status.is_idle() {
            return;
        }
        match self.observed {
            Some(observed) if observed != restore => {
                info!(
                    "{}: applying restored level {} (current {})",
                    self.config.store_key(),
                    restore,
                    observed
                );
                self.target = Some(restore);
                self.restore_applied = true;
            }
            Some(_) => {
                // Already there, nothing to press.
                self.restore_applied = true;
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::protocol::LED_ON;

    fn frame_bytes(bean: Option<u8>, size: Option<u8>, milk: Option<u8>) -> [u8; 14] {
        let mut f = [0u8; 14];
        f[0] = 0xd5;
        f[1] = 0x55;
        if let Some(level) = bean {
            f[9] = LED_ON;
            f[8] = LedLevel::from_level(level).unwrap().into();
        }
        if size.is_some() || milk.is_some() {
            f[11] = LED_ON;
        }
        if let Some(level) = size {
            f[10] = LedLevel::from_level(level).unwrap().into();
        }
        if let Some(level) = milk {
            f[13] = LedLevel::from_level(level).unwrap().into();
        }
        f
    }

    fn presses(effects: &[SettingEffect]) -> usize {
        effects
            .iter()
            .filter(|e| matches!(e, SettingEffect::Send(_)))
            .count()
    }

    fn coffee_size() -> BeverageSetting {
        BeverageSetting::new(SettingConfig::new(SettingKind::CupSize, BeverageSource::Coffee))
    }

    #[test]
    fn presses_until_target_reached_then_releases() {
        let mut setting = coffee_size();
        let selected = MachineStatus::parse("Coffee selected");
        let level1 = frame_bytes(Some(2), Some(1), None);
        let level2 = frame_bytes(Some(2), Some(2), None);

        let effects =
            setting.update_status(&selected, &DisplayFrame::new(&level1).unwrap(), 1000);
        assert_eq!(effects, vec![SettingEffect::Publish(Some(1))]);

        setting.control(2.0);
        assert_eq!(setting.target_level(), Some(2));

        // First burst: repetitions + 1 presses of the size button.
        let effects =
            setting.update_status(&selected, &DisplayFrame::new(&level1).unwrap(), 1600);
        assert_eq!(presses(&effects), 6);
        assert!(effects
            .iter()
            .all(|e| !matches!(e, SettingEffect::Send(c) if *c != Command::PressSize)));

        // Debounce: a frame arriving right after must not press again.
        let effects =
            setting.update_status(&selected, &DisplayFrame::new(&level1).unwrap(), 1700);
        assert_eq!(presses(&effects), 0);

        // Still not there after the debounce window: press again.
        let effects =
            setting.update_status(&selected, &DisplayFrame::new(&level1).unwrap(), 2200);
        assert_eq!(presses(&effects), 6);

        // Target reached: publish, no press, target released.
        let effects =
            setting.update_status(&selected, &DisplayFrame::new(&level2).unwrap(), 2800);
        assert_eq!(effects, vec![SettingEffect::Publish(Some(2))]);
        assert_eq!(setting.target_level(), None);
    }

    #[test]
    fn no_presses_while_not_selected() {
        let mut setting = coffee_size();
        let selected = MachineStatus::parse("Coffee selected");
        let idle = MachineStatus::Idle;
        let level1 = frame_bytes(None, Some(1), None);
        let blank = frame_bytes(None, None, None);

        setting.update_status(&selected, &DisplayFrame::new(&level1).unwrap(), 1000);
        setting.control(3.0);
        assert_eq!(setting.target_level(), Some(3));

        // Back on the idle screen: the level is unreadable and no press may
        // be attempted, target or not.
        let effects = setting.update_status(&idle, &DisplayFrame::new(&blank).unwrap(), 2000);
        assert_eq!(effects, vec![SettingEffect::Publish(None)]);
        assert_eq!(setting.observed_level(), None);

        let effects = setting.update_status(&idle, &DisplayFrame::new(&blank).unwrap(), 3000);
        assert_eq!(presses(&effects), 0);

        // A wrong beverage's screen is just as unreadable for this setting.
        let espresso = MachineStatus::parse("Espresso selected");
        let effects =
            setting.update_status(&espresso, &DisplayFrame::new(&level1).unwrap(), 4000);
        assert_eq!(presses(&effects), 0);
    }

    #[test]
    fn enable_led_gates_selection() {
        let mut setting = coffee_size();
        let selected = MachineStatus::parse("Coffee selected");
        // Bean LEDs lit but the size enable LED is dark.
        let bean_only = frame_bytes(Some(1), None, None);

        setting.update_status(&selected, &DisplayFrame::new(&bean_only).unwrap(), 1000);
        assert_eq!(setting.observed_level(), None);
    }

    #[test]
    fn control_refuses_unobservable_targets() {
        let mut setting = coffee_size();
        // Nothing observed yet.
        setting.control(2.0);
        assert_eq!(setting.target_level(), None);

        let selected = MachineStatus::parse("Coffee selected");
        let level1 = frame_bytes(None, Some(1), None);
        setting.update_status(&selected, &DisplayFrame::new(&level1).unwrap(), 1000);

        setting.control(f64::NAN);
        assert_eq!(setting.target_level(), None);
        setting.control(5.0);
        assert_eq!(setting.target_level(), None);
        setting.control(2.0);
        assert_eq!(setting.target_level(), Some(2));
    }

    #[test]
    fn control_persists_when_restore_enabled() {
        let mut config = SettingConfig::new(SettingKind::BeanQuantity, BeverageSource::Any);
        config.restore = true;
        let mut setting = BeverageSetting::new(config);

        assert_eq!(setting.control(3.0), vec![SettingEffect::Persist(3.0)]);
        assert_eq!(setting.control(f64::NAN), vec![]);
    }

    #[test]
    fn restore_waits_for_idle_and_fires_once() {
        let mut config = SettingConfig::new(SettingKind::CupSize, BeverageSource::Coffee);
        config.restore = true;
        let mut setting = BeverageSetting::with_restored(config, Some(3.0));

        let selected = MachineStatus::parse("Coffee selected");
        let idle = MachineStatus::Idle;
        let off = MachineStatus::Off;
        let level1 = frame_bytes(None, Some(1), None);
        let level3 = frame_bytes(None, Some(3), None);
        let blank = frame_bytes(None, None, None);

        // Not idle yet: nothing happens.
        setting.apply_restore(&selected);
        assert!(!setting.restore_applied());

        // Idle but level never observed: keep waiting.
        setting.apply_restore(&idle);
        assert!(!setting.restore_applied());

        // Observe level 1 on the selection screen, then return to idle.
        setting.update_status(&selected, &DisplayFrame::new(&level1).unwrap(), 1000);
        setting.apply_restore(&idle);
        assert!(setting.restore_applied());
        assert_eq!(setting.target_level(), Some(3));

        // The armed target drives presses next time the screen shows.
        let effects =
            setting.update_status(&selected, &DisplayFrame::new(&level1).unwrap(), 2000);
        assert_eq!(presses(&effects), 6);
        setting.update_status(&selected, &DisplayFrame::new(&level3).unwrap(), 3000);
        assert_eq!(setting.target_level(), None);

        // Restore must not fire again while powered.
        setting.apply_restore(&idle);
        assert_eq!(setting.target_level(), None);

        // OFF re-arms it for the next power-on.
        setting.update_status(&off, &DisplayFrame::new(&blank).unwrap(), 4000);
        assert!(!setting.restore_applied());
    }

    #[test]
    fn restore_skips_pressing_when_level_matches() {
        let mut config = SettingConfig::new(SettingKind::CupSize, BeverageSource::Any);
        config.restore = true;
        let mut setting = BeverageSetting::with_restored(config, Some(1.0));

        let selected = MachineStatus::parse("Coffee selected");
        let level1 = frame_bytes(None, Some(1), None);
        setting.update_status(&selected, &DisplayFrame::new(&level1).unwrap(), 1000);

        setting.apply_restore(&MachineStatus::Idle);
        assert!(setting.restore_applied());
        assert_eq!(setting.target_level(), None);
    }
}

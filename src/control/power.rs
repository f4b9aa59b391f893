//! Power state machine.
//!
//! Turning the machine on is not a single command: when the display is off it
//! does not listen to the bus at all, so we briefly cut and restore its power
//! ("trip") to force a reboot, wait out the boot delay, then inject the
//! power-on sequence. Telemetry observed while the display boots is noise and
//! is suppressed by a grace window.

use crate::prelude::*;
use crate::protocol::Command;

/// Maximum cut/restore cycles before the controller gives up.
pub const MAX_TRIP_COUNT: u32 = 5;
/// Cooldown between consecutive power cuts, on top of the trip delay.
pub const TRIP_RETRY_DELAY_MS: u64 = 100;
/// Extra grace beyond the boot delay, longer than the dispatch routine runs.
pub const DISPATCH_GRACE_MARGIN_MS: u64 = 5000;
/// Injection attempts once the display should be booted.
pub const DISPATCH_ATTEMPTS: u32 = 3;
/// Gap between dispatch attempts.
pub const DISPATCH_ATTEMPT_GAP_MS: u64 = 300;
/// How long the injection flag is held after the last attempt.
pub const DISPATCH_SETTLE_MS: u64 = 500;
/// Time the mainboard needs to digest a power-off burst.
pub const POWER_OFF_SETTLE_MS: u64 = 2000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PowerConfig {
    /// Length of the power outage applied to the display.
    pub trip_delay_ms: u64,
    /// Delay after power restore before the display accepts commands.
    pub boot_delay_ms: u64,
    /// Each command is written `repetitions + 1` times.
    pub repetitions: u32,
    /// Whether power-on should start the rinse cycle.
    pub cleaning: bool,
}

impl Default for PowerConfig {
    fn default() -> Self {
        PowerConfig {
            trip_delay_ms: 750,
            boot_delay_ms: 5000,
            repetitions: 5,
            cleaning: true,
        }
    }
}

/// Logical drive level for the display power pin. The shell maps these onto
/// the physical level, honouring configured polarity.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PinLevel {
    /// Power removed.
    Cut,
    /// Normal supply restored.
    Idle,
}

/// Side effect requested by a transition. The caller executes these in
/// order; `Sleep` stalls the tick for its duration, which only ever happens
/// during explicit user-initiated power transitions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PowerEffect {
    Pin(PinLevel),
    Send(Command),
    Flush,
    Sleep(Duration),
    Injecting(bool),
    Publish(bool),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum TripPhase {
    /// No trip sequence in flight.
    Idle,
    /// Trip armed, waiting for the cooldown before the next cut.
    Armed,
    /// Power is cut, waiting to restore it.
    Cutting,
}

/// Drives the machine's power state by injecting protocol commands and, when
/// the display is unresponsive, a bounded power-trip retry sequence.
pub struct PowerController {
    config: PowerConfig,
    published_on: bool,
    trip: TripPhase,
    trip_count: u32,
    trip_start: u64,
    trip_last: u64,
    pending_commands: bool,
    pending_cleaning: bool,
    commands_due_at: Option<u64>,
    grace_until: u64,
}

impl PowerController {
    pub fn new(config: PowerConfig) -> Self {
        PowerController {
            config,
            published_on: false,
            trip: TripPhase::Idle,
            trip_count: 0,
            trip_start: 0,
            trip_last: 0,
            pending_commands: false,
            pending_cleaning: true,
            commands_due_at: None,
            grace_until: 0,
        }
    }

    /// Last power state published to the host.
    pub fn published_on(&self) -> bool {
        self.published_on
    }

    fn push_power_on(&self, cleaning: bool, out: &mut Vec<PowerEffect>) {
        for _ in 0..=self.config.repetitions {
            out.push(PowerEffect::Send(Command::PrePowerOn));
        }
        let command = if cleaning {
            Command::PowerOnWithCleaning
        } else {
            Command::PowerOnWithoutCleaning
        };
        for _ in 0..=self.config.repetitions {
            out.push(PowerEffect::Send(command));
        }
    }

    /// External power request. Power-off and power-on-while-communicating are
    /// handled inline; power-on against a silent display only arms the trip
    /// sequence, which [`PowerController::tick`] then drives.
    pub fn write_state(&mut self, on: bool) -> Vec<PowerEffect> {
        let mut out = vec![];
        if on {
            if self.published_on {
                // Display already talking, no trip needed.
                out.push(PowerEffect::Injecting(true));
                self.push_power_on(self.config.cleaning, &mut out);
                out.push(PowerEffect::Flush);
                out.push(PowerEffect::Injecting(false));
                return out;
            }

            info!("Display not communicating, power tripping first");
            self.trip = TripPhase::Armed;
            self.trip_count = 0;
            self.trip_last = 0; // first cut fires on the next tick
            self.pending_commands = true;
            self.pending_cleaning = self.config.cleaning;
            self.commands_due_at = None;
            // The grace window starts when power is restored, not now.
            self.grace_until = 0;
        } else {
            out.push(PowerEffect::Injecting(true));
            for _ in 0..=self.config.repetitions {
                out.push(PowerEffect::Send(Command::PowerOff));
            }
            out.push(PowerEffect::Flush);
            out.push(PowerEffect::Injecting(false));
            out.push(PowerEffect::Sleep(Duration::from_millis(POWER_OFF_SETTLE_MS)));
        }
        out
    }

    /// Periodic time-based logic: trip scheduling and deferred command
    /// dispatch. `now` is a monotonic millisecond counter.
    pub fn tick(&mut self, now: u64) -> Vec<PowerEffect> {
        let mut out = vec![];

        match self.trip {
            TripPhase::Armed
                if now - self.trip_last > self.config.trip_delay_ms + TRIP_RETRY_DELAY_MS =>
            {
                if self.trip_count >= MAX_TRIP_COUNT {
                    self.trip = TripPhase::Idle;
                    warning!("Power tripping the display failed");
                    return out;
                }
                trace_packet!("power trip {} starting", self.trip_count + 1);
                out.push(PowerEffect::Pin(PinLevel::Cut));
                self.trip = TripPhase::Cutting;
                self.trip_start = now;
            }
            TripPhase::Cutting if now - self.trip_start >= self.config.trip_delay_ms => {
                out.push(PowerEffect::Pin(PinLevel::Idle));
                self.trip = TripPhase::Armed;
                self.trip_last = now;
                self.trip_count += 1;
                trace_packet!("power trip {} complete", self.trip_count);

                if self.trip_count == 1 && self.pending_commands {
                    // The display takes several seconds to boot before it
                    // will accept injected commands.
                    self.commands_due_at = Some(now + self.config.boot_delay_ms);
                    self.grace_until =
                        now + self.config.boot_delay_ms + DISPATCH_GRACE_MARGIN_MS;
                }
            }
            _ => {}
        }

        if self.pending_commands && self.commands_due_at.map_or(false, |at| now >= at) {
            out.push(PowerEffect::Injecting(true));
            for attempt in 0..DISPATCH_ATTEMPTS {
                self.push_power_on(self.pending_cleaning, &mut out);
                out.push(PowerEffect::Flush);
                if attempt + 1 < DISPATCH_ATTEMPTS {
                    out.push(PowerEffect::Sleep(Duration::from_millis(
                        DISPATCH_ATTEMPT_GAP_MS,
                    )));
                }
            }
            // Hold the injection flag a little longer so the tail of the
            // burst cannot be misread as display traffic.
            out.push(PowerEffect::Sleep(Duration::from_millis(DISPATCH_SETTLE_MS)));
            out.push(PowerEffect::Injecting(false));
            self.pending_commands = false;
            self.commands_due_at = None;
            // Job done whether or not the display has reported on yet.
            self.trip = TripPhase::Idle;
            trace_packet!("power-on dispatch complete");
        }

        out
    }

    /// Telemetry-derived power observation.
    pub fn update_state(&mut self, observed: bool, now: u64) -> Vec<PowerEffect> {
        let mut out = vec![];

        // OFF readings while the display boots are noise.
        if !observed && now < self.grace_until {
            return out;
        }

        if observed != self.published_on {
            // Only a completed cut/restore cycle proves the trip worked; an
            // ON reading without one means the display was already awake.
            if observed && self.trip != TripPhase::Idle && self.trip_count > 0 {
                trace_packet!("performed {} power trip(s)", self.trip_count);
                self.trip = TripPhase::Idle;
                self.trip_count = 0;
                // Scheduled dispatch stays pending: the commands still need
                // to reach the mainboard.
            }

            if observed && self.grace_until > 0 {
                // Early ON telemetry is proof of a successful boot.
                self.grace_until = 0;
            }

            self.published_on = observed;
            out.push(PowerEffect::Publish(observed));

            if !observed {
                // A genuine power-off invalidates everything in flight.
                self.trip = TripPhase::Idle;
                self.trip_count = 0;
                self.pending_commands = false;
                self.commands_due_at = None;
            }
        }

        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn send_count(effects: &[PowerEffect], command: Command) -> usize {
        effects
            .iter()
            .filter(|e| **e == PowerEffect::Send(command))
            .count()
    }

    fn pin_levels(effects: &[PowerEffect]) -> Vec<PinLevel> {
        effects
            .iter()
            .filter_map(|e| match e {
                PowerEffect::Pin(level) => Some(*level),
                _ => None,
            })
            .collect()
    }

    fn controller() -> PowerController {
        PowerController::new(PowerConfig::default())
    }

    #[test]
    fn power_on_with_display_talking_injects_without_trip() {
        let mut power = controller();
        assert_eq!(power.update_state(true, 1000), vec![PowerEffect::Publish(true)]);

        let effects = power.write_state(true);
        assert_eq!(effects[0], PowerEffect::Injecting(true));
        assert_eq!(*effects.last().unwrap(), PowerEffect::Injecting(false));
        assert_eq!(send_count(&effects, Command::PrePowerOn), 6);
        assert_eq!(send_count(&effects, Command::PowerOnWithCleaning), 6);
        assert!(pin_levels(&effects).is_empty());
        assert_eq!(power.trip, TripPhase::Idle);

        // Nothing left for the tick to do.
        assert!(power.tick(2000).is_empty());
    }

    #[test]
    fn power_off_bursts_then_settles() {
        let mut power = controller();
        let effects = power.write_state(false);
        assert_eq!(send_count(&effects, Command::PowerOff), 6);
        assert_eq!(
            effects.last(),
            Some(&PowerEffect::Sleep(Duration::from_millis(2000)))
        );
        let flush_at = effects.iter().position(|e| *e == PowerEffect::Flush).unwrap();
        assert!(flush_at > 0 && effects[1..flush_at].iter().all(|e| matches!(e, PowerEffect::Send(_))));
    }

    #[test]
    fn silent_display_trips_then_dispatches() {
        let mut power = controller();
        assert!(power.write_state(true).is_empty());

        // First cut fires immediately (cooldown measured from zero).
        let effects = power.tick(10_000);
        assert_eq!(pin_levels(&effects), vec![PinLevel::Cut]);
        // Not yet time to restore.
        assert!(power.tick(10_500).is_empty());
        let effects = power.tick(10_750);
        assert_eq!(pin_levels(&effects), vec![PinLevel::Idle]);
        assert_eq!(power.commands_due_at, Some(15_750));
        assert_eq!(power.grace_until, 20_750);

        // Dispatch only once the boot delay elapsed.
        let effects = power.tick(15_749);
        assert!(!effects.iter().any(|e| matches!(e, PowerEffect::Send(_))));

        let effects = power.tick(15_750 + 1700); // next cut would also be due
        assert_eq!(send_count(&effects, Command::PrePowerOn), 18);
        assert_eq!(send_count(&effects, Command::PowerOnWithCleaning), 18);
        assert_eq!(
            effects.iter().filter(|e| **e == PowerEffect::Flush).count(),
            3
        );
        assert_eq!(
            effects
                .iter()
                .filter(|e| **e == PowerEffect::Sleep(Duration::from_millis(300)))
                .count(),
            2
        );
        // Injection flag held through the settle sleep.
        let len = effects.len();
        assert_eq!(effects[len - 2], PowerEffect::Sleep(Duration::from_millis(500)));
        assert_eq!(effects[len - 1], PowerEffect::Injecting(false));

        assert_eq!(power.trip, TripPhase::Idle);
        assert!(!power.pending_commands);
        assert!(power.tick(40_000).is_empty());
    }

    #[test]
    fn trips_are_bounded() {
        let mut power = PowerController::new(PowerConfig {
            boot_delay_ms: 60_000, // keep dispatch out of the way
            ..PowerConfig::default()
        });
        assert!(power.write_state(true).is_empty());

        let mut cuts = 0;
        let mut now = 10_000;
        for _ in 0..100 {
            let effects = power.tick(now);
            cuts += pin_levels(&effects)
                .iter()
                .filter(|l| **l == PinLevel::Cut)
                .count();
            now += 500;
        }
        assert_eq!(cuts, MAX_TRIP_COUNT as usize);
        assert_eq!(power.trip, TripPhase::Idle);
        assert_eq!(power.trip_count, MAX_TRIP_COUNT);
    }

    #[test]
    fn on_after_completed_trip_cancels_trips_keeps_dispatch() {
        let mut power = controller();
        power.write_state(true);
        power.tick(10_000);
        power.tick(10_750); // first trip complete, dispatch scheduled

        let effects = power.update_state(true, 11_000);
        assert_eq!(effects, vec![PowerEffect::Publish(true)]);
        assert_eq!(power.trip, TripPhase::Idle);
        assert_eq!(power.trip_count, 0);
        assert!(power.pending_commands);
        // Early ON telemetry ends the grace window.
        assert_eq!(power.grace_until, 0);

        // Scheduled dispatch still fires.
        let effects = power.tick(15_750);
        assert!(send_count(&effects, Command::PrePowerOn) > 0);
    }

    #[test]
    fn on_before_any_completed_trip_keeps_trip_bookkeeping() {
        let mut power = controller();
        power.write_state(true);

        let effects = power.update_state(true, 9_000);
        assert_eq!(effects, vec![PowerEffect::Publish(true)]);
        // Display was already awake; the armed trip must not be cancelled by
        // a reading that predates any cut.
        assert_eq!(power.trip, TripPhase::Armed);
    }

    #[test]
    fn off_during_grace_is_discarded() {
        let mut power = controller();
        power.write_state(true);
        power.tick(10_000);
        power.tick(10_750);
        assert_eq!(power.grace_until, 20_750);

        // OFF readings inside the window neither publish nor clear the
        // scheduled dispatch.
        assert!(power.update_state(false, 12_000).is_empty());
        assert!(!power.published_on());
        assert!(power.pending_commands);
        assert_eq!(power.commands_due_at, Some(15_750));
    }

    #[test]
    fn off_after_grace_clears_everything() {
        let mut power = controller();
        power.write_state(true);
        power.tick(10_000);
        power.tick(10_750);
        power.update_state(true, 11_000);

        let effects = power.update_state(false, 11_500);
        assert_eq!(effects, vec![PowerEffect::Publish(false)]);
        assert!(!power.pending_commands);
        assert_eq!(power.commands_due_at, None);
        assert!(power.tick(15_750).is_empty());
    }

    #[test]
    fn dispatch_uses_cleaning_captured_at_request_time() {
        let mut power = PowerController::new(PowerConfig {
            cleaning: false,
            ..PowerConfig::default()
        });
        power.write_state(true);
        power.tick(10_000);
        power.tick(10_750);
        let effects = power.tick(15_750);
        assert_eq!(send_count(&effects, Command::PowerOnWithoutCleaning), 18);
        assert_eq!(send_count(&effects, Command::PowerOnWithCleaning), 0);
    }
}

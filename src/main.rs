use clap::{arg, command};
use tokio_stream::StreamExt;

use crema::control::SettingConfig;
use crema::display::{display_status, StatusLine};
use crema::machine::{HostEvent, Machine, MachineConfig, MonotonicClock, SimulatedMachine};
use crema::prelude::*;
use crema::protocol::{BeverageSource, SettingKind};
use crema::store::JsonFileStore;

const STATUS_PERIOD: Duration = Duration::from_millis(250);
const TICK_PERIOD: Duration = Duration::from_millis(100);

fn build_machine(sim: &SimulatedMachine) -> Result<Machine, Box<dyn std::error::Error>> {
    let store = JsonFileStore::open(std::env::temp_dir().join("crema-settings.json"))?;
    let setting = |kind| {
        let mut config = SettingConfig::new(kind, BeverageSource::Any);
        config.restore = true;
        config
    };
    Ok(Machine::new(
        MachineConfig {
            settings: vec![
                setting(SettingKind::BeanQuantity),
                setting(SettingKind::CupSize),
                setting(SettingKind::MilkAmount),
            ],
            pin_initial_level: true,
            ..MachineConfig::default()
        },
        Box::new(sim.bus()),
        Box::new(sim.pin()),
        Box::new(MonotonicClock::new()),
        Box::new(store),
    ))
}

fn snapshot(machine: &Machine) -> StatusLine {
    StatusLine {
        power_on: machine.power_is_on(),
        status: machine.status(),
        bean: machine.setting_level(SettingKind::BeanQuantity),
        size: machine.setting_level(SettingKind::CupSize),
        milk: machine.setting_level(SettingKind::MilkAmount),
    }
}

/// Runs the cooperative loop until `on_event` reports completion or the
/// timeout elapses.
async fn drive(
    machine: &mut Machine,
    sim: &SimulatedMachine,
    timeout: Duration,
    mut on_event: impl FnMut(HostEvent) -> bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    let stream = sim.status_stream(STATUS_PERIOD);
    futures::pin_mut!(stream);
    let mut ticker = tokio::time::interval(TICK_PERIOD);
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        let events = tokio::select! {
            _ = tokio::time::sleep_until(deadline) => return Ok(false),
            Some((token, frame)) = stream.next() => machine.push_status(&token, &frame).await?,
            _ = ticker.tick() => machine.tick().await?,
        };
        for event in events {
            if on_event(event) {
                return Ok(true);
            }
        }
    }
}

async fn monitor(sim: SimulatedMachine) -> Result<(), Box<dyn std::error::Error>> {
    let mut machine = build_machine(&sim)?;
    let stream = sim.status_stream(STATUS_PERIOD);
    futures::pin_mut!(stream);
    let mut ticker = tokio::time::interval(TICK_PERIOD);

    loop {
        tokio::select! {
            Some((token, frame)) = stream.next() => { machine.push_status(&token, &frame).await?; }
            _ = ticker.tick() => { machine.tick().await?; }
        };
        display_status(&snapshot(&machine));
    }
}

async fn power(sim: SimulatedMachine, on: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut machine = build_machine(&sim)?;

    // Learn the current state first; a display that is already communicating
    // needs no trip. A silent one stays quiet and the window just elapses.
    drive(&mut machine, &sim, Duration::from_secs(2), |event| {
        matches!(event, HostEvent::PowerChanged(_))
    })
    .await?;
    if machine.power_is_on() == on {
        info!("Power is already {}", if on { "on" } else { "off" });
        return Ok(());
    }

    machine.power(on).await?;

    let done = drive(&mut machine, &sim, Duration::from_secs(60), |event| {
        event == HostEvent::PowerChanged(on)
    })
    .await?;

    if done {
        info!("Power is now {}", if on { "on" } else { "off" });
    } else {
        warning!("Machine did not report {} in time", if on { "on" } else { "off" });
    }
    Ok(())
}

fn parse_kind(value: &str) -> Option<SettingKind> {
    match value {
        "bean" | "beans" => Some(SettingKind::BeanQuantity),
        "size" => Some(SettingKind::CupSize),
        "milk" => Some(SettingKind::MilkAmount),
        _ => None,
    }
}

async fn set(
    sim: SimulatedMachine,
    kind: SettingKind,
    value: f64,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut machine = build_machine(&sim)?;
    let target = value as u8;
    let stream = sim.status_stream(STATUS_PERIOD);
    futures::pin_mut!(stream);
    let mut ticker = tokio::time::interval(TICK_PERIOD);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    let mut requested = false;

    loop {
        let events = tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {
                warning!("Setting did not reach {} in time", target);
                return Ok(());
            }
            Some((token, frame)) = stream.next() => machine.push_status(&token, &frame).await?,
            _ = ticker.tick() => machine.tick().await?,
        };
        for event in events {
            if let HostEvent::LevelChanged { kind: changed, level: Some(level), .. } = event {
                if changed == kind && requested && level == target {
                    info!("Level {} reached", target);
                    return Ok(());
                }
            }
        }
        // The controller refuses targets it cannot verify, so wait until the
        // level is observable before asking for it.
        if !requested && machine.setting_level(kind).is_some() {
            machine.set_amount(kind, BeverageSource::Any, value)?;
            requested = true;
            if machine.setting_level(kind) == Some(target) {
                info!("Level {} already set", target);
                return Ok(());
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();

    let trace = arg!(--trace).help("Trace all bus traffic");
    let matches = command!()
        .subcommand(
            command!("monitor")
                .about("Monitor the simulated machine")
                .arg(trace.clone()),
        )
        .subcommand(
            command!("power")
                .about("Power the machine on (tripping a silent display) or off")
                .arg(arg!(--off).help("Turn off instead of on"))
                .arg(trace.clone()),
        )
        .subcommand(
            command!("set")
                .about("Drive a beverage setting to a level")
                .arg(arg!(--kind <kind>).help("bean, size or milk"))
                .arg(arg!(--value <value>).help("Level 1-3"))
                .arg(trace.clone()),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("monitor", cmd)) => {
            if cmd.get_flag("trace") {
                crema::logging::enable_tracing();
            }
            monitor(SimulatedMachine::new_awake()).await?;
        }
        Some(("power", cmd)) => {
            if cmd.get_flag("trace") {
                crema::logging::enable_tracing();
            }
            let on = !cmd.get_flag("off");
            // Powering on starts from a silent display to exercise the trip.
            let sim = if on {
                SimulatedMachine::new()
            } else {
                SimulatedMachine::new_awake()
            };
            power(sim, on).await?;
        }
        Some(("set", cmd)) => {
            if cmd.get_flag("trace") {
                crema::logging::enable_tracing();
            }
            let kind = cmd
                .get_one::<String>("kind")
                .and_then(|k| parse_kind(k))
                .ok_or("--kind must be bean, size or milk")?;
            let value: f64 = cmd
                .get_one::<String>("value")
                .ok_or("--value is required")?
                .parse()?;
            set(SimulatedMachine::new_awake(), kind, value).await?;
        }
        _ => {}
    }

    Ok(())
}

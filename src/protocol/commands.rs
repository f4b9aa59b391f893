//! Fixed command payloads injected onto the display bus.
//!
//! Each payload is a verbatim copy of a message the physical display sends to
//! the mainboard. We replay them as-is; the framing is opaque to us and there
//! is no acknowledgement, so reliability comes from repetition alone.

/// Sent once before any power-on message, mirroring the wake-up chatter the
/// display produces when its power button is pressed.
pub const COMMAND_PRE_POWER_ON: [u8; 12] = [
    0xd5, 0x55, 0x0a, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x19, 0x73,
];

/// Power on, starting the initial rinse cycle.
pub const COMMAND_POWER_WITH_CLEANING: [u8; 12] = [
    0xd5, 0x55, 0x0a, 0x02, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x34, 0x2e,
];

/// Power on without the rinse cycle.
pub const COMMAND_POWER_WITHOUT_CLEANING: [u8; 12] = [
    0xd5, 0x55, 0x0a, 0x02, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x51, 0xe9,
];

/// Power off.
pub const COMMAND_POWER_OFF: [u8; 12] = [
    0xd5, 0x55, 0x0a, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x9d, 0x62,
];

/// One press of the bean-quantity button.
pub const COMMAND_PRESS_BEAN: [u8; 12] = [
    0xd5, 0x55, 0x0a, 0x05, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00, 0xb2, 0x47,
];

/// One press of the cup-size button.
pub const COMMAND_PRESS_SIZE: [u8; 12] = [
    0xd5, 0x55, 0x0a, 0x05, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0xe6, 0x0c,
];

/// One press of the milk-amount button.
pub const COMMAND_PRESS_MILK: [u8; 12] = [
    0xd5, 0x55, 0x0a, 0x05, 0x00, 0x20, 0x00, 0x00, 0x00, 0x00, 0x7f, 0x95,
];

/// A button press or power command we can impersonate.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Command {
    PrePowerOn,
    PowerOnWithCleaning,
    PowerOnWithoutCleaning,
    PowerOff,
    PressBean,
    PressSize,
    PressMilk,
}

impl Command {
    pub fn payload(self) -> &'static [u8] {
        match self {
            Command::PrePowerOn => &COMMAND_PRE_POWER_ON,
            Command::PowerOnWithCleaning => &COMMAND_POWER_WITH_CLEANING,
            Command::PowerOnWithoutCleaning => &COMMAND_POWER_WITHOUT_CLEANING,
            Command::PowerOff => &COMMAND_POWER_OFF,
            Command::PressBean => &COMMAND_PRESS_BEAN,
            Command::PressSize => &COMMAND_PRESS_SIZE,
            Command::PressMilk => &COMMAND_PRESS_MILK,
        }
    }

    /// Recovers the command from a raw payload, used by the simulator to
    /// react to injected traffic.
    pub fn from_payload(bytes: &[u8]) -> Option<Command> {
        const ALL: [Command; 7] = [
            Command::PrePowerOn,
            Command::PowerOnWithCleaning,
            Command::PowerOnWithoutCleaning,
            Command::PowerOff,
            Command::PressBean,
            Command::PressSize,
            Command::PressMilk,
        ];
        ALL.into_iter().find(|c| c.payload() == bytes)
    }
}

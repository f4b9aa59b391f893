use num_enum::{IntoPrimitive, TryFromPrimitive};

use super::{Command, MachineEnum};

/// Shortest telemetry frame that still carries the setting LED fields.
pub const MIN_FRAME_LEN: usize = 14;

/// Byte value of a lit setting-enable LED.
pub const LED_ON: u8 = 0x07;

/// LED pattern of the amount indicator, one sentinel per discrete level.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, IntoPrimitive, TryFromPrimitive, Eq, Hash)]
pub enum LedLevel {
    One = 0x38,
    Two = 0x78,
    Three = 0xf8,
}

impl LedLevel {
    /// The logical level shown on the display, 1 through 3.
    pub fn level(self) -> u8 {
        match self {
            LedLevel::One => 1,
            LedLevel::Two => 2,
            LedLevel::Three => 3,
        }
    }

    pub fn from_level(level: u8) -> Option<LedLevel> {
        match level {
            1 => Some(LedLevel::One),
            2 => Some(LedLevel::Two),
            3 => Some(LedLevel::Three),
            _ => None,
        }
    }
}

/// Which physical setting button a controller emulates.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SettingKind {
    BeanQuantity,
    CupSize,
    MilkAmount,
}

impl SettingKind {
    /// Offset of the byte that must equal [`LED_ON`] for the setting to be
    /// shown on the current screen.
    pub fn enable_offset(self) -> usize {
        match self {
            SettingKind::BeanQuantity => 9,
            _ => 11,
        }
    }

    /// Offset of the amount-indicator byte.
    pub fn amount_offset(self) -> usize {
        match self {
            SettingKind::BeanQuantity => 8,
            SettingKind::CupSize => 10,
            SettingKind::MilkAmount => 13,
        }
    }

    pub fn press_command(self) -> Command {
        match self {
            SettingKind::BeanQuantity => Command::PressBean,
            SettingKind::CupSize => Command::PressSize,
            SettingKind::MilkAmount => Command::PressMilk,
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            SettingKind::BeanQuantity => "bean_quantity",
            SettingKind::CupSize => "cup_size",
            SettingKind::MilkAmount => "milk_amount",
        }
    }
}

/// A raw telemetry frame from the display bus.
///
/// Only the setting LED fields at offsets 8 through 13 are interpreted; the
/// rest of the mainboard protocol is out of scope and passes through opaque.
#[derive(Copy, Clone, Debug)]
pub struct DisplayFrame<'a> {
    bytes: &'a [u8],
}

impl<'a> DisplayFrame<'a> {
    /// Wraps a raw frame, rejecting ones too short to carry the LED fields.
    pub fn new(bytes: &'a [u8]) -> Option<DisplayFrame<'a>> {
        if bytes.len() >= MIN_FRAME_LEN {
            Some(DisplayFrame { bytes })
        } else {
            None
        }
    }

    /// True if the given setting is shown (its enable LED is lit).
    pub fn setting_enabled(&self, kind: SettingKind) -> bool {
        self.bytes[kind.enable_offset()] == LED_ON
    }

    /// The amount indicator for the given setting.
    pub fn amount(&self, kind: SettingKind) -> MachineEnum<LedLevel> {
        MachineEnum::decode(self.bytes[kind.amount_offset()])
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::*;

    #[rstest]
    #[case(SettingKind::BeanQuantity, 9, 8)]
    #[case(SettingKind::CupSize, 11, 10)]
    #[case(SettingKind::MilkAmount, 11, 13)]
    fn offsets(#[case] kind: SettingKind, #[case] enable: usize, #[case] amount: usize) {
        assert_eq!(kind.enable_offset(), enable);
        assert_eq!(kind.amount_offset(), amount);
    }

    #[test]
    fn decode_amounts() {
        let frame = crate::protocol::test::FRAME_ALL_SELECTED;
        let frame = DisplayFrame::new(&frame).expect("frame long enough");
        assert!(frame.setting_enabled(SettingKind::BeanQuantity));
        assert!(frame.setting_enabled(SettingKind::CupSize));
        assert_eq!(frame.amount(SettingKind::BeanQuantity).known(), Some(LedLevel::Two));
        assert_eq!(frame.amount(SettingKind::CupSize).known(), Some(LedLevel::One));
        assert_eq!(frame.amount(SettingKind::MilkAmount).known(), Some(LedLevel::Three));
    }

    #[test]
    fn disabled_leds_hide_settings() {
        let frame = crate::protocol::test::FRAME_NOTHING_SELECTED;
        let frame = DisplayFrame::new(&frame).expect("frame long enough");
        assert!(!frame.setting_enabled(SettingKind::BeanQuantity));
        assert!(!frame.setting_enabled(SettingKind::CupSize));
        assert!(!frame.setting_enabled(SettingKind::MilkAmount));
    }

    #[test]
    fn unknown_amount_byte_degrades() {
        let frame = crate::protocol::test::FRAME_UNKNOWN_AMOUNT;
        let frame = DisplayFrame::new(&frame).expect("frame long enough");
        assert!(frame.setting_enabled(SettingKind::BeanQuantity));
        assert_eq!(frame.amount(SettingKind::BeanQuantity).known(), None);
    }

    #[test]
    fn short_frames_are_rejected() {
        assert!(DisplayFrame::new(&[0u8; 13]).is_none());
        assert!(DisplayFrame::new(&[0u8; 14]).is_some());
    }

    #[rstest]
    #[case(0x38, Some(1))]
    #[case(0x78, Some(2))]
    #[case(0xf8, Some(3))]
    #[case(0x00, None)]
    #[case(0x42, None)]
    fn led_sentinels(#[case] byte: u8, #[case] level: Option<u8>) {
        let decoded: MachineEnum<LedLevel> = MachineEnum::decode(byte);
        assert_eq!(decoded.known().map(LedLevel::level), level);
        if let Some(level) = level {
            assert_eq!(LedLevel::from_level(level).map(u8::from), Some(byte));
        }
    }
}

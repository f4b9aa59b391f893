//! Coarse machine status tokens published by the display decoder.
//!
//! Tokens arrive as plain strings from the status source. We only interpret
//! the subset needed for power and beverage-amount semantics; everything else
//! parses to [`MachineStatus::Unknown`] and matches nothing.

use super::SettingKind;

pub const TOKEN_OFF: &str = "Off";
pub const TOKEN_IDLE: &str = "Idle";
pub const TOKEN_COFFEE: &str = "Coffee selected";
pub const TOKEN_COFFEE_2X: &str = "Coffee 2x selected";
pub const TOKEN_GROUND_COFFEE: &str = "Ground Coffee selected";
pub const TOKEN_ESPRESSO: &str = "Espresso selected";
pub const TOKEN_ESPRESSO_2X: &str = "Espresso 2x selected";
pub const TOKEN_GROUND_ESPRESSO: &str = "Ground Espresso selected";
pub const TOKEN_AMERICANO: &str = "Americano selected";
pub const TOKEN_AMERICANO_2X: &str = "Americano 2x selected";
pub const TOKEN_GROUND_AMERICANO: &str = "Ground Americano selected";
pub const TOKEN_CAPPUCCINO: &str = "Cappuccino selected";
pub const TOKEN_GROUND_CAPPUCCINO: &str = "Ground Cappuccino selected";
pub const TOKEN_LATTE: &str = "Latte Macchiato selected";
pub const TOKEN_GROUND_LATTE: &str = "Ground Latte Macchiato selected";
pub const TOKEN_HOT_WATER: &str = "Hot Water selected";

/// A beverage the machine can show on its selection screen.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Beverage {
    Coffee,
    Espresso,
    Americano,
    Cappuccino,
    LatteMacchiato,
}

impl Beverage {
    /// Milk beverages are the only ones with a milk-amount screen.
    pub fn has_milk(self) -> bool {
        matches!(self, Beverage::Cappuccino | Beverage::LatteMacchiato)
    }
}

/// How the beverage was selected.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SelectionVariant {
    Single,
    Double,
    /// Pre-ground powder instead of beans; the bean-quantity screen does not
    /// exist in this mode.
    Ground,
}

/// Which beverage selection a setting reacts to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BeverageSource {
    Coffee,
    Espresso,
    Americano,
    Cappuccino,
    LatteMacchiato,
    HotWater,
    Any,
}

impl BeverageSource {
    fn covers(self, beverage: Beverage) -> bool {
        match self {
            BeverageSource::Any => true,
            BeverageSource::Coffee => beverage == Beverage::Coffee,
            BeverageSource::Espresso => beverage == Beverage::Espresso,
            BeverageSource::Americano => beverage == Beverage::Americano,
            BeverageSource::Cappuccino => beverage == Beverage::Cappuccino,
            BeverageSource::LatteMacchiato => beverage == Beverage::LatteMacchiato,
            BeverageSource::HotWater => false,
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            BeverageSource::Coffee => "coffee",
            BeverageSource::Espresso => "espresso",
            BeverageSource::Americano => "americano",
            BeverageSource::Cappuccino => "cappuccino",
            BeverageSource::LatteMacchiato => "latte_macchiato",
            BeverageSource::HotWater => "hot_water",
            BeverageSource::Any => "any",
        }
    }
}

/// Parsed status token.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MachineStatus {
    Off,
    Idle,
    Selected(Beverage, SelectionVariant),
    HotWaterSelected,
    Unknown,
}

impl MachineStatus {
    pub fn parse(token: &str) -> MachineStatus {
        use Beverage::*;
        use SelectionVariant::*;
        match token {
            TOKEN_OFF => MachineStatus::Off,
            TOKEN_IDLE => MachineStatus::Idle,
            TOKEN_COFFEE => MachineStatus::Selected(Coffee, Single),
            TOKEN_COFFEE_2X => MachineStatus::Selected(Coffee, Double),
            TOKEN_GROUND_COFFEE => MachineStatus::Selected(Coffee, Ground),
            TOKEN_ESPRESSO => MachineStatus::Selected(Espresso, Single),
            TOKEN_ESPRESSO_2X => MachineStatus::Selected(Espresso, Double),
            TOKEN_GROUND_ESPRESSO => MachineStatus::Selected(Espresso, Ground),
            TOKEN_AMERICANO => MachineStatus::Selected(Americano, Single),
            TOKEN_AMERICANO_2X => MachineStatus::Selected(Americano, Double),
            TOKEN_GROUND_AMERICANO => MachineStatus::Selected(Americano, Ground),
            TOKEN_CAPPUCCINO => MachineStatus::Selected(Cappuccino, Single),
            TOKEN_GROUND_CAPPUCCINO => MachineStatus::Selected(Cappuccino, Ground),
            TOKEN_LATTE => MachineStatus::Selected(LatteMacchiato, Single),
            TOKEN_GROUND_LATTE => MachineStatus::Selected(LatteMacchiato, Ground),
            TOKEN_HOT_WATER => MachineStatus::HotWaterSelected,
            _ => MachineStatus::Unknown,
        }
    }

    pub fn is_off(&self) -> bool {
        *self == MachineStatus::Off
    }

    pub fn is_idle(&self) -> bool {
        *self == MachineStatus::Idle
    }

    /// True if a setting with the given source and kind is the one currently
    /// shown on screen.
    ///
    /// Milk settings never react to black-coffee screens, bean settings do
    /// not exist for pre-ground variants, and hot water only carries a cup
    /// size.
    pub fn selects(&self, source: BeverageSource, kind: SettingKind) -> bool {
        match *self {
            MachineStatus::Selected(beverage, variant) => {
                source.covers(beverage)
                    && !(kind == SettingKind::BeanQuantity && variant == SelectionVariant::Ground)
                    && !(kind == SettingKind::MilkAmount && !beverage.has_milk())
            }
            MachineStatus::HotWaterSelected => {
                kind == SettingKind::CupSize
                    && matches!(source, BeverageSource::HotWater | BeverageSource::Any)
            }
            _ => false,
        }
    }
}

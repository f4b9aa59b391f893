use std::fmt::Debug;

/// Wraps a wire-valued enumeration that may carry unknown bytes.
///
/// The display firmware is free to send values we have never seen; those are
/// preserved as [`MachineEnum::Unknown`] rather than rejected, so decoding
/// never fails hard.
#[derive(Copy, Clone, PartialEq, Eq)]
pub enum MachineEnum<T>
where
    T: TryFrom<u8> + Copy,
{
    Value(T),
    Unknown(u8),
}

impl<T> MachineEnum<T>
where
    T: TryFrom<u8> + Copy,
{
    pub fn decode(value: u8) -> Self {
        match T::try_from(value) {
            Ok(value) => MachineEnum::Value(value),
            Err(_) => MachineEnum::Unknown(value),
        }
    }

    /// The decoded value, if this byte mapped to a known enumerator.
    pub fn known(self) -> Option<T> {
        match self {
            MachineEnum::Value(v) => Some(v),
            MachineEnum::Unknown(_) => None,
        }
    }
}

impl<T> From<T> for MachineEnum<T>
where
    T: TryFrom<u8> + Copy,
{
    fn from(t: T) -> Self {
        MachineEnum::Value(t)
    }
}

impl<T: Debug> Debug for MachineEnum<T>
where
    T: TryFrom<u8> + Copy,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(t) => t.fmt(f),
            Self::Unknown(v) => write!(f, "Unknown({:02x})", v),
        }
    }
}

impl<T: PartialEq> PartialEq<T> for MachineEnum<T>
where
    T: TryFrom<u8> + Copy,
{
    fn eq(&self, other: &T) -> bool {
        match self {
            Self::Value(t) => t.eq(other),
            Self::Unknown(_) => false,
        }
    }
}

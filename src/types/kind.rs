//! Supported device protocol families.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};
use uuid::Uuid;

/// The byte protocol a device speaks.
///
/// # Examples
///
/// ```
/// use std::str::FromStr;
/// use play_lights::DeviceKind;
///
/// assert_eq!(DeviceKind::from_str("milight").unwrap(), DeviceKind::Milight);
/// assert_eq!(DeviceKind::Playbulb.off_value(), "00000000");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, EnumString, Display,
)]
#[strum(ascii_case_insensitive)]
pub enum DeviceKind {
    /// Single 4-byte write to a fixed characteristic
    Playbulb,
    /// Checksummed, XOR-obfuscated 12-byte commands
    Milight,
}

impl DeviceKind {
    const PLAYBULB_COLOR: Uuid = Uuid::from_u128(0x0000fffc_0000_1000_8000_00805f9b34fb);
    const MILIGHT_COMMAND: Uuid = Uuid::from_u128(0x00001001_0000_1000_8000_00805f9b34fb);

    /// All supported kinds, in declaration order.
    pub fn all() -> impl Iterator<Item = DeviceKind> {
        DeviceKind::iter()
    }

    /// The on-wire value that means "off" for this kind.
    pub fn off_value(&self) -> &'static str {
        match self {
            DeviceKind::Playbulb => "00000000",
            DeviceKind::Milight => "0",
        }
    }

    /// The on-wire value that means "leave untouched" for this kind.
    pub fn skip_value(&self) -> &'static str {
        "-1"
    }

    /// The GATT characteristic every write for this kind goes to.
    pub fn characteristic(&self) -> Uuid {
        match self {
            DeviceKind::Playbulb => Self::PLAYBULB_COLOR,
            DeviceKind::Milight => Self::MILIGHT_COMMAND,
        }
    }
}

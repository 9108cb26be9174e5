//! Conversion of on-wire color values into the bytes each device kind expects.
//!
//! Everything here is pure. A Playbulb takes its 8 hex digit color as-is; a
//! Milight needs one or two 12-byte commands built by [`encode_command`].

use std::fmt::Write as _;

use uuid::Uuid;

use crate::types::{ColorToken, DeviceKind};

/// Added element-wise to the XOR-ed Milight plaintext.
pub const MILIGHT_OFFSETS: [u8; 11] = [0, 16, 24, 1, 129, 55, 169, 87, 35, 70, 23];

const CHECKSUM_BIAS: u8 = 131;

/// A single GATT write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub characteristic: Uuid,
    pub value: Vec<u8>,
}

/// Opcode tuple of one Milight command.
///
/// The six values map onto the plaintext as
/// `[value1, value2, id1, id2, value5, value3, value4, value6, 0, 0, 0]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MilightCommand {
    pub value1: u8,
    pub value2: u8,
    pub value3: u8,
    pub value4: u8,
    pub value5: u8,
    pub value6: u8,
}

impl MilightCommand {
    fn new(value1: u8, value2: u8, value3: u8) -> Self {
        MilightCommand {
            value1,
            value2,
            value3,
            value4: 0,
            value5: 2,
            value6: 0,
        }
    }

    pub fn turn_on() -> Self {
        Self::new(32, 161, 1)
    }

    pub fn turn_off() -> Self {
        Self::new(32, 161, 2)
    }

    /// Set the color wheel value. Only valid once the bulb is on.
    pub fn set_color(color: u8) -> Self {
        MilightCommand {
            value4: color,
            value5: 2,
            value6: 50,
            ..Self::new(45, 161, 4)
        }
    }

    /// Switch to the default white intensity. Only valid once the bulb is on.
    pub fn dim_on() -> Self {
        MilightCommand {
            value4: 200,
            value5: 4,
            value6: 50,
            ..Self::new(20, 161, 5)
        }
    }

    pub fn plaintext(&self, id1: u8, id2: u8) -> [u8; 11] {
        [
            self.value1,
            self.value2,
            id1,
            id2,
            self.value5,
            self.value3,
            self.value4,
            self.value6,
            0,
            0,
            0,
        ]
    }

    /// Encode this command for the bulb paired as `id1`/`id2`.
    ///
    /// # Examples
    ///
    /// ```
    /// use play_lights::codec::MilightCommand;
    ///
    /// assert_eq!(
    ///     MilightCommand::turn_on().encode(10, 20),
    ///     "20914235a358c97743663745"
    /// );
    /// ```
    pub fn encode(&self, id1: u8, id2: u8) -> String {
        encode_command(&self.plaintext(id1, id2))
    }
}

/// Checksum and obfuscate a Milight plaintext, rendered as 24 lowercase hex digits.
pub fn encode_command(plaintext: &[u8; 11]) -> String {
    let key = plaintext[0];
    let sum = plaintext
        .iter()
        .fold(0u8, |acc, byte| acc.wrapping_add(*byte));
    let checksum = ((key ^ sum) as u16 + CHECKSUM_BIAS as u16) as u8;

    let mut bytes: Vec<u8> = plaintext
        .iter()
        .zip(MILIGHT_OFFSETS)
        .map(|(byte, offset)| (byte ^ key).wrapping_add(offset))
        .collect();
    bytes[0] = key;
    bytes.push(checksum);

    to_hex(&bytes)
}

/// Whether `value` is something a device of `kind` can be asked to show.
///
/// The skip value is always acceptable. Playbulbs take 1 or 8 characters
/// (the length rule the convergence step relies on); Milights take up to 3.
pub fn is_well_formed(kind: DeviceKind, value: &str) -> bool {
    if value == kind.skip_value() {
        return true;
    }
    match kind {
        DeviceKind::Playbulb => matches!(value.len(), 1 | 8),
        DeviceKind::Milight => value.len() <= 3,
    }
}

/// The writes that bring a Playbulb to `color`.
pub fn playbulb_packets(color: &str) -> Option<Vec<Packet>> {
    let value = from_hex(color).filter(|bytes| bytes.len() == 4)?;
    Some(vec![Packet {
        characteristic: DeviceKind::Playbulb.characteristic(),
        value,
    }])
}

/// The writes that bring a Milight to `color`.
///
/// Off is a single command; on and explicit colors first switch the bulb on.
pub fn milight_packets(color: &str, id1: u8, id2: u8) -> Option<Vec<Packet>> {
    let commands = match color {
        ColorToken::OFF => vec![MilightCommand::turn_off()],
        ColorToken::ON => vec![MilightCommand::turn_on(), MilightCommand::dim_on()],
        other => {
            let wheel = other.parse::<u8>().ok()?;
            vec![MilightCommand::turn_on(), MilightCommand::set_color(wheel)]
        }
    };

    commands
        .iter()
        .map(|command| {
            from_hex(&command.encode(id1, id2)).map(|value| Packet {
                characteristic: DeviceKind::Milight.characteristic(),
                value,
            })
        })
        .collect()
}

pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

pub fn from_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.is_ascii() {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_presets() {
        assert_eq!(
            MilightCommand::turn_on().encode(10, 20),
            "20914235a358c97743663745"
        );
        assert_eq!(
            MilightCommand::turn_off().encode(10, 20),
            "20914235a359c97743663746"
        );
        assert_eq!(
            MilightCommand::set_color(120).encode(10, 20),
            "2d9c3f3ab060fe7650734434"
        );
        assert_eq!(
            MilightCommand::dim_on().encode(10, 20),
            "14c536019148857d375a2b45"
        );
    }

    #[test]
    fn test_encode_is_deterministic() {
        let plaintext = MilightCommand::turn_on().plaintext(1, 2);
        let first = encode_command(&plaintext);
        assert_eq!(first, encode_command(&plaintext));
        assert_eq!(first, "20913923a358c9774366376a");
        assert_eq!(first.len(), 24);
    }

    #[test]
    fn test_plaintext_layout() {
        assert_eq!(
            MilightCommand::set_color(7).plaintext(10, 20),
            [45, 161, 10, 20, 2, 4, 7, 50, 0, 0, 0]
        );
        assert_eq!(
            MilightCommand::dim_on().plaintext(10, 20),
            [20, 161, 10, 20, 4, 5, 200, 50, 0, 0, 0]
        );
    }

    #[test]
    fn test_well_formed() {
        assert!(is_well_formed(DeviceKind::Playbulb, "ff000000"));
        assert!(is_well_formed(DeviceKind::Playbulb, "-1"));
        assert!(!is_well_formed(DeviceKind::Playbulb, "ff00"));
        assert!(is_well_formed(DeviceKind::Milight, "255"));
        assert!(!is_well_formed(DeviceKind::Milight, "1000"));
    }

    #[test]
    fn test_playbulb_packets() {
        let packets = playbulb_packets("ff00a001").unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].value, vec![0xff, 0x00, 0xa0, 0x01]);
        assert!(playbulb_packets("zz000000").is_none());
        assert!(playbulb_packets("5").is_none());
    }

    #[test]
    fn test_milight_packets() {
        assert_eq!(milight_packets("0", 10, 20).unwrap().len(), 1);
        let on = milight_packets("1", 10, 20).unwrap();
        assert_eq!(on.len(), 2);
        assert_eq!(to_hex(&on[0].value), "20914235a358c97743663745");
        assert_eq!(to_hex(&on[1].value), "14c536019148857d375a2b45");
        assert!(milight_packets("abc", 10, 20).is_none());
        assert!(milight_packets("256", 10, 20).is_none());
    }
}

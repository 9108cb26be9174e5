//! Logical color instructions for one device slot.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One slot of a request: what a single device should do.
///
/// Tokens travel as plain strings. The three sentinels are shared by every
/// device kind; anything else is an explicit, kind-specific value (8 hex
/// digits for a Playbulb, a 0-255 color wheel value for a Milight).
///
/// # Examples
///
/// ```
/// use std::str::FromStr;
/// use play_lights::ColorToken;
///
/// assert_eq!(ColorToken::from_str("-1").unwrap(), ColorToken::Skip);
/// assert_eq!(ColorToken::from("0"), ColorToken::Off);
/// assert_eq!(ColorToken::from("ff000000").as_str(), "ff000000");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ColorToken {
    /// Leave the device untouched
    Skip,
    /// Turn the device off
    Off,
    /// Turn the device on at its default intensity
    On,
    /// A device-kind-specific color value
    Explicit(String),
}

impl ColorToken {
    pub const SKIP: &'static str = "-1";
    pub const OFF: &'static str = "0";
    pub const ON: &'static str = "1";

    pub fn as_str(&self) -> &str {
        match self {
            ColorToken::Skip => Self::SKIP,
            ColorToken::Off => Self::OFF,
            ColorToken::On => Self::ON,
            ColorToken::Explicit(value) => value,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, ColorToken::Skip)
    }
}

impl From<&str> for ColorToken {
    fn from(s: &str) -> Self {
        match s.trim() {
            Self::SKIP => ColorToken::Skip,
            Self::OFF => ColorToken::Off,
            Self::ON => ColorToken::On,
            other => ColorToken::Explicit(other.to_string()),
        }
    }
}

impl From<String> for ColorToken {
    fn from(s: String) -> Self {
        ColorToken::from(s.as_str())
    }
}

impl From<ColorToken> for String {
    fn from(token: ColorToken) -> Self {
        token.as_str().to_string()
    }
}

impl FromStr for ColorToken {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ColorToken::from(s))
    }
}

impl fmt::Display for ColorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

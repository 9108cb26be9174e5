//! Server configuration and device declarations.
//!
//! The whole deployment is described by one JSON document:
//!
//! ```json
//! {
//!   "server": {"host": "0.0.0.0", "port": 5777, "threaded": false,
//!              "quiet_hours": {"start": "06:00:00", "end": "18:00:00"}},
//!   "bluetooth": {"adapter": 0, "discovery_timeout_ms": 4000},
//!   "tv": {"on": ["echo 'on 0' | cec-client -s"], "off": [], "restart": []},
//!   "devices": [
//!     {"kind": "playbulb", "address": "AA:BB:CC:DD:EE:01", "description": "Desk",
//!      "group": "salon", "subgroup": "luminaire", "default_intensity": "ff000000"},
//!     {"kind": "milight", "address": "AA:BB:CC:DD:EE:02", "description": "Ceiling",
//!      "group": "passage", "id1": 10, "id2": 20}
//!   ]
//! }
//! ```
//!
//! Device order matters: a device's position in `devices` is its index in
//! every request.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::device::{Device, Profile};
use crate::errors::Error;
use crate::orchestrator::Settings;
use crate::transport::Connector;
use crate::tv::TvConfig;
use crate::types::DeviceKind;

type Result<T> = std::result::Result<T, Error>;

/// Daily window during which non-urgent requests are dropped.
///
/// Both bounds are exclusive: a request at exactly `start` or `end` goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Default for QuietHours {
    fn default() -> Self {
        QuietHours {
            start: NaiveTime::from_hms_opt(6, 0, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
        }
    }
}

impl QuietHours {
    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start < time && time < self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Write to the devices of a sweep concurrently
    pub threaded: bool,
    /// `null` disables the time gate
    pub quiet_hours: Option<QuietHours>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 5777,
            threaded: false,
            quiet_hours: Some(QuietHours::default()),
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Which Bluetooth adapter to use and how long to look for a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Position in the system's adapter list
    pub adapter: usize,
    pub discovery_timeout_ms: u64,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        BluetoothConfig {
            adapter: 0,
            discovery_timeout_ms: 4000,
        }
    }
}

impl BluetoothConfig {
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }
}

/// One entry of the `devices` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub kind: String,
    pub address: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub subgroup: Option<String>,
    #[serde(default)]
    pub default_intensity: Option<String>,
    #[serde(default)]
    pub id1: Option<u8>,
    #[serde(default)]
    pub id2: Option<u8>,
}

impl DeviceConfig {
    pub fn kind(&self) -> Result<DeviceKind> {
        DeviceKind::from_str(&self.kind).map_err(|_| Error::UnsupportedDeviceKind(self.kind.clone()))
    }

    pub fn profile(&self) -> Result<Profile> {
        match self.kind()? {
            DeviceKind::Playbulb => {
                let intensity = self.default_intensity.as_deref().ok_or_else(|| {
                    Error::invalid_config(format!("playbulb {} has no default_intensity", self.address))
                })?;
                if codec::playbulb_packets(intensity).is_none() {
                    return Err(Error::invalid_config(format!(
                        "playbulb {} default_intensity {:?} is not 8 hex digits",
                        self.address, intensity
                    )));
                }
                Ok(Profile::Playbulb {
                    default_intensity: intensity.to_lowercase(),
                })
            }
            DeviceKind::Milight => match (self.id1, self.id2) {
                (Some(id1), Some(id2)) => Ok(Profile::Milight { id1, id2 }),
                _ => Err(Error::invalid_config(format!(
                    "milight {} needs both id1 and id2",
                    self.address
                ))),
            },
        }
    }
}

/// The full configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub bluetooth: BluetoothConfig,
    #[serde(default)]
    pub tv: TvConfig,
    pub devices: Vec<DeviceConfig>,
}

impl Config {
    /// Read and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json(&contents)
    }

    /// Parse and validate a configuration document.
    pub fn from_json(contents: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(contents).map_err(Error::JsonLoad)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for device in &self.devices {
            device.profile()?;
        }
        Ok(())
    }

    pub fn settings(&self) -> Settings {
        Settings {
            threaded: self.server.threaded,
            quiet_hours: self.server.quiet_hours,
        }
    }

    /// Instantiate every declared device, in order, sharing `connector`.
    pub fn build_devices(&self, connector: Arc<dyn Connector>) -> Result<Vec<Device>> {
        self.devices
            .iter()
            .enumerate()
            .map(|(index, device)| {
                Ok(Device::new(
                    index,
                    &device.address,
                    &device.description,
                    &device.group,
                    device.subgroup.as_deref(),
                    device.profile()?,
                    Arc::clone(&connector),
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "server": {"port": 6000, "quiet_hours": {"start": "07:30:00", "end": "19:00:00"}},
        "bluetooth": {"adapter": 1},
        "devices": [
            {"kind": "Playbulb", "address": "AA", "description": "Desk", "group": "salon",
             "subgroup": "luminaire", "default_intensity": "FF000000"},
            {"kind": "milight", "address": "BB", "group": "passage", "id1": 10, "id2": 20}
        ]
    }"#;

    fn time(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn test_load_sample() {
        let config = Config::from_json(SAMPLE).unwrap();
        assert_eq!(config.server.address(), "0.0.0.0:6000");
        assert_eq!(config.bluetooth.adapter, 1);
        assert_eq!(config.bluetooth.discovery_timeout(), Duration::from_secs(4));
        assert_eq!(
            config.server.quiet_hours,
            Some(QuietHours {
                start: time(7, 30, 0),
                end: time(19, 0, 0)
            })
        );
        assert_eq!(
            config.devices[0].profile().unwrap(),
            Profile::Playbulb {
                default_intensity: "ff000000".to_string()
            }
        );
        assert_eq!(
            config.devices[1].profile().unwrap(),
            Profile::Milight { id1: 10, id2: 20 }
        );
    }

    #[test]
    fn test_quiet_hours_disabled() {
        let config = Config::from_json(r#"{"server": {"quiet_hours": null}, "devices": []}"#).unwrap();
        assert_eq!(config.settings().quiet_hours, None);
        let config = Config::from_json(r#"{"devices": []}"#).unwrap();
        assert_eq!(config.settings().quiet_hours, Some(QuietHours::default()));
    }

    #[test]
    fn test_quiet_hours_bounds_are_exclusive() {
        let quiet = QuietHours::default();
        assert!(!quiet.contains(time(6, 0, 0)));
        assert!(quiet.contains(time(6, 0, 1)));
        assert!(quiet.contains(time(12, 0, 0)));
        assert!(!quiet.contains(time(18, 0, 0)));
        assert!(!quiet.contains(time(23, 0, 0)));
    }

    #[test]
    fn test_unsupported_kind() {
        let err = Config::from_json(r#"{"devices": [{"kind": "hue", "address": "CC"}]}"#).unwrap_err();
        assert_eq!(err, Error::UnsupportedDeviceKind("hue".to_string()));
    }

    #[test]
    fn test_incomplete_devices() {
        for doc in [
            r#"{"devices": [{"kind": "milight", "address": "CC", "id1": 1}]}"#,
            r#"{"devices": [{"kind": "playbulb", "address": "CC"}]}"#,
            r#"{"devices": [{"kind": "playbulb", "address": "CC", "default_intensity": "red"}]}"#,
        ] {
            assert!(matches!(Config::from_json(doc), Err(Error::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_build_devices_keeps_order() {
        let config = Config::from_json(SAMPLE).unwrap();
        let connector: Arc<dyn Connector> = Arc::new(crate::transport::mock::MockConnector::new());
        let devices = config.build_devices(connector).unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].index(), 0);
        assert_eq!(devices[0].kind(), DeviceKind::Playbulb);
        assert_eq!(devices[0].subgroup(), Some("luminaire"));
        assert_eq!(devices[1].index(), 1);
        assert_eq!(devices[1].current_color(), "0");
    }
}

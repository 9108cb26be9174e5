//! Individual device state and convergence.

use std::fmt;
use std::sync::Arc;

use log::{debug, error, warn};

use crate::codec::{self, Packet};
use crate::errors::Error;
use crate::transport::{Connector, Link};
use crate::types::{ColorToken, DeviceKind, Priority};

type Result<T> = std::result::Result<T, Error>;

/// Kind-specific settings of a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Profile {
    Playbulb {
        /// Color used for [`ColorToken::On`], 8 hex digits
        default_intensity: String,
    },
    Milight {
        id1: u8,
        id2: u8,
    },
}

impl Profile {
    pub fn kind(&self) -> DeviceKind {
        match self {
            Profile::Playbulb { .. } => DeviceKind::Playbulb,
            Profile::Milight { .. } => DeviceKind::Milight,
        }
    }
}

/// Result of one convergence attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Nothing left to do for this device in the current cycle
    Done,
    /// The write failed; try again on the next sweep
    Retry,
}

impl Progress {
    pub fn is_done(&self) -> bool {
        matches!(self, Progress::Done)
    }
}

/// One physical light.
///
/// The index is the device's position in every request vector. The color
/// is the last value known to be on the device, in its on-wire form.
pub struct Device {
    index: usize,
    address: String,
    description: String,
    group: String,
    subgroup: Option<String>,
    profile: Profile,
    current_color: String,
    applied_priority: u8,
    converged: bool,
    connection: Option<Box<dyn Link>>,
    connector: Arc<dyn Connector>,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("index", &self.index)
            .field("address", &self.address)
            .field("group", &self.group)
            .field("subgroup", &self.subgroup)
            .field("profile", &self.profile)
            .field("current_color", &self.current_color)
            .field("applied_priority", &self.applied_priority)
            .field("converged", &self.converged)
            .field("connected", &self.connection.is_some())
            .finish()
    }
}

impl Device {
    pub fn new(
        index: usize,
        address: &str,
        description: &str,
        group: &str,
        subgroup: Option<&str>,
        profile: Profile,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let kind = profile.kind();
        Device {
            index,
            address: address.to_string(),
            description: description.to_string(),
            group: group.to_string(),
            subgroup: subgroup.map(String::from),
            profile,
            current_color: kind.off_value().to_string(),
            applied_priority: 0,
            converged: false,
            connection: None,
            connector,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn subgroup(&self) -> Option<&str> {
        self.subgroup.as_deref()
    }

    pub fn kind(&self) -> DeviceKind {
        self.profile.kind()
    }

    pub fn current_color(&self) -> &str {
        &self.current_color
    }

    pub fn applied_priority(&self) -> u8 {
        self.applied_priority
    }

    pub fn is_converged(&self) -> bool {
        self.converged
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Whether the device is selected by `group` and, if given, `subgroup`.
    pub fn in_group(&self, group: &str, subgroup: Option<&str>) -> bool {
        self.group == group && subgroup.is_none_or(|s| self.subgroup.as_deref() == Some(s))
    }

    /// Human-readable identity, as listed by the client.
    pub fn describe(&self) -> String {
        match &self.profile {
            Profile::Playbulb { .. } => {
                format!("[Playbulb MAC: {}] {}", self.address, self.description)
            }
            Profile::Milight { id1, id2 } => format!(
                "[Milight MAC: {}, ID1: {}, ID2: {}] {}",
                self.address, id1, id2, self.description
            ),
        }
    }

    /// Map a logical token to the value this device understands.
    pub fn convert(&self, token: &ColorToken) -> String {
        match (&self.profile, token) {
            (Profile::Playbulb { .. }, ColorToken::Off) => self.kind().off_value().to_string(),
            (Profile::Playbulb { default_intensity }, ColorToken::On) => default_intensity.clone(),
            (_, token) => token.as_str().to_string(),
        }
    }

    /// Forget this cycle's outcome so the next cycle re-evaluates the device.
    pub fn reset(&mut self) {
        self.converged = false;
    }

    /// Try to bring the device to `target` (an on-wire value from [`Device::convert`]).
    ///
    /// Returns [`Progress::Retry`] only when the hardware write failed.
    pub async fn color(&mut self, target: &str, priority: Priority) -> Progress {
        let kind = self.kind();

        if !self.accepts(target) {
            error!("Unhandled color format {} for {} {}", target, kind, self.address);
            return Progress::Done;
        }
        if self.converged {
            return Progress::Done;
        }
        if target == kind.skip_value() {
            self.converged = true;
            return Progress::Done;
        }
        if self.applied_priority > priority.value() {
            debug!(
                "{} {} is set with higher priority ({}), skipping.",
                kind, self.address, self.applied_priority
            );
            self.converged = true;
            return Progress::Done;
        }
        self.applied_priority = priority.recorded();

        if self.current_color == target && target != kind.off_value() {
            debug!(
                "{} {} is already of the requested color, skipping.",
                kind, self.address
            );
            self.converged = true;
            return Progress::Done;
        }

        let Some(packets) = self.packets(target) else {
            return Progress::Done;
        };

        debug!("Changing {} {} color to {}", kind, self.address, target);
        match self.write(&packets).await {
            Ok(()) => {
                self.current_color = target.to_string();
                self.converged = true;
                debug!("{} {} color changed to {}", kind, self.address, target);
                Progress::Done
            }
            Err(e) => {
                error!("Connection error to device ({}) {}: {}. Retrying", kind, self.address, e);
                Progress::Retry
            }
        }
    }

    /// Close the hardware connection, if any. Failures are ignored.
    pub async fn disconnect(&mut self) {
        if let Some(mut link) = self.connection.take() {
            debug!("Disconnecting from device ({}) {}", self.kind(), self.address);
            if let Err(e) = link.disconnect().await {
                warn!(
                    "Device ({}) {} disconnection failed. Already disconnected? {}",
                    self.kind(),
                    self.address,
                    e
                );
            }
        }
    }

    fn accepts(&self, target: &str) -> bool {
        codec::is_well_formed(self.kind(), target)
            && (target == self.kind().skip_value() || self.packets(target).is_some())
    }

    fn packets(&self, target: &str) -> Option<Vec<Packet>> {
        match &self.profile {
            Profile::Playbulb { .. } => codec::playbulb_packets(target),
            Profile::Milight { id1, id2 } => codec::milight_packets(target, *id1, *id2),
        }
    }

    // The link stays in `connection` while packets go out, so a write
    // cancelled halfway still leaves it reachable by `disconnect`.
    async fn write(&mut self, packets: &[Packet]) -> Result<()> {
        let link = match self.connection.take() {
            Some(link) => link,
            None => {
                debug!("Connecting to device ({}) {}", self.kind(), self.address);
                self.connector.connect(&self.address).await?
            }
        };
        let link = self.connection.insert(link);

        for packet in packets {
            let written = link.write(packet.characteristic, &packet.value).await;
            if let Err(e) = written {
                self.disconnect().await;
                return Err(e);
            }
        }
        Ok(())
    }
}

//! Static identity of the configured devices.
//!
//! Built once at startup; answers "which indices belong to this kind or
//! group" without touching the devices themselves.

use std::collections::HashMap;

use crate::device::Device;
use crate::types::{ColorToken, DeviceKind};

/// Identity of the device at one index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub kind: DeviceKind,
    pub group: String,
    pub subgroup: Option<String>,
}

impl From<&Device> for Member {
    fn from(device: &Device) -> Self {
        Member {
            kind: device.kind(),
            group: device.group().to_string(),
            subgroup: device.subgroup().map(String::from),
        }
    }
}

/// Index-ordered members plus a kind → indices lookup table.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    members: Vec<Member>,
    by_kind: HashMap<DeviceKind, Vec<usize>>,
}

impl Roster {
    pub fn new(members: Vec<Member>) -> Self {
        let mut by_kind: HashMap<DeviceKind, Vec<usize>> =
            DeviceKind::all().map(|kind| (kind, Vec::new())).collect();
        for (index, member) in members.iter().enumerate() {
            by_kind.entry(member.kind).or_default().push(index);
        }
        Roster { members, by_kind }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Indices of every device of `kind`, ascending.
    pub fn indices_of(&self, kind: DeviceKind) -> &[usize] {
        self.by_kind.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// Indices of every device in `group`, ascending.
    pub fn group_members(&self, group: &str) -> Vec<usize> {
        self.members
            .iter()
            .enumerate()
            .filter(|(_, m)| m.group == group)
            .map(|(index, _)| index)
            .collect()
    }

    /// Replace the token of every device outside `group`/`subgroup` with a skip.
    ///
    /// The vector keeps its length and alignment.
    pub fn mask_group(&self, tokens: &mut [ColorToken], group: &str, subgroup: Option<&str>) {
        for (token, member) in tokens.iter_mut().zip(&self.members) {
            let selected = member.group == group
                && subgroup.is_none_or(|s| member.subgroup.as_deref() == Some(s));
            if !selected {
                *token = ColorToken::Skip;
            }
        }
    }

    /// The kind-specific off value of the device at `index`.
    pub fn off_value(&self, index: usize) -> Option<&'static str> {
        self.members.get(index).map(|m| m.kind.off_value())
    }
}

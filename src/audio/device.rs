use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the audio path a device sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Input,
    Output,
}

/// Opaque, unique device identifier as handed out by the audio system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub u32);

/// A device as seen in one enumeration pass. Never cached across passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub role: Role,
    pub is_default: bool,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Input, Role::Output];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Input => "input",
            Role::Output => "output",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {}){}",
            self.name,
            self.role,
            self.id,
            if self.is_default { " [Default]" } else { "" }
        )
    }
}

impl Device {
    pub fn new(id: DeviceId, name: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            name: name.into(),
            role,
            is_default: false,
        }
    }

    pub fn set_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }
}

/// Returns the first device whose name matches exactly.
pub fn find_by_name<'a>(devices: &'a [Device], name: &str) -> Option<&'a Device> {
    devices.iter().find(|device| device.name == name)
}

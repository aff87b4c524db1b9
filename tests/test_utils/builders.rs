//! Test utility builders for devices and preferences
//!
//! Individual methods may not be used by all tests, so dead code warnings are suppressed.

#![allow(dead_code)]

use airpods_sanity::audio::{Device, DeviceId, Role};
use airpods_sanity::config::Preferences;
use airpods_sanity::system::MockDeviceCatalog;

/// Builder for creating test Device instances
pub struct DeviceBuilder {
    id: u32,
    name: String,
    role: Role,
    is_default: bool,
}

impl DeviceBuilder {
    pub fn new() -> Self {
        Self {
            id: 1,
            name: "Test Device".to_string(),
            role: Role::Output,
            is_default: false,
        }
    }

    pub fn id(mut self, id: u32) -> Self {
        self.id = id;
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn input(mut self) -> Self {
        self.role = Role::Input;
        self
    }

    pub fn output(mut self) -> Self {
        self.role = Role::Output;
        self
    }

    pub fn default_device(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn build(self) -> Device {
        Device::new(DeviceId(self.id), self.name, self.role).set_default(self.is_default)
    }
}

impl Default for DeviceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test Preferences instances
pub struct PreferencesBuilder {
    enabled: bool,
    outputs: Vec<String>,
    inputs: Vec<String>,
}

impl PreferencesBuilder {
    pub fn new() -> Self {
        Self {
            enabled: true,
            outputs: Vec::new(),
            inputs: Vec::new(),
        }
    }

    pub fn outputs(mut self, names: &[&str]) -> Self {
        self.outputs = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn inputs(mut self, names: &[&str]) -> Self {
        self.inputs = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn build(self) -> Preferences {
        Preferences {
            enabled: self.enabled,
            priority_outputs: self.outputs.into_iter().collect(),
            priority_inputs: self.inputs.into_iter().collect(),
        }
    }
}

impl Default for PreferencesBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper functions for creating common test scenarios
pub mod scenarios {
    use super::*;

    pub const SPEAKERS: u32 = 1;
    pub const STUDIO_SPEAKERS: u32 = 2;
    pub const AIRPODS_OUT: u32 = 10;
    pub const MAC_MIC: u32 = 20;
    pub const AIRPODS_IN: u32 = 21;

    /// AirPods preferred for listening, the built-in microphone for talking
    pub fn airpods_preferences() -> Preferences {
        PreferencesBuilder::new()
            .outputs(&["AirPods Pro"])
            .inputs(&["MacBook Pro Microphone"])
            .build()
    }

    /// A laptop with nothing plugged in
    pub fn laptop_catalog() -> MockDeviceCatalog {
        let catalog = MockDeviceCatalog::new();
        catalog.add_device(
            DeviceBuilder::new()
                .id(SPEAKERS)
                .name("MacBook Pro Speakers")
                .output()
                .default_device()
                .build(),
        );
        catalog.add_device(
            DeviceBuilder::new()
                .id(MAC_MIC)
                .name("MacBook Pro Microphone")
                .input()
                .default_device()
                .build(),
        );
        catalog
    }

    /// The laptop after macOS has routed both directions to freshly connected AirPods
    pub fn airpods_took_over_catalog() -> MockDeviceCatalog {
        let catalog = laptop_catalog();
        catalog.add_device(airpods_output().default_device().build());
        catalog.add_device(airpods_input().default_device().build());
        catalog
    }

    pub fn airpods_output() -> DeviceBuilder {
        DeviceBuilder::new().id(AIRPODS_OUT).name("AirPods Pro").output()
    }

    pub fn airpods_input() -> DeviceBuilder {
        DeviceBuilder::new().id(AIRPODS_IN).name("AirPods Pro").input()
    }
}

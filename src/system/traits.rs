use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::audio::{Device, DeviceId, Role};

/// Something changed in the audio system; listeners re-query, there is no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceEvent {
    DeviceListChanged,
    DefaultDeviceChanged(Role),
}

impl DeviceEvent {
    /// The three events the coordinator listens to.
    pub const ALL: [DeviceEvent; 3] = [
        DeviceEvent::DeviceListChanged,
        DeviceEvent::DefaultDeviceChanged(Role::Input),
        DeviceEvent::DefaultDeviceChanged(Role::Output),
    ];
}

/// Handle for one registered listener, needed to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

pub type EventCallback = Arc<dyn Fn(DeviceEvent) + Send + Sync>;

/// Trait for audio system operations - abstracts CoreAudio so the core can run against a mock
pub trait DeviceCatalog {
    /// Enumerate the devices currently available for a role
    fn list_devices(&self, role: Role) -> Result<Vec<Device>>;

    /// Get the current default device for a role, `None` when the system reports none
    fn default_device(&self, role: Role) -> Result<Option<Device>>;

    /// Make the device the system default for a role
    fn set_default_device(&self, role: Role, device_id: DeviceId) -> Result<()>;

    /// Register a callback for one kind of device event.
    /// The callback may be invoked from a thread owned by the audio system.
    fn add_listener(&self, event: DeviceEvent, callback: EventCallback) -> Result<ListenerId>;

    /// Remove a previously registered callback
    fn remove_listener(&self, id: ListenerId) -> Result<()>;
}

/// Trait for file system operations - abstracts std::fs for testability
pub trait FileSystemInterface {
    /// Read the entire contents of a configuration file
    fn read_config_file(&self, path: &Path) -> Result<String>;

    /// Write configuration content to a file
    fn write_config_file(&self, path: &Path, content: &str) -> Result<()>;

    /// Check if a configuration file exists
    fn config_file_exists(&self, path: &Path) -> bool;

    /// Create the directory structure for config files
    fn create_config_dir(&self, path: &Path) -> Result<()>;

    /// Get the last modified time of a config file (for watching changes)
    fn get_config_modified_time(&self, path: &Path) -> Result<std::time::SystemTime>;
}

pub mod coordinator;
#[cfg(target_os = "macos")]
pub mod coreaudio;
pub mod device;

pub use coordinator::{ChangeCoordinator, CoordinatorSignal, CoordinatorState, PassOutcome};
#[cfg(target_os = "macos")]
pub use coreaudio::CoreAudioCatalog;
pub use device::{Device, DeviceId, Role, find_by_name};

/// The catalog backed by the operating system's audio API.
#[cfg(target_os = "macos")]
pub type SystemCatalog = CoreAudioCatalog;

#[cfg(target_os = "macos")]
pub fn system_catalog() -> anyhow::Result<SystemCatalog> {
    CoreAudioCatalog::new()
}

#[cfg(not(target_os = "macos"))]
pub use unsupported::SystemCatalog;

#[cfg(not(target_os = "macos"))]
pub fn system_catalog() -> anyhow::Result<SystemCatalog> {
    anyhow::bail!("Controlling audio devices is only supported on macOS")
}

#[cfg(not(target_os = "macos"))]
mod unsupported {
    use anyhow::Result;

    use super::{Device, DeviceId, Role};
    use crate::system::{DeviceCatalog, DeviceEvent, EventCallback, ListenerId};

    /// Placeholder that can never be constructed off macOS.
    pub enum SystemCatalog {}

    impl DeviceCatalog for SystemCatalog {
        fn list_devices(&self, _role: Role) -> Result<Vec<Device>> {
            match *self {}
        }

        fn default_device(&self, _role: Role) -> Result<Option<Device>> {
            match *self {}
        }

        fn set_default_device(&self, _role: Role, _device_id: DeviceId) -> Result<()> {
            match *self {}
        }

        fn add_listener(
            &self,
            _event: DeviceEvent,
            _callback: EventCallback,
        ) -> Result<ListenerId> {
            match *self {}
        }

        fn remove_listener(&self, _id: ListenerId) -> Result<()> {
            match *self {}
        }
    }
}

//! In-memory stand-ins for the audio system and the file system.
//!
//! Used by the test suites and by the `simulate` command. Every mock is cheap
//! to clone and clones share state, so a test can keep a handle while the code
//! under test owns another.

use anyhow::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use crate::audio::{Device, DeviceId, Role};
use crate::system::traits::{
    DeviceCatalog, DeviceEvent, EventCallback, FileSystemInterface, ListenerId,
};

/// Mock audio system - behaves like CoreAudio as far as the coordinator can tell:
/// changing a default device notifies the listeners registered at that moment.
#[derive(Clone, Default)]
pub struct MockDeviceCatalog {
    pub devices: Arc<Mutex<Vec<Device>>>,
    pub defaults: Arc<Mutex<HashMap<Role, DeviceId>>>,
    pub listeners: Arc<Mutex<HashMap<ListenerId, (DeviceEvent, EventCallback)>>>,
    pub set_default_calls: Arc<Mutex<Vec<(Role, DeviceId)>>>,
    pub emitted_events: Arc<Mutex<Vec<DeviceEvent>>>,
    pub add_listener_calls: Arc<AtomicU64>,
    pub remove_listener_calls: Arc<AtomicU64>,
    pub should_fail_enumeration: Arc<Mutex<bool>>,
    pub should_fail_default_query: Arc<Mutex<bool>>,
    pub should_fail_set_device: Arc<Mutex<bool>>,
    /// Number of further `add_listener` calls that succeed before they start failing
    pub add_listener_budget: Arc<Mutex<Option<u64>>>,
    next_listener_id: Arc<AtomicU64>,
}

impl MockDeviceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device without notifying anyone (test setup).
    /// A device flagged `is_default` becomes the default for its role.
    pub fn add_device(&self, device: Device) {
        if device.is_default {
            self.defaults.lock().unwrap().insert(device.role, device.id);
        }
        self.devices.lock().unwrap().push(device.set_default(false));
    }

    /// Plug a device in: add it and announce the new device list
    pub fn connect_device(&self, device: Device) {
        self.add_device(device);
        self.emit(DeviceEvent::DeviceListChanged);
    }

    /// Unplug every device with this id. When one of them was a default, the
    /// first remaining device of that role takes over, as the OS would do.
    pub fn disconnect_device(&self, device_id: DeviceId) {
        let mut default_changes = Vec::new();
        {
            let mut devices = self.devices.lock().unwrap();
            devices.retain(|d| d.id != device_id);

            let mut defaults = self.defaults.lock().unwrap();
            for role in Role::ALL {
                if defaults.get(&role) == Some(&device_id) {
                    match devices.iter().find(|d| d.role == role) {
                        Some(next) => {
                            defaults.insert(role, next.id);
                        }
                        None => {
                            defaults.remove(&role);
                        }
                    }
                    default_changes.push(role);
                }
            }
        }

        self.emit(DeviceEvent::DeviceListChanged);
        for role in default_changes {
            self.emit(DeviceEvent::DefaultDeviceChanged(role));
        }
    }

    /// Set a default without notifying anyone (test setup)
    pub fn set_mock_default(&self, role: Role, device_id: DeviceId) {
        self.defaults.lock().unwrap().insert(role, device_id);
    }

    /// Change a default from outside the app (e.g. the user in System Settings)
    pub fn change_default(&self, role: Role, device_id: DeviceId) {
        self.set_mock_default(role, device_id);
        self.emit(DeviceEvent::DefaultDeviceChanged(role));
    }

    /// Deliver an event to every listener registered for it right now
    pub fn emit(&self, event: DeviceEvent) {
        self.emitted_events.lock().unwrap().push(event);

        // Callbacks run without the lock held so they may call back into the mock
        let callbacks: Vec<EventCallback> = self
            .listeners
            .lock()
            .unwrap()
            .values()
            .filter(|(registered, _)| *registered == event)
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in callbacks {
            callback(event);
        }
    }

    pub fn current_default(&self, role: Role) -> Option<DeviceId> {
        self.defaults.lock().unwrap().get(&role).copied()
    }

    pub fn get_set_default_calls(&self) -> Vec<(Role, DeviceId)> {
        self.set_default_calls.lock().unwrap().clone()
    }

    pub fn clear_set_default_calls(&self) {
        self.set_default_calls.lock().unwrap().clear();
    }

    pub fn get_emitted_events(&self) -> Vec<DeviceEvent> {
        self.emitted_events.lock().unwrap().clone()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    pub fn add_listener_call_count(&self) -> u64 {
        self.add_listener_calls.load(Ordering::Relaxed)
    }

    pub fn remove_listener_call_count(&self) -> u64 {
        self.remove_listener_calls.load(Ordering::Relaxed)
    }

    /// Configure the mock to fail enumeration
    pub fn set_enumeration_failure(&self, should_fail: bool) {
        *self.should_fail_enumeration.lock().unwrap() = should_fail;
    }

    /// Configure the mock to fail reading default devices
    pub fn set_default_query_failure(&self, should_fail: bool) {
        *self.should_fail_default_query.lock().unwrap() = should_fail;
    }

    /// Configure the mock to fail device setting
    pub fn set_device_setting_failure(&self, should_fail: bool) {
        *self.should_fail_set_device.lock().unwrap() = should_fail;
    }

    /// Let `successes` more listener registrations through, then fail the rest.
    /// `None` lifts the limit.
    pub fn set_add_listener_budget(&self, successes: Option<u64>) {
        *self.add_listener_budget.lock().unwrap() = successes;
    }
}

impl DeviceCatalog for MockDeviceCatalog {
    fn list_devices(&self, role: Role) -> Result<Vec<Device>> {
        if *self.should_fail_enumeration.lock().unwrap() {
            return Err(anyhow::anyhow!("Mock enumeration failure"));
        }

        let default_id = self.current_default(role);
        Ok(self
            .devices
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.role == role)
            .map(|d| d.clone().set_default(Some(d.id) == default_id))
            .collect())
    }

    fn default_device(&self, role: Role) -> Result<Option<Device>> {
        if *self.should_fail_default_query.lock().unwrap() {
            return Err(anyhow::anyhow!("Mock default device query failure"));
        }

        let Some(default_id) = self.current_default(role) else {
            return Ok(None);
        };

        Ok(self
            .devices
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.role == role && d.id == default_id)
            .map(|d| d.clone().set_default(true)))
    }

    fn set_default_device(&self, role: Role, device_id: DeviceId) -> Result<()> {
        if *self.should_fail_set_device.lock().unwrap() {
            return Err(anyhow::anyhow!("Mock set device failure"));
        }

        self.set_default_calls
            .lock()
            .unwrap()
            .push((role, device_id));

        let known = self
            .devices
            .lock()
            .unwrap()
            .iter()
            .any(|d| d.role == role && d.id == device_id);
        if !known {
            return Err(anyhow::anyhow!("{} device {} not found", role, device_id));
        }

        let previous = self.defaults.lock().unwrap().insert(role, device_id);
        if previous != Some(device_id) {
            self.emit(DeviceEvent::DefaultDeviceChanged(role));
        }

        Ok(())
    }

    fn add_listener(&self, event: DeviceEvent, callback: EventCallback) -> Result<ListenerId> {
        self.add_listener_calls.fetch_add(1, Ordering::Relaxed);

        if let Some(remaining) = self.add_listener_budget.lock().unwrap().as_mut() {
            if *remaining == 0 {
                return Err(anyhow::anyhow!("Mock add listener failure for {:?}", event));
            }
            *remaining -= 1;
        }

        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().unwrap().insert(id, (event, callback));
        Ok(id)
    }

    fn remove_listener(&self, id: ListenerId) -> Result<()> {
        self.remove_listener_calls.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| anyhow::anyhow!("Unknown listener {:?}", id))
    }
}

/// Mock file system for testing - provides controllable file operations
#[derive(Clone, Default)]
pub struct MockFileSystem {
    pub files: Arc<Mutex<HashMap<PathBuf, String>>>,
    pub modified: Arc<Mutex<HashMap<PathBuf, SystemTime>>>,
    pub read_calls: Arc<Mutex<Vec<PathBuf>>>,
    pub write_calls: Arc<Mutex<Vec<(PathBuf, String)>>>,
    pub directory_creation_calls: Arc<Mutex<Vec<PathBuf>>>,
    pub should_fail_read: Arc<Mutex<bool>>,
    pub should_fail_write: Arc<Mutex<bool>>,
    pub should_fail_create_dir: Arc<Mutex<bool>>,
    clock: Arc<AtomicU64>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file to the mock file system
    pub fn add_file<P: AsRef<Path>>(&self, path: P, content: String) {
        let path = path.as_ref().to_path_buf();
        self.touch(&path);
        self.files.lock().unwrap().insert(path, content);
    }

    /// Get the current content of a file
    pub fn file_content<P: AsRef<Path>>(&self, path: P) -> Option<String> {
        self.files.lock().unwrap().get(path.as_ref()).cloned()
    }

    /// Get all read calls that were made
    pub fn get_read_calls(&self) -> Vec<PathBuf> {
        self.read_calls.lock().unwrap().clone()
    }

    /// Get all write calls that were made
    pub fn get_write_calls(&self) -> Vec<(PathBuf, String)> {
        self.write_calls.lock().unwrap().clone()
    }

    /// Get all directory creation calls that were made
    pub fn get_directory_creation_calls(&self) -> Vec<PathBuf> {
        self.directory_creation_calls.lock().unwrap().clone()
    }

    /// Configure the mock to fail read operations
    pub fn set_read_failure(&self, should_fail: bool) {
        *self.should_fail_read.lock().unwrap() = should_fail;
    }

    /// Configure the mock to fail write operations
    pub fn set_write_failure(&self, should_fail: bool) {
        *self.should_fail_write.lock().unwrap() = should_fail;
    }

    /// Configure the mock to fail directory creation
    pub fn set_create_dir_failure(&self, should_fail: bool) {
        *self.should_fail_create_dir.lock().unwrap() = should_fail;
    }

    // Every write moves the file's clock forward by one second
    fn touch(&self, path: &Path) {
        let tick = self.clock.fetch_add(1, Ordering::Relaxed) + 1;
        self.modified.lock().unwrap().insert(
            path.to_path_buf(),
            SystemTime::UNIX_EPOCH + Duration::from_secs(1000 + tick),
        );
    }
}

impl FileSystemInterface for MockFileSystem {
    fn read_config_file(&self, path: &Path) -> Result<String> {
        self.read_calls.lock().unwrap().push(path.to_path_buf());

        if *self.should_fail_read.lock().unwrap() {
            return Err(anyhow::anyhow!("Mock read failure"));
        }

        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("File not found: {}", path.display()))
    }

    fn write_config_file(&self, path: &Path, content: &str) -> Result<()> {
        self.write_calls
            .lock()
            .unwrap()
            .push((path.to_path_buf(), content.to_string()));

        if *self.should_fail_write.lock().unwrap() {
            return Err(anyhow::anyhow!("Mock write failure"));
        }

        self.touch(path);
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    fn config_file_exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn create_config_dir(&self, path: &Path) -> Result<()> {
        self.directory_creation_calls
            .lock()
            .unwrap()
            .push(path.to_path_buf());

        if *self.should_fail_create_dir.lock().unwrap() {
            return Err(anyhow::anyhow!("Mock create directory failure"));
        }

        Ok(())
    }

    fn get_config_modified_time(&self, path: &Path) -> Result<SystemTime> {
        self.modified
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("File not found: {}", path.display()))
    }
}

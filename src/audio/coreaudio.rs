//! CoreAudio implementation of [`DeviceCatalog`].
//!
//! Listener callbacks run on a thread owned by the HAL (the HAL run loop is
//! detached from the main thread at construction), so callbacks must be
//! `Send + Sync` and should do no more than hand the event off.

use anyhow::Result;
use core_foundation::base::TCFType;
use core_foundation::string::{CFString, CFStringRef};
use core_foundation_sys::runloop::CFRunLoopRef;
use coreaudio_sys::*;
use std::collections::HashMap;
use std::os::raw::c_void;
use std::ptr::{self, NonNull};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

use crate::audio::{Device, DeviceId, Role};
use crate::system::{DeviceCatalog, DeviceEvent, EventCallback, ListenerId};

const NO_ERROR: OSStatus = kAudioHardwareNoError as OSStatus;
const UNKNOWN_DEVICE: AudioObjectID = 0;

struct ListenerContext {
    event: DeviceEvent,
    callback: EventCallback,
}

struct Registration {
    address: AudioObjectPropertyAddress,
    context: NonNull<ListenerContext>,
}

/// Every context handed to the HAL stays allocated until the catalog is
/// dropped. Removing a listener does not wait for a callback already running
/// on the HAL thread, so a context is never freed on removal; re-adding the
/// same event and callback reuses the idle context instead.
#[derive(Default)]
struct Listeners {
    registrations: HashMap<ListenerId, Registration>,
    contexts: Vec<Box<ListenerContext>>,
}

// Contexts are only read through these pointers, by the HAL callback, and
// the callback they hold is Send + Sync.
unsafe impl Send for Registration {}

impl Listeners {
    fn context_for(
        &mut self,
        event: DeviceEvent,
        callback: &EventCallback,
    ) -> NonNull<ListenerContext> {
        let registrations = &self.registrations;
        let idle = self.contexts.iter().position(|context| {
            context.event == event
                && Arc::ptr_eq(&context.callback, callback)
                && !registrations
                    .values()
                    .any(|r| r.context == NonNull::from(&**context))
        });

        let index = match idle {
            Some(index) => index,
            None => {
                self.contexts.push(Box::new(ListenerContext {
                    event,
                    callback: Arc::clone(callback),
                }));
                self.contexts.len() - 1
            }
        };
        NonNull::from(&*self.contexts[index])
    }
}

pub struct CoreAudioCatalog {
    listeners: Mutex<Listeners>,
    next_id: AtomicU64,
}

impl CoreAudioCatalog {
    pub fn new() -> Result<Self> {
        // Without this the HAL would deliver notifications on the main run loop,
        // which nothing in this process spins
        let address = global_address(kAudioHardwarePropertyRunLoop);
        let run_loop: CFRunLoopRef = ptr::null_mut();

        let status = unsafe {
            AudioObjectSetPropertyData(
                kAudioObjectSystemObject,
                &address,
                0,
                ptr::null(),
                std::mem::size_of::<CFRunLoopRef>() as u32,
                &run_loop as *const _ as *const c_void,
            )
        };
        check(status, "detach HAL notification run loop")?;

        info!("Initialized CoreAudio device catalog");
        Ok(Self {
            listeners: Mutex::new(Listeners::default()),
            next_id: AtomicU64::new(1),
        })
    }

    fn all_device_ids(&self) -> Result<Vec<AudioObjectID>> {
        let address = global_address(kAudioHardwarePropertyDevices);

        let mut size: u32 = 0;
        let status = unsafe {
            AudioObjectGetPropertyDataSize(
                kAudioObjectSystemObject,
                &address,
                0,
                ptr::null(),
                &mut size,
            )
        };
        check(status, "get device list size")?;

        let count = size as usize / std::mem::size_of::<AudioObjectID>();
        let mut ids: Vec<AudioObjectID> = vec![0; count];
        let status = unsafe {
            AudioObjectGetPropertyData(
                kAudioObjectSystemObject,
                &address,
                0,
                ptr::null(),
                &mut size,
                ids.as_mut_ptr() as *mut c_void,
            )
        };
        check(status, "get device list")?;

        // The list may have shrunk between the two calls
        ids.truncate(size as usize / std::mem::size_of::<AudioObjectID>());
        Ok(ids)
    }

    fn device_name(&self, device_id: AudioObjectID) -> Result<String> {
        let address = global_address(kAudioDevicePropertyDeviceNameCFString);
        let mut size = std::mem::size_of::<CFStringRef>() as u32;
        let mut name: CFStringRef = ptr::null();

        let status = unsafe {
            AudioObjectGetPropertyData(
                device_id,
                &address,
                0,
                ptr::null(),
                &mut size,
                &mut name as *mut _ as *mut c_void,
            )
        };
        check(status, "get device name")?;

        if name.is_null() {
            return Err(anyhow::anyhow!("Device {} has no name", device_id));
        }

        // The HAL hands over a +1 reference
        let name = unsafe { CFString::wrap_under_create_rule(name) };
        Ok(name.to_string())
    }

    /// Number of channels the device exposes in the role's scope.
    fn channel_count(&self, device_id: AudioObjectID, role: Role) -> Result<u32> {
        let address = AudioObjectPropertyAddress {
            mSelector: kAudioDevicePropertyStreamConfiguration,
            mScope: role_scope(role),
            mElement: kAudioObjectPropertyElementMain,
        };

        let mut size: u32 = 0;
        let status = unsafe {
            AudioObjectGetPropertyDataSize(device_id, &address, 0, ptr::null(), &mut size)
        };
        check(status, "get stream configuration size")?;
        if (size as usize) < std::mem::size_of::<AudioBufferList>() {
            return Ok(0);
        }

        // u64 words keep the buffer list suitably aligned
        let words = (size as usize).div_ceil(std::mem::size_of::<u64>());
        let mut storage: Vec<u64> = vec![0; words];
        let status = unsafe {
            AudioObjectGetPropertyData(
                device_id,
                &address,
                0,
                ptr::null(),
                &mut size,
                storage.as_mut_ptr() as *mut c_void,
            )
        };
        check(status, "get stream configuration")?;

        let channels = unsafe {
            let list = &*(storage.as_ptr() as *const AudioBufferList);
            let buffers =
                std::slice::from_raw_parts(list.mBuffers.as_ptr(), list.mNumberBuffers as usize);
            buffers.iter().map(|buffer| buffer.mNumberChannels).sum()
        };
        Ok(channels)
    }

    fn default_device_id(&self, role: Role) -> Result<AudioObjectID> {
        let address = global_address(default_selector(role));
        let mut size = std::mem::size_of::<AudioObjectID>() as u32;
        let mut device_id: AudioObjectID = UNKNOWN_DEVICE;

        let status = unsafe {
            AudioObjectGetPropertyData(
                kAudioObjectSystemObject,
                &address,
                0,
                ptr::null(),
                &mut size,
                &mut device_id as *mut _ as *mut c_void,
            )
        };
        check(status, "get default device")?;
        Ok(device_id)
    }
}

impl DeviceCatalog for CoreAudioCatalog {
    fn list_devices(&self, role: Role) -> Result<Vec<Device>> {
        let default_id = self.default_device_id(role)?;
        let mut devices = Vec::new();

        for id in self.all_device_ids()? {
            match self.channel_count(id, role) {
                Ok(0) => continue,
                Ok(_) => {}
                Err(e) => {
                    debug!("Skipping device {}: {:#}", id, e);
                    continue;
                }
            }

            match self.device_name(id) {
                Ok(name) => {
                    let device = Device::new(DeviceId(id), name, role);
                    devices.push(device.set_default(id == default_id));
                }
                Err(e) => warn!("Skipping unnamed {} device {}: {:#}", role, id, e),
            }
        }

        debug!("Enumerated {} {} devices", devices.len(), role);
        Ok(devices)
    }

    fn default_device(&self, role: Role) -> Result<Option<Device>> {
        let id = self.default_device_id(role)?;
        if id == UNKNOWN_DEVICE {
            debug!("No default {} device", role);
            return Ok(None);
        }

        let name = self.device_name(id)?;
        Ok(Some(Device::new(DeviceId(id), name, role).set_default(true)))
    }

    fn set_default_device(&self, role: Role, device_id: DeviceId) -> Result<()> {
        let address = global_address(default_selector(role));
        let id: AudioObjectID = device_id.0;

        let status = unsafe {
            AudioObjectSetPropertyData(
                kAudioObjectSystemObject,
                &address,
                0,
                ptr::null(),
                std::mem::size_of::<AudioObjectID>() as u32,
                &id as *const _ as *const c_void,
            )
        };

        if status != NO_ERROR {
            error!("Failed to set default {} device {}: {}", role, device_id, status);
            return Err(anyhow::anyhow!(
                "Failed to set default {} device {} (OSStatus {})",
                role,
                device_id,
                status
            ));
        }

        debug!("Set default {} device to {}", role, device_id);
        Ok(())
    }

    fn add_listener(&self, event: DeviceEvent, callback: EventCallback) -> Result<ListenerId> {
        let address = event_address(event);
        let mut listeners = self
            .listeners
            .lock()
            .map_err(|_| anyhow::anyhow!("Listener registry poisoned"))?;
        let context = listeners.context_for(event, &callback);

        let status = unsafe {
            AudioObjectAddPropertyListener(
                kAudioObjectSystemObject,
                &address,
                Some(property_listener),
                context.as_ptr() as *mut c_void,
            )
        };
        if status != NO_ERROR {
            return Err(anyhow::anyhow!(
                "Failed to register {:?} listener (OSStatus {})",
                event,
                status
            ));
        }

        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        listeners
            .registrations
            .insert(id, Registration { address, context });

        debug!("Registered {:?} listener as {:?}", event, id);
        Ok(id)
    }

    fn remove_listener(&self, id: ListenerId) -> Result<()> {
        let registration = self
            .listeners
            .lock()
            .map_err(|_| anyhow::anyhow!("Listener registry poisoned"))?
            .registrations
            .remove(&id)
            .ok_or_else(|| anyhow::anyhow!("Unknown listener {:?}", id))?;

        unregister(&registration)
    }
}

impl Drop for CoreAudioCatalog {
    fn drop(&mut self) {
        let listeners = match self.listeners.get_mut() {
            Ok(listeners) => listeners,
            Err(poisoned) => poisoned.into_inner(),
        };

        for (id, registration) in listeners.registrations.drain() {
            if let Err(e) = unregister(&registration) {
                warn!("Failed to remove listener {:?} on drop: {:#}", id, e);
            }
        }
        // The contexts go with the catalog, which lives until the process exits
    }
}

fn unregister(registration: &Registration) -> Result<()> {
    let status = unsafe {
        AudioObjectRemovePropertyListener(
            kAudioObjectSystemObject,
            &registration.address,
            Some(property_listener),
            registration.context.as_ptr() as *mut c_void,
        )
    };
    check(status, "remove property listener")
}

extern "C" fn property_listener(
    _in_object_id: AudioObjectID,
    _in_number_addresses: UInt32,
    _in_addresses: *const AudioObjectPropertyAddress,
    in_client_data: *mut c_void,
) -> OSStatus {
    if !in_client_data.is_null() {
        let context = unsafe { &*(in_client_data as *const ListenerContext) };
        (context.callback)(context.event);
    }
    NO_ERROR
}

fn check(status: OSStatus, what: &str) -> Result<()> {
    if status != NO_ERROR {
        return Err(anyhow::anyhow!("Failed to {} (OSStatus {})", what, status));
    }
    Ok(())
}

fn global_address(selector: AudioObjectPropertySelector) -> AudioObjectPropertyAddress {
    AudioObjectPropertyAddress {
        mSelector: selector,
        mScope: kAudioObjectPropertyScopeGlobal,
        mElement: kAudioObjectPropertyElementMain,
    }
}

fn default_selector(role: Role) -> AudioObjectPropertySelector {
    match role {
        Role::Input => kAudioHardwarePropertyDefaultInputDevice,
        Role::Output => kAudioHardwarePropertyDefaultOutputDevice,
    }
}

fn role_scope(role: Role) -> AudioObjectPropertyScope {
    match role {
        Role::Input => kAudioDevicePropertyScopeInput,
        Role::Output => kAudioDevicePropertyScopeOutput,
    }
}

fn event_address(event: DeviceEvent) -> AudioObjectPropertyAddress {
    match event {
        DeviceEvent::DeviceListChanged => global_address(kAudioHardwarePropertyDevices),
        DeviceEvent::DefaultDeviceChanged(role) => global_address(default_selector(role)),
    }
}

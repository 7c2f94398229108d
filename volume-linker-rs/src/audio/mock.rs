//! In-memory audio subsystem.
//!
//! Simulates rendering endpoints with volume, mute, change notifications and
//! per-device fault injection. Everything lives on one thread, like the host
//! message loop it stands in for.

use super::backend::{AudioBackend, EndpointVolume, NotificationSender};
use super::device::{
    clamp_volume, AudioEndpoint, AudioError, DeviceState, EndpointInfo, EventContext,
    RenderEndpoints, VolumeNotification, VolumeState,
};
use std::cell::RefCell;
use std::rc::Rc;

/// Faults to inject into a simulated device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceFaults {
    /// Opening the volume control fails
    pub activate: bool,

    /// Registering for change notifications fails
    pub register: bool,

    /// Reading the volume level fails
    pub read_volume: bool,

    /// Reading the mute state fails
    pub read_mute: bool,

    /// Setting volume or mute fails
    pub write: bool,
}

/// A volume or mute write seen by a simulated device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockWrite {
    Volume(f32, EventContext),
    Mute(bool, EventContext),
}

#[derive(Debug)]
struct MockDevice {
    id: String,
    name: String,
    state: DeviceState,
    volume: f32,
    muted: bool,
    faults: DeviceFaults,
    listeners: Vec<(u64, NotificationSender)>,
    writes: Vec<MockWrite>,
}

impl MockDevice {
    fn notify(&self, context: EventContext) {
        let notification = VolumeNotification {
            endpoint_id: self.id.clone(),
            state: VolumeState::new(self.volume, self.muted),
            context,
        };
        for (_, sender) in &self.listeners {
            let _ = sender.send(notification.clone());
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    devices: Vec<MockDevice>,
    fail_enumeration: bool,
    reported_count: Option<usize>,
    next_registration: u64,
}

impl MockState {
    fn device(&self, device_id: &str) -> Result<&MockDevice, AudioError> {
        self.devices
            .iter()
            .find(|d| d.id == device_id)
            .ok_or_else(|| AudioError::DeviceNotFound {
                device_id: device_id.to_string(),
            })
    }

    fn device_mut(&mut self, device_id: &str) -> Result<&mut MockDevice, AudioError> {
        self.devices
            .iter_mut()
            .find(|d| d.id == device_id)
            .ok_or_else(|| AudioError::DeviceNotFound {
                device_id: device_id.to_string(),
            })
    }
}

/// Shared handle to a simulated audio subsystem.
#[derive(Debug, Clone, Default)]
pub struct MockAudioSystem {
    inner: Rc<RefCell<MockState>>,
}

impl MockAudioSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend view of this system, for the catalog and controller.
    pub fn backend(&self) -> MockBackend {
        MockBackend {
            system: self.clone(),
        }
    }

    /// Add an active device at volume 1.0, unmuted.
    pub fn add_device(&self, id: &str, name: &str) {
        self.add_device_with_state(id, name, DeviceState::Active);
    }

    pub fn add_device_with_state(&self, id: &str, name: &str, state: DeviceState) {
        self.inner.borrow_mut().devices.push(MockDevice {
            id: id.to_string(),
            name: name.to_string(),
            state,
            volume: 1.0,
            muted: false,
            faults: DeviceFaults::default(),
            listeners: Vec::new(),
            writes: Vec::new(),
        });
    }

    /// Set device state directly, without firing notifications.
    pub fn set_volume_state(&self, id: &str, volume: f32, muted: bool) {
        if let Ok(device) = self.inner.borrow_mut().device_mut(id) {
            device.volume = clamp_volume(volume);
            device.muted = muted;
        }
    }

    /// Simulate a change made by another application or the hardware keys.
    pub fn external_change(&self, id: &str, volume: f32, muted: bool) {
        self.change_with_context(id, volume, muted, EventContext::NONE);
    }

    /// Simulate a change tagged with an arbitrary event context.
    pub fn change_with_context(&self, id: &str, volume: f32, muted: bool, context: EventContext) {
        if let Ok(device) = self.inner.borrow_mut().device_mut(id) {
            device.volume = clamp_volume(volume);
            device.muted = muted;
            device.notify(context);
        }
    }

    /// Current volume and mute of a device.
    pub fn volume_state(&self, id: &str) -> Option<VolumeState> {
        self.inner
            .borrow()
            .device(id)
            .ok()
            .map(|d| VolumeState::new(d.volume, d.muted))
    }

    pub fn set_faults(&self, id: &str, faults: DeviceFaults) {
        if let Ok(device) = self.inner.borrow_mut().device_mut(id) {
            device.faults = faults;
        }
    }

    pub fn fail_enumeration(&self, fail: bool) {
        self.inner.borrow_mut().fail_enumeration = fail;
    }

    /// Override the device count the subsystem claims to have.
    pub fn set_reported_count(&self, count: Option<usize>) {
        self.inner.borrow_mut().reported_count = count;
    }

    /// Number of change-notification registrations held on a device.
    pub fn listener_count(&self, id: &str) -> usize {
        self.inner
            .borrow()
            .device(id)
            .map(|d| d.listeners.len())
            .unwrap_or(0)
    }

    /// Writes a device has received, oldest first.
    pub fn writes(&self, id: &str) -> Vec<MockWrite> {
        self.inner
            .borrow()
            .device(id)
            .map(|d| d.writes.clone())
            .unwrap_or_default()
    }

    pub fn clear_writes(&self, id: &str) {
        if let Ok(device) = self.inner.borrow_mut().device_mut(id) {
            device.writes.clear();
        }
    }
}

/// [`AudioBackend`] over a [`MockAudioSystem`].
#[derive(Debug, Clone)]
pub struct MockBackend {
    system: MockAudioSystem,
}

impl AudioBackend for MockBackend {
    type Volume = MockEndpointVolume;

    fn enumerate_render_endpoints(&self) -> Result<RenderEndpoints, AudioError> {
        let state = self.system.inner.borrow();
        if state.fail_enumeration {
            return Err(AudioError::failed("audio service not responding"));
        }

        let endpoints: Vec<EndpointInfo> = state
            .devices
            .iter()
            .filter(|d| d.state.is_linkable())
            .map(|d| EndpointInfo::new(d.id.clone(), d.name.clone()))
            .collect();

        Ok(RenderEndpoints {
            reported_count: state.reported_count.unwrap_or(endpoints.len()),
            endpoints,
        })
    }

    fn activate_volume(&self, endpoint: &AudioEndpoint) -> Result<MockEndpointVolume, AudioError> {
        let state = self.system.inner.borrow();
        let device = state.device(endpoint.id())?;
        if device.faults.activate {
            return Err(AudioError::VolumeNotAvailable);
        }

        Ok(MockEndpointVolume {
            system: self.system.clone(),
            device_id: device.id.clone(),
            registration: None,
        })
    }
}

/// Volume-control handle on a simulated device.
#[derive(Debug)]
pub struct MockEndpointVolume {
    system: MockAudioSystem,
    device_id: String,
    registration: Option<u64>,
}

impl MockEndpointVolume {
    fn with_device<T>(
        &self,
        f: impl FnOnce(&mut MockDevice) -> Result<T, AudioError>,
    ) -> Result<T, AudioError> {
        let mut state = self.system.inner.borrow_mut();
        f(state.device_mut(&self.device_id)?)
    }
}

impl EndpointVolume for MockEndpointVolume {
    fn volume(&self) -> Result<f32, AudioError> {
        self.with_device(|d| {
            if d.faults.read_volume {
                return Err(AudioError::failed("volume read failed"));
            }
            Ok(d.volume)
        })
    }

    fn is_muted(&self) -> Result<bool, AudioError> {
        self.with_device(|d| {
            if d.faults.read_mute {
                return Err(AudioError::failed("mute read failed"));
            }
            Ok(d.muted)
        })
    }

    fn set_volume(&self, level: f32, context: EventContext) -> Result<(), AudioError> {
        self.with_device(|d| {
            if d.faults.write {
                return Err(AudioError::failed("volume write failed"));
            }
            d.volume = clamp_volume(level);
            d.writes.push(MockWrite::Volume(d.volume, context));
            d.notify(context);
            Ok(())
        })
    }

    fn set_mute(&self, muted: bool, context: EventContext) -> Result<(), AudioError> {
        self.with_device(|d| {
            if d.faults.write {
                return Err(AudioError::failed("mute write failed"));
            }
            d.muted = muted;
            d.writes.push(MockWrite::Mute(muted, context));
            d.notify(context);
            Ok(())
        })
    }

    fn register_change_notify(&mut self, sender: NotificationSender) -> Result<(), AudioError> {
        self.unregister_change_notify();

        let mut state = self.system.inner.borrow_mut();
        let registration = state.next_registration;
        let device = state.device_mut(&self.device_id)?;
        if device.faults.register {
            return Err(AudioError::failed("callback registration failed"));
        }
        device.listeners.push((registration, sender));
        state.next_registration += 1;
        drop(state);

        self.registration = Some(registration);
        Ok(())
    }

    fn unregister_change_notify(&mut self) {
        if let Some(registration) = self.registration.take() {
            if let Ok(device) = self.system.inner.borrow_mut().device_mut(&self.device_id) {
                device.listeners.retain(|(id, _)| *id != registration);
            }
        }
    }
}

impl Drop for MockEndpointVolume {
    fn drop(&mut self) {
        self.unregister_change_notify();
    }
}

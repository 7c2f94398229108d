//! Windows Core Audio backend.
//!
//! Provides COM initialization and rendering-endpoint enumeration using the
//! MMDevice API.

mod notifications;
mod volume;

pub use notifications::WM_VOLUME_NOTIFY;
pub use volume::WasapiEndpointVolume;

use super::backend::AudioBackend;
use super::device::{AudioEndpoint, AudioError, EndpointInfo, RenderEndpoints};
use std::cmp::Ordering;
use windows::core::{PCWSTR, PWSTR};
use windows::Win32::Devices::Properties::DEVPKEY_Device_FriendlyName;
use windows::Win32::Foundation::{HWND, LPARAM};
use windows::Win32::Globalization::{
    CompareStringEx, CSTR_EQUAL, CSTR_GREATER_THAN, CSTR_LESS_THAN, LINGUISTIC_IGNORECASE,
};
use windows::Win32::Media::Audio::{
    eRender, IMMDevice, IMMDeviceEnumerator, MMDeviceEnumerator, DEVICE_STATE,
    DEVICE_STATE_ACTIVE, DEVICE_STATE_UNPLUGGED,
};
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoTaskMemFree, CoUninitialize, CLSCTX_ALL,
    COINIT_APARTMENTTHREADED, STGM,
};
use windows::Win32::UI::Shell::PropertiesSystem::{IPropertyStore, PROPERTYKEY};

/// COM initialization guard that uninitializes COM on drop.
pub struct ComGuard {
    initialized: bool,
}

impl ComGuard {
    /// Initialize COM for the current thread.
    pub fn new() -> Result<Self, AudioError> {
        unsafe {
            // Apartment-threaded: notifications are dispatched from the message loop
            CoInitializeEx(None, COINIT_APARTMENTTHREADED)
                .ok()
                .map_err(AudioError::from)?;
        }
        Ok(Self { initialized: true })
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        if self.initialized {
            unsafe {
                CoUninitialize();
            }
        }
    }
}

/// Rendering-endpoint backend using the Windows MMDevice API.
pub struct WasapiBackend {
    enumerator: IMMDeviceEnumerator,
    notify_hwnd: Option<HWND>,
}

impl WasapiBackend {
    /// Create a new backend.
    ///
    /// Volume notifications are queued for the link controller; when
    /// `notify_hwnd` is set, a [`WM_VOLUME_NOTIFY`] message is posted to it
    /// for every queued notification so the owning thread can pump them.
    ///
    /// Note: COM must be initialized before calling this function.
    pub fn new(notify_hwnd: Option<HWND>) -> Result<Self, AudioError> {
        unsafe {
            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)?;

            Ok(Self {
                enumerator,
                notify_hwnd,
            })
        }
    }

    /// Look up an IMMDevice by ID.
    fn device(&self, device_id: &str) -> Result<IMMDevice, AudioError> {
        let device_id_wide: Vec<u16> = device_id.encode_utf16().chain(std::iter::once(0)).collect();

        unsafe {
            self.enumerator
                .GetDevice(PCWSTR::from_raw(device_id_wide.as_ptr()))
                .map_err(|_| AudioError::DeviceNotFound {
                    device_id: device_id.to_string(),
                })
        }
    }

    /// Read the ID and friendly name of a device.
    fn endpoint_info(&self, device: &IMMDevice) -> Result<EndpointInfo, AudioError> {
        unsafe {
            let id = device.GetId()?;
            let id_string = take_co_string(id)?;

            let props: IPropertyStore = device.OpenPropertyStore(STGM(0))?; // STGM_READ = 0
            let name = Self::device_name(&props)?;

            Ok(EndpointInfo::new(id_string, name))
        }
    }

    /// Get the friendly name of a device from its property store.
    ///
    /// An unset name comes back empty and is rejected by the catalog.
    fn device_name(props: &IPropertyStore) -> Result<String, AudioError> {
        unsafe {
            // Convert DEVPROPKEY to PROPERTYKEY
            let key = PROPERTYKEY {
                fmtid: DEVPKEY_Device_FriendlyName.fmtid,
                pid: DEVPKEY_Device_FriendlyName.pid,
            };

            let prop = props.GetValue(&key)?;
            Ok(prop.to_string())
        }
    }
}

impl AudioBackend for WasapiBackend {
    type Volume = WasapiEndpointVolume;

    fn enumerate_render_endpoints(&self) -> Result<RenderEndpoints, AudioError> {
        unsafe {
            // Disabled and not-present devices cannot be linked
            let states = DEVICE_STATE(DEVICE_STATE_ACTIVE.0 | DEVICE_STATE_UNPLUGGED.0);
            let collection = self.enumerator.EnumAudioEndpoints(eRender, states)?;
            let count = collection.GetCount()? as usize;

            let mut endpoints = Vec::with_capacity(count);
            for i in 0..count {
                let device = collection.Item(i as u32)?;
                endpoints.push(self.endpoint_info(&device)?);
            }

            Ok(RenderEndpoints {
                reported_count: count,
                endpoints,
            })
        }
    }

    fn activate_volume(&self, endpoint: &AudioEndpoint) -> Result<WasapiEndpointVolume, AudioError> {
        let device = self.device(endpoint.id())?;
        WasapiEndpointVolume::new(&device, endpoint.id(), self.notify_hwnd)
    }

    fn compare_names(&self, a: &str, b: &str) -> Ordering {
        let a_wide: Vec<u16> = a.encode_utf16().collect();
        let b_wide: Vec<u16> = b.encode_utf16().collect();

        // NULL locale name = user default locale
        let result = unsafe {
            CompareStringEx(
                PCWSTR::null(),
                LINGUISTIC_IGNORECASE,
                &a_wide,
                &b_wide,
                None,
                None,
                LPARAM(0),
            )
        };

        match result {
            CSTR_LESS_THAN => Ordering::Less,
            CSTR_EQUAL => Ordering::Equal,
            CSTR_GREATER_THAN => Ordering::Greater,
            _ => a.to_lowercase().cmp(&b.to_lowercase()),
        }
    }
}

/// Convert a CoTaskMem-allocated string and free it.
unsafe fn take_co_string(value: PWSTR) -> Result<String, AudioError> {
    let converted = value
        .to_string()
        .map_err(|e| AudioError::StringConversion(e.to_string()));
    CoTaskMemFree(Some(value.0 as *const _));
    converted
}

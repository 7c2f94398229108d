//! Volume control using IAudioEndpointVolume.
//!
//! Provides volume and mute control plus change-notification registration
//! for a single rendering endpoint.

use super::notifications::VolumeCallback;
use crate::audio::backend::{EndpointVolume, NotificationSender};
use crate::audio::device::{clamp_volume, AudioError, EventContext};
use tracing::warn;
use windows::core::GUID;
use windows::Win32::Foundation::HWND;
use windows::Win32::Media::Audio::Endpoints::{IAudioEndpointVolume, IAudioEndpointVolumeCallback};
use windows::Win32::Media::Audio::IMMDevice;
use windows::Win32::System::Com::CLSCTX_ALL;

/// Volume controller for a specific device.
pub struct WasapiEndpointVolume {
    endpoint_volume: IAudioEndpointVolume,
    endpoint_id: String,
    notify_hwnd: Option<HWND>,
    callback: Option<IAudioEndpointVolumeCallback>,
}

impl WasapiEndpointVolume {
    /// Create a new controller for the given device.
    pub fn new(
        device: &IMMDevice,
        endpoint_id: &str,
        notify_hwnd: Option<HWND>,
    ) -> Result<Self, AudioError> {
        unsafe {
            let endpoint_volume: IAudioEndpointVolume = device
                .Activate(CLSCTX_ALL, None)
                .map_err(|_| AudioError::VolumeNotAvailable)?;

            Ok(Self {
                endpoint_volume,
                endpoint_id: endpoint_id.to_string(),
                notify_hwnd,
                callback: None,
            })
        }
    }
}

impl EndpointVolume for WasapiEndpointVolume {
    fn volume(&self) -> Result<f32, AudioError> {
        unsafe { Ok(self.endpoint_volume.GetMasterVolumeLevelScalar()?) }
    }

    fn is_muted(&self) -> Result<bool, AudioError> {
        unsafe { Ok(self.endpoint_volume.GetMute()?.as_bool()) }
    }

    fn set_volume(&self, level: f32, context: EventContext) -> Result<(), AudioError> {
        let guid = GUID::from_u128(context.as_u128());
        unsafe {
            self.endpoint_volume
                .SetMasterVolumeLevelScalar(clamp_volume(level), &guid)?;
        }
        Ok(())
    }

    fn set_mute(&self, muted: bool, context: EventContext) -> Result<(), AudioError> {
        let guid = GUID::from_u128(context.as_u128());
        unsafe {
            self.endpoint_volume.SetMute(muted, &guid)?;
        }
        Ok(())
    }

    fn register_change_notify(&mut self, sender: NotificationSender) -> Result<(), AudioError> {
        self.unregister_change_notify();

        let callback: IAudioEndpointVolumeCallback =
            VolumeCallback::new(self.endpoint_id.clone(), sender, self.notify_hwnd).into();
        unsafe {
            self.endpoint_volume.RegisterControlChangeNotify(&callback)?;
        }

        self.callback = Some(callback);
        Ok(())
    }

    fn unregister_change_notify(&mut self) {
        if let Some(callback) = self.callback.take() {
            unsafe {
                if let Err(e) = self.endpoint_volume.UnregisterControlChangeNotify(&callback) {
                    warn!(error = %e, endpoint = %self.endpoint_id, "Failed to unregister volume callback");
                }
            }
        }
    }
}

impl Drop for WasapiEndpointVolume {
    fn drop(&mut self) {
        self.unregister_change_notify();
    }
}

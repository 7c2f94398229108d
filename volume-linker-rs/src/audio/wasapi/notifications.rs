//! Volume change notifications using IAudioEndpointVolumeCallback.
//!
//! The callback runs on a Core Audio worker thread. It only queues the
//! notification and wakes the owning thread; the link controller handles it
//! from the message loop.

use crate::audio::backend::NotificationSender;
use crate::audio::device::{EventContext, VolumeNotification, VolumeState};
use windows::core::implement;
use windows::Win32::Foundation::{E_INVALIDARG, HWND, LPARAM, WPARAM};
use windows::Win32::Media::Audio::Endpoints::{
    IAudioEndpointVolumeCallback, IAudioEndpointVolumeCallback_Impl,
};
use windows::Win32::Media::Audio::AUDIO_VOLUME_NOTIFICATION_DATA;
use windows::Win32::UI::WindowsAndMessaging::{PostMessageW, WM_APP};
// Re-export windows_core so the implement macro can find it
#[allow(unused_imports)]
use windows_core;

/// Posted to the notify window whenever a volume notification is queued.
pub const WM_VOLUME_NOTIFY: u32 = WM_APP + 1;

/// Callback that forwards endpoint volume changes to a channel.
#[implement(IAudioEndpointVolumeCallback)]
pub(super) struct VolumeCallback {
    endpoint_id: String,
    sender: NotificationSender,
    // Raw HWND value; the callback is invoked off the owning thread
    notify_hwnd: Option<isize>,
}

impl VolumeCallback {
    pub(super) fn new(endpoint_id: String, sender: NotificationSender, notify_hwnd: Option<HWND>) -> Self {
        Self {
            endpoint_id,
            sender,
            notify_hwnd: notify_hwnd.map(|hwnd| hwnd.0 as isize),
        }
    }
}

impl IAudioEndpointVolumeCallback_Impl for VolumeCallback_Impl {
    fn OnNotify(&self, pnotify: *mut AUDIO_VOLUME_NOTIFICATION_DATA) -> windows::core::Result<()> {
        let Some(data) = (unsafe { pnotify.as_ref() }) else {
            return Err(E_INVALIDARG.into());
        };

        let notification = VolumeNotification {
            endpoint_id: self.endpoint_id.clone(),
            state: VolumeState::new(data.fMasterVolume, data.bMuted.as_bool()),
            context: EventContext::from_u128(data.guidEventContext.to_u128()),
        };

        // Receiver is gone once the controller has been dropped
        if self.sender.send(notification).is_ok() {
            if let Some(hwnd) = self.notify_hwnd {
                unsafe {
                    let _ = PostMessageW(
                        HWND(hwnd as *mut std::ffi::c_void),
                        WM_VOLUME_NOTIFY,
                        WPARAM(0),
                        LPARAM(0),
                    );
                }
            }
        }

        Ok(())
    }
}

//! Platform audio seam.
//!
//! The catalog and the link controller only talk to the audio subsystem
//! through these traits, so the same synchronization logic runs against
//! Windows Core Audio and the in-memory mock.

use super::device::{AudioEndpoint, AudioError, EventContext, RenderEndpoints, VolumeNotification, VolumeState};
use std::cmp::Ordering;
use std::sync::mpsc::{Receiver, Sender};

/// Channel half that change notifications are delivered into.
pub type NotificationSender = Sender<VolumeNotification>;

/// Creates a notification channel.
pub fn create_notification_channel() -> (NotificationSender, Receiver<VolumeNotification>) {
    std::sync::mpsc::channel()
}

/// Access to the rendering endpoints of an audio subsystem.
pub trait AudioBackend {
    /// Live volume-control handle produced by [`AudioBackend::activate_volume`].
    type Volume: EndpointVolume;

    /// Enumerate rendering endpoints that are active or unplugged, in discovery order.
    fn enumerate_render_endpoints(&self) -> Result<RenderEndpoints, AudioError>;

    /// Open the volume control of an endpoint.
    fn activate_volume(&self, endpoint: &AudioEndpoint) -> Result<Self::Volume, AudioError>;

    /// Case-insensitive collation of display names.
    fn compare_names(&self, a: &str, b: &str) -> Ordering {
        a.to_lowercase().cmp(&b.to_lowercase())
    }
}

/// Volume control of a single endpoint.
///
/// Implementations must drop any change-notification registration when the
/// handle itself is dropped.
pub trait EndpointVolume {
    /// Get the current volume level (0.0 to 1.0).
    fn volume(&self) -> Result<f32, AudioError>;

    /// Get the current mute state.
    fn is_muted(&self) -> Result<bool, AudioError>;

    /// Set the volume level (0.0 to 1.0), tagged with `context`.
    fn set_volume(&self, level: f32, context: EventContext) -> Result<(), AudioError>;

    /// Set the mute state, tagged with `context`.
    fn set_mute(&self, muted: bool, context: EventContext) -> Result<(), AudioError>;

    /// Start delivering change notifications for this endpoint into `sender`.
    fn register_change_notify(&mut self, sender: NotificationSender) -> Result<(), AudioError>;

    /// Stop delivering change notifications. Safe to call when not registered.
    fn unregister_change_notify(&mut self);

    /// Read volume and mute together.
    fn state(&self) -> Result<VolumeState, AudioError> {
        let muted = self.is_muted()?;
        let volume = self.volume()?;
        Ok(VolumeState::new(volume, muted))
    }

    /// Apply volume and mute together. Stops at the first failure.
    fn apply(&self, state: VolumeState, context: EventContext) -> Result<(), AudioError> {
        self.set_volume(state.volume, context)?;
        self.set_mute(state.muted, context)
    }
}

/// Receives change notifications for a subscribed endpoint.
pub trait EndpointVolumeListener {
    fn on_endpoint_changed(&mut self, notification: &VolumeNotification);
}

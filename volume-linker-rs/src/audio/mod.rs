//! Audio module: device catalog and master/slave volume link.
//!
//! The core talks to the audio subsystem through the traits in [`backend`].
//! On Windows the [`wasapi`] module implements them over Core Audio; the
//! [`mock`] module implements them in memory.

pub mod backend;
pub mod catalog;
pub mod device;
pub mod link;
pub mod mock;
#[cfg(windows)]
pub mod wasapi;

pub use backend::{AudioBackend, EndpointVolume, EndpointVolumeListener, NotificationSender};
pub use catalog::Catalog;
pub use device::{
    AudioEndpoint, AudioError, DeviceState, EndpointInfo, EventContext, LinkError,
    RenderEndpoints, VolumeNotification, VolumeState, SLIDER_MAX,
};
pub use link::{LinkController, LinkObserver};

//! Audio device data models.
//!
//! Defines the core data structures for representing rendering endpoints,
//! their volume state, change notifications, and related errors.

use thiserror::Error;
use uuid::Uuid;

/// Maximum position of a UI volume slider.
pub const SLIDER_MAX: u32 = 100;

/// A rendering endpoint as it appears in the device catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioEndpoint {
    /// Unique Windows device ID (opaque string from IMMDevice::GetId)
    id: String,

    /// Human-readable device name (not guaranteed to be unique)
    name: String,

    /// Position within the sorted catalog
    index: usize,

    /// Position in which the audio subsystem reported the device
    discovery_index: usize,
}

impl AudioEndpoint {
    pub(crate) fn new(id: String, name: String, index: usize, discovery_index: usize) -> Self {
        Self {
            id,
            name,
            index,
            discovery_index,
        }
    }

    /// Stable, opaque identifier suitable for persisting a selection.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position in the catalog. Only meaningful for the enumeration that produced it.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Position in the raw enumeration, before sorting.
    pub fn discovery_index(&self) -> usize {
        self.discovery_index
    }
}

/// Raw endpoint information as reported by an audio backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointInfo {
    pub id: String,
    pub name: String,
}

impl EndpointInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Result of a single enumeration pass over the rendering endpoints.
#[derive(Debug, Clone, Default)]
pub struct RenderEndpoints {
    /// Number of devices the audio subsystem claimed to have
    pub reported_count: usize,

    /// Devices that were actually resolved, in discovery order
    pub endpoints: Vec<EndpointInfo>,
}

impl RenderEndpoints {
    /// An enumeration where every reported device was resolved.
    pub fn complete(endpoints: Vec<EndpointInfo>) -> Self {
        Self {
            reported_count: endpoints.len(),
            endpoints,
        }
    }
}

/// Volume and mute state of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeState {
    /// Volume level as scalar (0.0 to 1.0)
    pub volume: f32,

    /// Current mute state
    pub muted: bool,
}

impl VolumeState {
    /// Create a new state, clamping the volume into 0.0..=1.0.
    pub fn new(volume: f32, muted: bool) -> Self {
        Self {
            volume: clamp_volume(volume),
            muted,
        }
    }

    /// Slider position for a slider ranging over `0..=max`.
    ///
    /// Halves round up; the result is clamped to the slider range.
    pub fn slider_position(&self, max: u32) -> u32 {
        let scaled = (self.volume * max as f32).round();
        if scaled.is_nan() || scaled <= 0.0 {
            0
        } else if scaled >= max as f32 {
            max
        } else {
            scaled as u32
        }
    }

    /// Volume scalar for a slider position in `0..=max`.
    pub fn volume_from_slider(position: i64, max: u32) -> f32 {
        if max == 0 {
            return 0.0;
        }
        let position = position.clamp(0, i64::from(max));
        position as f32 / max as f32
    }
}

/// Clamp a volume scalar into 0.0..=1.0. NaN becomes 0.0.
pub(crate) fn clamp_volume(level: f32) -> f32 {
    if level.is_nan() {
        0.0
    } else {
        level.clamp(0.0, 1.0)
    }
}

/// Correlation token attached to volume changes.
///
/// Each controller uses its own random token so that notifications caused by
/// its own writes can be told apart from changes made elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventContext(u128);

impl EventContext {
    /// Token used by system-triggered changes such as hardware volume keys.
    pub const NONE: EventContext = EventContext(0);

    /// Generate a fresh random token.
    pub fn generate() -> Self {
        loop {
            let value = Uuid::new_v4().as_u128();
            if value != 0 {
                return Self(value);
            }
        }
    }

    pub const fn from_u128(value: u128) -> Self {
        Self(value)
    }

    pub const fn as_u128(&self) -> u128 {
        self.0
    }

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

/// A volume or mute change reported by the audio subsystem.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeNotification {
    /// Endpoint whose state changed
    pub endpoint_id: String,

    /// New volume and mute state
    pub state: VolumeState,

    /// Token of whoever triggered the change
    pub context: EventContext,
}

/// Windows device state flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Device is active and available for use
    Active,

    /// Device is disabled in Windows Sound settings
    Disabled,

    /// Device is not present (driver issue)
    NotPresent,

    /// Device is unplugged (for pluggable devices)
    Unplugged,
}

impl DeviceState {
    /// Whether devices in this state take part in the catalog.
    pub fn is_linkable(&self) -> bool {
        matches!(self, DeviceState::Active | DeviceState::Unplugged)
    }
}

/// Audio subsystem error types.
#[derive(Debug, Clone, Error)]
pub enum AudioError {
    #[error("Device not found: {device_id}")]
    DeviceNotFound { device_id: String },

    #[error("Volume control not available for device")]
    VolumeNotAvailable,

    #[error("Only {resolved} of {reported} audio devices could be retrieved")]
    IncompleteEnumeration { reported: usize, resolved: usize },

    #[error("Device reported more than once: {device_id}")]
    DuplicateDevice { device_id: String },

    #[error("Unable to get name of audio endpoint: {device_id}")]
    MissingName { device_id: String },

    #[error("String conversion error: {0}")]
    StringConversion(String),

    #[error("Audio subsystem call failed ({code:#010x}): {message}")]
    Platform { code: i32, message: String },
}

impl AudioError {
    /// Generic failure for backends without a native error code.
    pub fn failed(message: impl Into<String>) -> Self {
        AudioError::Platform {
            // E_FAIL
            code: 0x8000_4005_u32 as i32,
            message: message.into(),
        }
    }
}

#[cfg(windows)]
impl From<windows::core::Error> for AudioError {
    fn from(err: windows::core::Error) -> Self {
        AudioError::Platform {
            code: err.code().0,
            message: err.message().to_string(),
        }
    }
}

/// Errors surfaced by the device catalog and the link controller.
#[derive(Debug, Clone, Error)]
pub enum LinkError {
    #[error("Unable to enumerate audio devices: {0}")]
    Enumeration(#[source] AudioError),

    #[error("No audio devices found")]
    EmptyCatalog,

    #[error("Invalid device number requested: {index} (catalog has {len} devices)")]
    InvalidIndex { index: usize, len: usize },

    #[error("Cannot link device to itself")]
    SelfLink,

    #[error("Unable to open volume control for \"{device}\": {source}")]
    Activation {
        device: String,
        #[source]
        source: AudioError,
    },

    #[error("Unable to register master volume callback: {0}")]
    Subscription(#[source] AudioError),

    #[error("Failed to retrieve master device's volume state: {0}")]
    StateRead(#[source] AudioError),

    #[error("Failed to sync master volume to slave device: {0}")]
    Sync(#[source] AudioError),
}

//! FFI bindings for Volume Linker.
//!
//! This crate provides C ABI functions for a foreign-language UI host (for
//! example C# via P/Invoke). All functions use panic::catch_unwind to prevent
//! Rust panics from unwinding across the FFI boundary.
//!
//! The engine owns one link controller. Callbacks fire on the thread that
//! calls into the engine, while the engine is busy: calls made from inside a
//! callback with the same handle fail with `InvalidHandle`.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::ffi::{c_char, c_void, CStr, CString};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::rc::Rc;
use tracing::{error, warn};
use volume_linker_rs::{
    AudioBackend, AudioError, LinkController, LinkError, LinkObserver, LinkSettings, VolumeState,
};

// ============================================================================
// Error Handling
// ============================================================================

/// Error codes returned by FFI functions.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Success = 0,
    InvalidHandle = -1,
    InvalidArgument = -2,
    DeviceNotFound = -3,
    ComError = -4,
    JsonError = -5,
    VolumeNotAvailable = -6,
    EnumerationFailed = -10,
    NoDevices = -11,
    InvalidIndex = -12,
    SelfLink = -13,
    ActivationFailed = -14,
    SubscriptionFailed = -15,
    StateReadFailed = -16,
    SyncFailed = -17,
    WriteFailed = -18,
    Panic = -99,
}

impl From<&AudioError> for ErrorCode {
    fn from(err: &AudioError) -> Self {
        match err {
            AudioError::DeviceNotFound { .. } => ErrorCode::DeviceNotFound,
            AudioError::VolumeNotAvailable => ErrorCode::VolumeNotAvailable,
            AudioError::IncompleteEnumeration { .. }
            | AudioError::DuplicateDevice { .. }
            | AudioError::MissingName { .. } => ErrorCode::EnumerationFailed,
            AudioError::StringConversion(_) | AudioError::Platform { .. } => ErrorCode::ComError,
        }
    }
}

impl From<&LinkError> for ErrorCode {
    fn from(err: &LinkError) -> Self {
        match err {
            LinkError::Enumeration(_) => ErrorCode::EnumerationFailed,
            LinkError::EmptyCatalog => ErrorCode::NoDevices,
            LinkError::InvalidIndex { .. } => ErrorCode::InvalidIndex,
            LinkError::SelfLink => ErrorCode::SelfLink,
            LinkError::Activation { .. } => ErrorCode::ActivationFailed,
            LinkError::Subscription(_) => ErrorCode::SubscriptionFailed,
            LinkError::StateRead(_) => ErrorCode::StateReadFailed,
            LinkError::Sync(_) => ErrorCode::SyncFailed,
        }
    }
}

/// An error code with its message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfiError {
    pub code: ErrorCode,
    pub message: String,
}

impl FfiError {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<LinkError> for FfiError {
    fn from(err: LinkError) -> Self {
        Self::new(ErrorCode::from(&err), err.to_string())
    }
}

impl From<AudioError> for FfiError {
    fn from(err: AudioError) -> Self {
        Self::new(ErrorCode::from(&err), err.to_string())
    }
}

impl From<serde_json::Error> for FfiError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorCode::JsonError, err.to_string())
    }
}

/// Thread-local storage for the last error.
thread_local! {
    static LAST_ERROR: RefCell<Option<(ErrorCode, String)>> = const { RefCell::new(None) };
}

fn set_last_error(code: ErrorCode, message: impl Into<String>) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = Some((code, message.into()));
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Run an FFI entry point: clear the last error, catch panics and record
/// any failure as the last error.
fn ffi_call<T>(operation: &str, f: impl FnOnce() -> Result<T, FfiError>) -> Result<T, ErrorCode> {
    clear_last_error();

    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            warn!(operation, code = ?e.code, error = %e.message, "FFI call failed");
            set_last_error(e.code, e.message);
            Err(e.code)
        }
        Err(_) => {
            error!(operation, "Panic caught at FFI boundary");
            set_last_error(ErrorCode::Panic, format!("Panic during {operation}"));
            Err(ErrorCode::Panic)
        }
    }
}

/// 0 on success, the negative error code otherwise.
#[cfg_attr(not(windows), allow(dead_code))]
fn status_code(result: Result<(), ErrorCode>) -> i32 {
    match result {
        Ok(()) => ErrorCode::Success as i32,
        Err(code) => code as i32,
    }
}

// ============================================================================
// Data Types for JSON Serialization
// ============================================================================

/// Configuration for engine creation.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// tracing filter directive, e.g. "info" or "volume_linker_rs=debug"
    #[serde(default)]
    pub log_level: Option<String>,

    /// Window to receive a WM_APP + 1 message whenever notifications are
    /// queued; the host answers it with volume_linker_pump_notifications.
    #[serde(default)]
    pub notify_hwnd: Option<isize>,
}

/// An output device at its catalog position.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeviceDto {
    pub index: usize,
    pub id: String,
    pub name: String,
}

/// Response containing the device catalog.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeviceListResponse {
    pub devices: Vec<DeviceDto>,
}

/// Saved settings resolved against the catalog. -1 means no device.
#[derive(Debug, Serialize, Deserialize)]
pub struct SelectionDto {
    pub master: i64,
    pub slave: i64,
    pub link_active: bool,
}

fn position_to_i64(position: Option<usize>) -> i64 {
    position.map_or(-1, |p| p as i64)
}

fn index_from_ffi(index: i32) -> Result<usize, FfiError> {
    usize::try_from(index).map_err(|_| {
        FfiError::new(
            ErrorCode::InvalidIndex,
            format!("Invalid device number requested: {index}"),
        )
    })
}

fn optional_index_from_ffi(index: i32) -> Option<usize> {
    usize::try_from(index).ok()
}

// ============================================================================
// Host Callbacks
// ============================================================================

/// Called with the new master volume (0.0 to 1.0) and mute state (1 = muted).
pub type VolumeChangedCallback = Option<extern "C" fn(user_data: *mut c_void, volume: f32, muted: i32)>;

/// Called with an error code and message after the link failed and was removed.
/// The message is only valid during the call.
pub type FatalFailureCallback =
    Option<extern "C" fn(user_data: *mut c_void, code: i32, message: *const c_char)>;

/// Forwards controller callbacks to the host.
struct CallbackObserver {
    on_changed: VolumeChangedCallback,
    on_fatal: FatalFailureCallback,
    user_data: *mut c_void,
}

impl LinkObserver for CallbackObserver {
    fn on_volume_or_mute_changed(&self, state: VolumeState) {
        if let Some(callback) = self.on_changed {
            callback(self.user_data, state.volume, state.muted as i32);
        }
    }

    fn on_fatal_sync_failure(&self, error: &LinkError) {
        if let Some(callback) = self.on_fatal {
            let message = to_c_string(&error.to_string());
            callback(self.user_data, ErrorCode::from(error) as i32, message.as_ptr());
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Opaque handle to the engine.
pub type VolumeLinkerHandle = *mut c_void;

/// Link controller plus the JSON views the host needs.
pub struct Engine<B: AudioBackend> {
    controller: LinkController<B>,
}

impl<B: AudioBackend> Engine<B> {
    pub fn new(mut controller: LinkController<B>, observer: Option<Rc<dyn LinkObserver>>) -> Self {
        if let Some(observer) = observer {
            controller.set_observer(observer);
        }
        Self { controller }
    }

    pub fn controller(&self) -> &LinkController<B> {
        &self.controller
    }

    pub fn devices_json(&self) -> Result<String, FfiError> {
        let response = DeviceListResponse {
            devices: self
                .controller
                .catalog()
                .iter()
                .map(|endpoint| DeviceDto {
                    index: endpoint.index(),
                    id: endpoint.id().to_string(),
                    name: endpoint.name().to_string(),
                })
                .collect(),
        };
        Ok(serde_json::to_string(&response)?)
    }

    pub fn link(&mut self, master: i32, slave: i32) -> Result<(), FfiError> {
        let master = index_from_ffi(master);
        let slave = index_from_ffi(slave);
        match (master, slave) {
            (Ok(master), Ok(slave)) => Ok(self.controller.link(master, slave)?),
            (Err(e), _) | (_, Err(e)) => {
                // Linking always replaces the current link, even when it fails
                self.controller.unlink();
                Err(e)
            }
        }
    }

    pub fn unlink(&mut self) {
        self.controller.unlink();
    }

    pub fn master_index(&self) -> i32 {
        self.controller
            .current_master_index()
            .map_or(-1, |index| index as i32)
    }

    pub fn slave_index(&self) -> i32 {
        self.controller
            .current_slave_index()
            .map_or(-1, |index| index as i32)
    }

    pub fn set_master_volume(&self, level: f32) -> Result<(), FfiError> {
        if self.controller.set_master_volume(level) {
            Ok(())
        } else {
            Err(FfiError::new(ErrorCode::WriteFailed, "Failed to set master volume"))
        }
    }

    pub fn set_master_mute(&self, muted: bool) -> Result<(), FfiError> {
        if self.controller.set_master_mute(muted) {
            Ok(())
        } else {
            Err(FfiError::new(ErrorCode::WriteFailed, "Failed to set master mute"))
        }
    }

    pub fn pump_notifications(&mut self) -> usize {
        self.controller.pump_notifications()
    }

    /// Resolve saved settings (as JSON) against the catalog.
    pub fn resolve_settings_json(&self, settings_json: &str) -> Result<String, FfiError> {
        let settings: LinkSettings = serde_json::from_str(settings_json)?;
        let saved = settings.resolve(self.controller.catalog());
        let selection = SelectionDto {
            master: position_to_i64(saved.master),
            slave: position_to_i64(saved.slave),
            link_active: saved.link_active,
        };
        Ok(serde_json::to_string(&selection)?)
    }

    /// Settings (as JSON) for a selection. Negative positions mean no device.
    pub fn settings_json(&self, master: i32, slave: i32, linked: bool) -> Result<String, FfiError> {
        let settings = LinkSettings::from_selection(
            self.controller.catalog(),
            optional_index_from_ffi(master),
            optional_index_from_ffi(slave),
            linked,
        );
        Ok(serde_json::to_string(&settings)?)
    }
}

/// An engine behind a handle.
///
/// Only shared references to the slot are handed out; the engine itself is
/// borrowed for the length of one call, so a call from inside a callback
/// finds it busy.
pub struct EngineSlot<B: AudioBackend> {
    engine: RefCell<Engine<B>>,
}

impl<B: AudioBackend> EngineSlot<B> {
    pub fn new(engine: Engine<B>) -> Self {
        Self {
            engine: RefCell::new(engine),
        }
    }

    /// Run `f` on the engine. Fails with `InvalidHandle` while another call
    /// on the same engine is in progress.
    pub fn with<R>(
        &self,
        f: impl FnOnce(&mut Engine<B>) -> Result<R, FfiError>,
    ) -> Result<R, FfiError> {
        let mut engine = self.engine.try_borrow_mut().map_err(|_| {
            FfiError::new(
                ErrorCode::InvalidHandle,
                "Engine called from inside one of its own callbacks",
            )
        })?;
        f(&mut *engine)
    }

    pub fn is_busy(&self) -> bool {
        self.engine.try_borrow_mut().is_err()
    }
}

#[cfg(windows)]
mod hosted {
    use super::EngineSlot;
    use volume_linker_rs::audio::wasapi::{ComGuard, WasapiBackend};

    /// Engine on the Windows audio subsystem.
    pub struct HostedEngine {
        pub slot: EngineSlot<WasapiBackend>,
        // Dropped after the engine
        pub _com: ComGuard,
    }
}

#[cfg(windows)]
use hosted::HostedEngine;

#[cfg(windows)]
unsafe fn engine_ref<'a>(handle: VolumeLinkerHandle) -> Result<&'a HostedEngine, FfiError> {
    if handle.is_null() {
        return Err(FfiError::new(ErrorCode::InvalidHandle, "Null engine handle"));
    }
    Ok(&*(handle as *const HostedEngine))
}

#[cfg_attr(not(windows), allow(dead_code))]
fn init_logging(level: Option<&str>) {
    if let Some(level) = level {
        // Ignore failure: a subscriber may already be installed
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new(level))
            .try_init();
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn to_c_string(s: &str) -> CString {
    // Interior nul bytes cannot cross the boundary
    CString::new(s.replace('\0', "")).unwrap_or_default()
}

/// Allocate a C string from a Rust string. Caller must free with volume_linker_free_string.
fn alloc_c_string(s: &str) -> *mut c_char {
    to_c_string(s).into_raw()
}

/// Parse a C string to a Rust string slice.
#[cfg_attr(not(windows), allow(dead_code))]
unsafe fn parse_c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

#[cfg_attr(not(windows), allow(dead_code))]
unsafe fn required_c_str<'a>(ptr: *const c_char, what: &str) -> Result<&'a str, FfiError> {
    parse_c_str(ptr).ok_or_else(|| FfiError::new(ErrorCode::InvalidArgument, format!("Invalid {what}")))
}

// ============================================================================
// FFI Functions - Lifecycle
// ============================================================================

/// Create a new engine: initializes COM for the calling thread and enumerates
/// the output devices. All later calls must come from the same thread.
///
/// # Arguments
/// * `config_json` - JSON `EngineConfig` (can be null for defaults)
/// * `on_changed` - Master volume changed externally, or a link was made (may be null)
/// * `on_fatal` - The link failed while running and was removed (may be null)
/// * `user_data` - Passed back to both callbacks
///
/// # Returns
/// Handle to the engine, or null on failure. Check volume_linker_last_error_code() on failure.
///
/// # Safety
/// The returned handle must be freed with volume_linker_destroy().
#[cfg(windows)]
#[no_mangle]
pub extern "C" fn volume_linker_create(
    config_json: *const c_char,
    on_changed: VolumeChangedCallback,
    on_fatal: FatalFailureCallback,
    user_data: *mut c_void,
) -> VolumeLinkerHandle {
    use volume_linker_rs::audio::wasapi::{ComGuard, WasapiBackend};
    use windows::Win32::Foundation::HWND;

    ffi_call("engine creation", || {
        let config: EngineConfig = match unsafe { parse_c_str(config_json) } {
            Some(json) => serde_json::from_str(json)?,
            None => EngineConfig::default(),
        };
        init_logging(config.log_level.as_deref());

        let com = ComGuard::new()?;
        let notify_hwnd = config
            .notify_hwnd
            .map(|hwnd| HWND(hwnd as *mut c_void));
        let backend = WasapiBackend::new(notify_hwnd)?;
        let controller = LinkController::new(backend)?;

        let observer: Rc<dyn LinkObserver> = Rc::new(CallbackObserver {
            on_changed,
            on_fatal,
            user_data,
        });

        let engine = Box::new(HostedEngine {
            slot: EngineSlot::new(Engine::new(controller, Some(observer))),
            _com: com,
        });
        Ok(Box::into_raw(engine) as VolumeLinkerHandle)
    })
    .unwrap_or(ptr::null_mut())
}

/// Destroy an engine, removing any active link.
///
/// # Safety
/// The handle must have been created by volume_linker_create() and must not be used after this call.
#[cfg(windows)]
#[no_mangle]
pub extern "C" fn volume_linker_destroy(handle: VolumeLinkerHandle) {
    if handle.is_null() {
        return;
    }

    let _ = panic::catch_unwind(|| unsafe {
        if (*(handle as *const HostedEngine)).slot.is_busy() {
            warn!("Engine destroyed from inside one of its own callbacks, ignored");
            set_last_error(ErrorCode::InvalidHandle, "Engine is busy");
            return;
        }
        let _ = Box::from_raw(handle as *mut HostedEngine);
    });
}

// ============================================================================
// FFI Functions - Devices and Link
// ============================================================================

/// Get the device catalog.
///
/// # Returns
/// JSON `{"devices": [{"index", "id", "name"}]}` in catalog order. Caller must
/// free with volume_linker_free_string(). Returns null on failure.
#[cfg(windows)]
#[no_mangle]
pub extern "C" fn volume_linker_get_devices(handle: VolumeLinkerHandle) -> *mut c_char {
    ffi_call("device listing", || {
        let hosted = unsafe { engine_ref(handle)? };
        let json = hosted.slot.with(|engine| engine.devices_json())?;
        Ok(alloc_c_string(&json))
    })
    .unwrap_or(ptr::null_mut())
}

/// Link the master device to the slave device, by catalog position.
///
/// # Returns
/// 0 on success, negative error code on failure. The engine is unlinked after a failure.
#[cfg(windows)]
#[no_mangle]
pub extern "C" fn volume_linker_link(handle: VolumeLinkerHandle, master: i32, slave: i32) -> i32 {
    status_code(ffi_call("link", || {
        let hosted = unsafe { engine_ref(handle)? };
        hosted.slot.with(|engine| engine.link(master, slave))
    }))
}

/// Remove the current link. Does nothing if not linked.
///
/// # Returns
/// 0 on success, negative error code on failure.
#[cfg(windows)]
#[no_mangle]
pub extern "C" fn volume_linker_unlink(handle: VolumeLinkerHandle) -> i32 {
    status_code(ffi_call("unlink", || {
        let hosted = unsafe { engine_ref(handle)? };
        hosted.slot.with(|engine| {
            engine.unlink();
            Ok(())
        })
    }))
}

/// # Returns
/// 1 if linked, 0 if not, negative error code on failure.
#[cfg(windows)]
#[no_mangle]
pub extern "C" fn volume_linker_is_linked(handle: VolumeLinkerHandle) -> i32 {
    ffi_call("link query", || {
        let hosted = unsafe { engine_ref(handle)? };
        hosted
            .slot
            .with(|engine| Ok(engine.controller().is_linked() as i32))
    })
    .unwrap_or_else(|code| code as i32)
}

/// # Returns
/// Catalog position of the linked master device, or -1 if not linked or on failure.
#[cfg(windows)]
#[no_mangle]
pub extern "C" fn volume_linker_master_index(handle: VolumeLinkerHandle) -> i32 {
    ffi_call("master query", || {
        let hosted = unsafe { engine_ref(handle)? };
        hosted.slot.with(|engine| Ok(engine.master_index()))
    })
    .unwrap_or(-1)
}

/// # Returns
/// Catalog position of the linked slave device, or -1 if not linked or on failure.
#[cfg(windows)]
#[no_mangle]
pub extern "C" fn volume_linker_slave_index(handle: VolumeLinkerHandle) -> i32 {
    ffi_call("slave query", || {
        let hosted = unsafe { engine_ref(handle)? };
        hosted.slot.with(|engine| Ok(engine.slave_index()))
    })
    .unwrap_or(-1)
}

/// Set the master volume (0.0 to 1.0, clamped). The slave follows.
///
/// # Returns
/// 0 on success or when not linked, negative error code on failure.
#[cfg(windows)]
#[no_mangle]
pub extern "C" fn volume_linker_set_master_volume(handle: VolumeLinkerHandle, volume: f32) -> i32 {
    status_code(ffi_call("set master volume", || {
        let hosted = unsafe { engine_ref(handle)? };
        hosted.slot.with(|engine| engine.set_master_volume(volume))
    }))
}

/// Set the master mute state (1 = muted, 0 = unmuted). The slave follows.
///
/// # Returns
/// 0 on success or when not linked, negative error code on failure.
#[cfg(windows)]
#[no_mangle]
pub extern "C" fn volume_linker_set_master_mute(handle: VolumeLinkerHandle, muted: i32) -> i32 {
    status_code(ffi_call("set master mute", || {
        let hosted = unsafe { engine_ref(handle)? };
        hosted.slot.with(|engine| engine.set_master_mute(muted != 0))
    }))
}

/// Dispatch queued volume notifications. Callbacks fire from inside this call.
///
/// # Returns
/// Number of notifications dispatched, or a negative error code.
#[cfg(windows)]
#[no_mangle]
pub extern "C" fn volume_linker_pump_notifications(handle: VolumeLinkerHandle) -> i32 {
    ffi_call("notification pump", || {
        let hosted = unsafe { engine_ref(handle)? };
        let dispatched = hosted.slot.with(|engine| Ok(engine.pump_notifications()))?;
        Ok(i32::try_from(dispatched).unwrap_or(i32::MAX))
    })
    .unwrap_or_else(|code| code as i32)
}

// ============================================================================
// FFI Functions - Settings
// ============================================================================

/// Resolve saved settings against the device catalog.
///
/// # Arguments
/// * `settings_json` - JSON `{"master_device_id", "slave_device_id", "link_active"}`
///
/// # Returns
/// JSON `{"master", "slave", "link_active"}` with catalog positions (-1 if
/// the device is not present). Caller must free with volume_linker_free_string().
#[cfg(windows)]
#[no_mangle]
pub extern "C" fn volume_linker_resolve_settings(
    handle: VolumeLinkerHandle,
    settings_json: *const c_char,
) -> *mut c_char {
    ffi_call("settings resolution", || {
        let hosted = unsafe { engine_ref(handle)? };
        let json = unsafe { required_c_str(settings_json, "settings JSON")? };
        let resolved = hosted.slot.with(|engine| engine.resolve_settings_json(json))?;
        Ok(alloc_c_string(&resolved))
    })
    .unwrap_or(ptr::null_mut())
}

/// Build the settings to save for a selection. Negative positions mean no device.
///
/// # Returns
/// Settings JSON. Caller must free with volume_linker_free_string().
#[cfg(windows)]
#[no_mangle]
pub extern "C" fn volume_linker_settings_for(
    handle: VolumeLinkerHandle,
    master: i32,
    slave: i32,
    linked: i32,
) -> *mut c_char {
    ffi_call("settings export", || {
        let hosted = unsafe { engine_ref(handle)? };
        let settings = hosted
            .slot
            .with(|engine| engine.settings_json(master, slave, linked != 0))?;
        Ok(alloc_c_string(&settings))
    })
    .unwrap_or(ptr::null_mut())
}

// ============================================================================
// FFI Functions - Memory Management
// ============================================================================

/// Free a string allocated by this library.
///
/// # Safety
/// The pointer must have been returned by one of the volume_linker_* functions.
/// Do not call this on strings from other sources.
#[no_mangle]
pub extern "C" fn volume_linker_free_string(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }

    let _ = panic::catch_unwind(|| unsafe {
        let _ = CString::from_raw(ptr);
    });
}

// ============================================================================
// FFI Functions - Error Handling
// ============================================================================

/// Get the last error code.
///
/// # Returns
/// The error code from the last failed operation, or 0 if no error.
#[no_mangle]
pub extern "C" fn volume_linker_last_error_code() -> i32 {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map(|(code, _)| *code as i32)
            .unwrap_or(0)
    })
}

/// Get the last error message.
///
/// # Returns
/// Error message string. Caller must free with volume_linker_free_string().
/// Returns null if no error.
#[no_mangle]
pub extern "C" fn volume_linker_last_error_message() -> *mut c_char {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map(|(_, msg)| alloc_c_string(msg))
            .unwrap_or(ptr::null_mut())
    })
}

// ============================================================================
// FFI Functions - Utility
// ============================================================================

/// Get the library version.
///
/// # Returns
/// Version string. Caller must free with volume_linker_free_string().
#[no_mangle]
pub extern "C" fn volume_linker_version() -> *mut c_char {
    alloc_c_string(env!("CARGO_PKG_VERSION"))
}

// ============================================================================
// Tests
// ============================================================================

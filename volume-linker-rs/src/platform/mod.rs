//! Host platform services.
//!
//! Persisted link settings, plus the Windows registry store and the
//! single-instance guard.

#[cfg(windows)]
pub mod instance;
#[cfg(windows)]
pub mod registry;
pub mod settings;

#[cfg(windows)]
pub use instance::SingleInstance;
#[cfg(windows)]
pub use registry::RegistrySettings;
pub use settings::{LinkSettings, SavedSelection, SettingsError};

//! Volume Linker - Library
//!
//! Keeps the volume and mute state of one Windows audio output device (the
//! slave) in step with another (the master).
//!
//! ## Features
//!
//! - Sorted catalog of the rendering endpoints that can be linked
//! - Master/slave link that relays every master change to the slave
//! - Own changes told apart from external ones by an event-context token
//! - Link settings remembered by device ID in the registry
//! - In-memory audio backend for tests and headless use

pub mod app;
pub mod audio;
pub mod platform;

pub use app::{AppError, AppState, HostStatus, LoopControl};
pub use audio::{
    AudioBackend, AudioEndpoint, AudioError, Catalog, EventContext, LinkController, LinkError,
    LinkObserver, VolumeState,
};
pub use platform::{LinkSettings, SavedSelection, SettingsError};

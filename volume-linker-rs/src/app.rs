//! Application state and lifecycle management.
//!
//! Holds the host's device selection on top of the link controller and
//! applies the host rules: restoring saved settings, save-on-change, slider
//! and mute semantics, and the fatal-failure exit code.

use crate::audio::{
    AudioBackend, Catalog, LinkController, LinkError, LinkObserver, VolumeState, SLIDER_MAX,
};
use crate::platform::LinkSettings;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use thiserror::Error;
use tracing::{error, info, warn};

/// Exit code used when the link fails while running.
pub const FATAL_EXIT_CODE: i32 = 1;

/// Host-level errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Select a master and a slave device first")]
    NoSelection,

    #[error(transparent)]
    Link(#[from] LinkError),
}

/// What the message loop should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Exit(i32),
}

/// Observer that records controller callbacks for the host to act on.
#[derive(Debug, Default)]
pub struct HostStatus {
    last_state: Cell<Option<VolumeState>>,
    fatal: RefCell<Option<String>>,
}

impl HostStatus {
    /// Last master state reported by the controller.
    pub fn last_state(&self) -> Option<VolumeState> {
        self.last_state.get()
    }

    /// Take the pending fatal failure message, if any.
    pub fn take_fatal(&self) -> Option<String> {
        self.fatal.borrow_mut().take()
    }
}

impl LinkObserver for HostStatus {
    fn on_volume_or_mute_changed(&self, state: VolumeState) {
        self.last_state.set(Some(state));
    }

    fn on_fatal_sync_failure(&self, error: &LinkError) {
        *self.fatal.borrow_mut() = Some(error.to_string());
    }
}

/// Main application state.
pub struct AppState<B: AudioBackend> {
    controller: LinkController<B>,
    status: Rc<HostStatus>,

    /// Selected master device (catalog position)
    master: Option<usize>,

    /// Selected slave device (catalog position)
    slave: Option<usize>,

    /// Link state to save; kept when the link is torn down by a failure
    link_wanted: bool,

    /// Selection or link changed since settings were last saved
    dirty: bool,
}

impl<B: AudioBackend> AppState<B> {
    /// Wrap a controller, attaching the host observer.
    pub fn new(mut controller: LinkController<B>) -> Self {
        let status = Rc::new(HostStatus::default());
        controller.set_observer(status.clone());

        Self {
            controller,
            status,
            master: None,
            slave: None,
            link_wanted: false,
            dirty: false,
        }
    }

    pub fn controller(&self) -> &LinkController<B> {
        &self.controller
    }

    pub fn catalog(&self) -> &Catalog {
        self.controller.catalog()
    }

    pub fn status(&self) -> &HostStatus {
        &self.status
    }

    /// Current (master, slave) selection.
    pub fn selection(&self) -> (Option<usize>, Option<usize>) {
        (self.master, self.slave)
    }

    pub fn is_linked(&self) -> bool {
        self.controller.is_linked()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Restore the selection from saved settings.
    ///
    /// Links silently if the saved link was active (or `force_link` is set)
    /// and both devices are still present. Link failures are only logged.
    pub fn restore(&mut self, settings: &LinkSettings, force_link: bool) {
        let mut saved = settings.resolve(self.controller.catalog());
        saved.link_active |= force_link;
        self.master = saved.master;
        self.slave = saved.slave;

        if saved.master.is_none() && !settings.master_device_id.is_empty() {
            info!(device = %settings.master_device_id, "Saved master device is not present");
        }
        if saved.slave.is_none() && !settings.slave_device_id.is_empty() {
            info!(device = %settings.slave_device_id, "Saved slave device is not present");
        }

        if let Some((master, slave)) = saved.link_target() {
            if let Err(e) = self.controller.link(master, slave) {
                warn!(error = %e, "Failed to restore link");
            }
        }
        self.link_wanted = self.controller.is_linked();
    }

    /// Change the selected devices.
    ///
    /// Any active link is removed; the user relinks explicitly. Positions
    /// outside the catalog are treated as no selection.
    pub fn select_devices(&mut self, master: Option<usize>, slave: Option<usize>) {
        let len = self.controller.catalog().len();
        let valid = |index: Option<usize>| {
            index.filter(|&i| {
                let ok = i < len;
                if !ok {
                    warn!(index = i, len, "Ignoring out-of-range device selection");
                }
                ok
            })
        };

        self.controller.unlink();
        self.master = valid(master);
        self.slave = valid(slave);
        self.link_wanted = false;
        self.dirty = true;
    }

    /// Link the selected devices.
    pub fn link(&mut self) -> Result<(), AppError> {
        self.dirty = true;
        let (Some(master), Some(slave)) = (self.master, self.slave) else {
            self.controller.unlink();
            self.link_wanted = false;
            return Err(AppError::NoSelection);
        };

        let result = self.controller.link(master, slave);
        self.link_wanted = self.controller.is_linked();
        result?;
        Ok(())
    }

    pub fn unlink(&mut self) {
        self.dirty = true;
        self.link_wanted = false;
        self.controller.unlink();
    }

    /// Toggle the link. Returns whether the devices are now linked.
    pub fn toggle_link(&mut self) -> Result<bool, AppError> {
        if self.controller.is_linked() {
            self.unlink();
            Ok(false)
        } else {
            self.link().map(|()| true)
        }
    }

    /// Current slider position for the master volume.
    pub fn slider_position(&self) -> Option<u32> {
        self.current_state().map(|state| state.slider_position(SLIDER_MAX))
    }

    /// Move the volume slider.
    ///
    /// Position 0 also mutes; any other position unmutes a muted master.
    pub fn set_slider_position(&mut self, position: i64) -> bool {
        let volume = VolumeState::volume_from_slider(position, SLIDER_MAX);
        let mut ok = self.controller.set_master_volume(volume);

        let muted = self.current_state().map(|s| s.muted).unwrap_or(false);
        if volume <= 0.0 {
            ok &= self.controller.set_master_mute(true);
        } else if muted {
            ok &= self.controller.set_master_mute(false);
        }
        ok
    }

    pub fn set_mute(&mut self, muted: bool) -> bool {
        self.controller.set_master_mute(muted)
    }

    /// Dispatch queued volume notifications.
    pub fn pump(&mut self) -> LoopControl {
        self.controller.pump_notifications();

        match self.status.take_fatal() {
            Some(message) => {
                error!(error = %message, "Volume link failed, exiting");
                LoopControl::Exit(FATAL_EXIT_CODE)
            }
            None => LoopControl::Continue,
        }
    }

    /// Settings to write, if anything changed this session.
    ///
    /// The link is recorded as the user left it: a link removed after a
    /// relay failure is still saved as active.
    pub fn pending_settings(&self) -> Option<LinkSettings> {
        self.dirty.then(|| {
            LinkSettings::from_selection(
                self.controller.catalog(),
                self.master,
                self.slave,
                self.link_wanted,
            )
        })
    }

    /// The session is ending: hand back the settings to write and stop
    /// relaying. The link stays recorded as active for the next start.
    pub fn end_session(&mut self) -> Option<LinkSettings> {
        let pending = self.pending_settings();
        self.controller.unlink();
        pending
    }

    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    fn current_state(&self) -> Option<VolumeState> {
        match self.controller.master_state() {
            Some(Ok(state)) => Some(state),
            _ => self.status.last_state(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock::{DeviceFaults, MockAudioSystem, MockBackend};

    /// Catalog order: 0 = "Headphones" (hp), 1 = "Monitor" (mon), 2 = "Speakers" (spk)
    fn setup() -> (MockAudioSystem, AppState<MockBackend>) {
        let system = MockAudioSystem::new();
        system.add_device("spk", "Speakers");
        system.add_device("hp", "Headphones");
        system.add_device("mon", "Monitor");
        system.set_volume_state("spk", 0.4, false);

        let controller = LinkController::new(system.backend()).unwrap();
        (system, AppState::new(controller))
    }

    fn saved(master: &str, slave: &str, link_active: bool) -> LinkSettings {
        LinkSettings {
            master_device_id: master.to_string(),
            slave_device_id: slave.to_string(),
            link_active,
        }
    }

    #[test]
    fn test_restore_links_saved_devices() {
        let (system, mut app) = setup();

        app.restore(&saved("spk", "hp", true), false);

        assert_eq!(app.selection(), (Some(2), Some(0)));
        assert!(app.is_linked());
        assert_eq!(system.volume_state("hp"), Some(VolumeState::new(0.4, false)));
        assert!(!app.is_dirty());
        assert_eq!(app.pending_settings(), None);
    }

    #[test]
    fn test_restore_without_link_flag() {
        let (_system, mut app) = setup();

        app.restore(&saved("spk", "hp", false), false);
        assert_eq!(app.selection(), (Some(2), Some(0)));
        assert!(!app.is_linked());

        app.restore(&saved("spk", "hp", false), true);
        assert!(app.is_linked());
    }

    #[test]
    fn test_restore_with_missing_device_stays_unlinked() {
        let (_system, mut app) = setup();

        app.restore(&saved("usb-dac", "hp", true), true);

        assert_eq!(app.selection(), (None, Some(0)));
        assert!(!app.is_linked());
        assert_eq!(app.pending_settings(), None);
    }

    #[test]
    fn test_restore_failure_is_silent() {
        let (system, mut app) = setup();
        system.set_faults(
            "hp",
            DeviceFaults {
                write: true,
                ..DeviceFaults::default()
            },
        );

        app.restore(&saved("spk", "hp", true), false);

        assert_eq!(app.selection(), (Some(2), Some(0)));
        assert!(!app.is_linked());
        assert_eq!(app.pump(), LoopControl::Continue);
    }

    #[test]
    fn test_selection_change_unlinks_and_marks_dirty() {
        let (system, mut app) = setup();
        app.restore(&saved("spk", "hp", true), false);

        app.select_devices(Some(1), Some(0));

        assert!(!app.is_linked());
        assert_eq!(system.listener_count("spk"), 0);
        assert_eq!(app.pending_settings(), Some(saved("mon", "hp", false)));
    }

    #[test]
    fn test_out_of_range_selection_is_cleared() {
        let (_system, mut app) = setup();

        app.select_devices(Some(2), Some(7));

        assert_eq!(app.selection(), (Some(2), None));
        assert_eq!(app.pending_settings(), Some(saved("spk", "", false)));
    }

    #[test]
    fn test_toggle_link() {
        let (_system, mut app) = setup();
        app.select_devices(Some(2), Some(0));
        app.mark_saved();

        assert!(app.toggle_link().unwrap());
        assert_eq!(app.pending_settings(), Some(saved("spk", "hp", true)));

        app.mark_saved();
        assert!(!app.toggle_link().unwrap());
        assert_eq!(app.pending_settings(), Some(saved("spk", "hp", false)));
    }

    #[test]
    fn test_link_requires_selection() {
        let (_system, mut app) = setup();
        app.select_devices(Some(2), None);

        assert!(matches!(app.link(), Err(AppError::NoSelection)));
        assert!(!app.is_linked());
    }

    #[test]
    fn test_link_error_is_reported() {
        let (_system, mut app) = setup();
        app.select_devices(Some(1), Some(1));

        assert!(matches!(
            app.toggle_link(),
            Err(AppError::Link(LinkError::SelfLink))
        ));
        assert!(!app.is_linked());
    }

    #[test]
    fn test_slider_sets_master_and_slave_follows() {
        let (system, mut app) = setup();
        app.restore(&saved("spk", "hp", true), false);

        assert!(app.set_slider_position(73));
        assert_eq!(app.pump(), LoopControl::Continue);

        assert_eq!(system.volume_state("spk"), Some(VolumeState::new(0.73, false)));
        assert_eq!(system.volume_state("hp"), Some(VolumeState::new(0.73, false)));
        assert_eq!(app.slider_position(), Some(73));
    }

    #[test]
    fn test_slider_zero_mutes_and_nonzero_unmutes() {
        let (system, mut app) = setup();
        app.restore(&saved("spk", "hp", true), false);

        app.set_slider_position(0);
        app.pump();
        assert_eq!(system.volume_state("spk"), Some(VolumeState::new(0.0, true)));
        assert_eq!(system.volume_state("hp"), Some(VolumeState::new(0.0, true)));

        app.set_slider_position(20);
        app.pump();
        assert_eq!(system.volume_state("spk"), Some(VolumeState::new(0.2, false)));
        assert_eq!(system.volume_state("hp"), Some(VolumeState::new(0.2, false)));
    }

    #[test]
    fn test_external_change_updates_host_state() {
        let (system, mut app) = setup();
        app.restore(&saved("spk", "hp", true), false);

        system.external_change("spk", 0.66, true);
        app.pump();

        assert_eq!(app.status().last_state(), Some(VolumeState::new(0.66, true)));
    }

    #[test]
    fn test_fatal_relay_failure_exits_with_code() {
        let (system, mut app) = setup();
        app.restore(&saved("spk", "hp", true), false);
        system.set_faults(
            "hp",
            DeviceFaults {
                write: true,
                ..DeviceFaults::default()
            },
        );

        system.external_change("spk", 0.1, false);

        assert_eq!(app.pump(), LoopControl::Exit(FATAL_EXIT_CODE));
        assert!(!app.is_linked());
        assert_eq!(app.pump(), LoopControl::Continue);
    }

    #[test]
    fn test_link_broken_by_relay_failure_is_saved_as_active() {
        let (system, mut app) = setup();
        app.select_devices(Some(2), Some(0));
        app.link().unwrap();
        system.set_faults(
            "hp",
            DeviceFaults {
                write: true,
                ..DeviceFaults::default()
            },
        );

        system.external_change("spk", 0.1, false);
        assert_eq!(app.pump(), LoopControl::Exit(FATAL_EXIT_CODE));
        assert!(!app.is_linked());

        assert_eq!(app.pending_settings(), Some(saved("spk", "hp", true)));
    }

    #[test]
    fn test_failed_link_is_not_saved_as_active() {
        let (system, mut app) = setup();
        app.select_devices(Some(2), Some(0));
        system.set_faults(
            "hp",
            DeviceFaults {
                write: true,
                ..DeviceFaults::default()
            },
        );

        assert!(app.link().is_err());
        assert_eq!(app.pending_settings(), Some(saved("spk", "hp", false)));
    }

    #[test]
    fn test_end_session_saves_link_and_stops_relaying() {
        let (system, mut app) = setup();
        app.select_devices(Some(2), Some(0));
        app.link().unwrap();

        assert_eq!(app.end_session(), Some(saved("spk", "hp", true)));
        assert!(!app.is_linked());
        assert_eq!(system.listener_count("spk"), 0);

        // Nothing was saved yet, so a later exit writes the same settings
        assert_eq!(app.pending_settings(), Some(saved("spk", "hp", true)));
    }
}

//! Master/slave volume link.
//!
//! The controller owns at most one link. While linked it holds a live volume
//! handle on both endpoints and a change-notification registration on the
//! master; every master change is relayed to the slave.

use super::backend::{
    create_notification_channel, AudioBackend, EndpointVolume, EndpointVolumeListener,
    NotificationSender,
};
use super::catalog::Catalog;
use super::device::{
    clamp_volume, AudioEndpoint, AudioError, EventContext, LinkError, VolumeNotification,
    VolumeState,
};
use std::rc::Rc;
use std::sync::mpsc::Receiver;
use tracing::{debug, error, info, warn};

/// Host callbacks.
///
/// Callbacks run while the controller is mutably borrowed; implementations
/// must record what happened and act on it after the call returns.
pub trait LinkObserver {
    /// Master state changed by someone other than this controller, or a link
    /// was just established.
    fn on_volume_or_mute_changed(&self, state: VolumeState);

    /// Relaying to the slave failed. The link has already been torn down.
    fn on_fatal_sync_failure(&self, error: &LinkError);
}

struct ActiveLink<V> {
    master_index: usize,
    slave_index: usize,
    master_id: String,
    master: V,
    slave: V,
}

/// Keeps the slave endpoint in step with the master endpoint.
pub struct LinkController<B: AudioBackend> {
    backend: B,
    catalog: Catalog,
    context: EventContext,
    observer: Option<Rc<dyn LinkObserver>>,
    sender: NotificationSender,
    receiver: Receiver<VolumeNotification>,
    link: Option<ActiveLink<B::Volume>>,
}

impl<B: AudioBackend> LinkController<B> {
    /// Enumerate the rendering endpoints of `backend` and start unlinked.
    pub fn new(backend: B) -> Result<Self, LinkError> {
        let catalog = Catalog::enumerate(&backend)?;
        Ok(Self::with_catalog(backend, catalog))
    }

    /// Start unlinked over an existing catalog.
    pub fn with_catalog(backend: B, catalog: Catalog) -> Self {
        let (sender, receiver) = create_notification_channel();
        Self {
            backend,
            catalog,
            context: EventContext::generate(),
            observer: None,
            sender,
            receiver,
            link: None,
        }
    }

    /// Attach the host observer.
    pub fn set_observer(&mut self, observer: Rc<dyn LinkObserver>) {
        self.observer = Some(observer);
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Look up a device by catalog position.
    pub fn get(&self, index: usize) -> Result<&AudioEndpoint, LinkError> {
        self.catalog.get(index)
    }

    /// Token attached to every change this controller makes.
    pub fn event_context(&self) -> EventContext {
        self.context
    }

    pub fn is_linked(&self) -> bool {
        self.link.is_some()
    }

    pub fn current_master_index(&self) -> Option<usize> {
        self.link.as_ref().map(|l| l.master_index)
    }

    pub fn current_slave_index(&self) -> Option<usize> {
        self.link.as_ref().map(|l| l.slave_index)
    }

    /// Live state of the master endpoint, if linked.
    pub fn master_state(&self) -> Option<Result<VolumeState, AudioError>> {
        self.link.as_ref().map(|l| l.master.state())
    }

    /// Live state of the slave endpoint, if linked.
    pub fn slave_state(&self) -> Option<Result<VolumeState, AudioError>> {
        self.link.as_ref().map(|l| l.slave.state())
    }

    /// Link `master_index` to `slave_index`.
    ///
    /// Any existing link is removed first. On failure nothing of the new link
    /// is left behind and the controller is unlinked.
    pub fn link(&mut self, master_index: usize, slave_index: usize) -> Result<(), LinkError> {
        self.unlink();

        if master_index == slave_index {
            return Err(LinkError::SelfLink);
        }

        let master_endpoint = self.catalog.get(master_index)?;
        let slave_endpoint = self.catalog.get(slave_index)?;

        let mut master = self
            .backend
            .activate_volume(master_endpoint)
            .map_err(|source| LinkError::Activation {
                device: master_endpoint.name().to_string(),
                source,
            })?;
        let slave = self
            .backend
            .activate_volume(slave_endpoint)
            .map_err(|source| LinkError::Activation {
                device: slave_endpoint.name().to_string(),
                source,
            })?;

        // Handles are released by drop if registration fails
        master
            .register_change_notify(self.sender.clone())
            .map_err(LinkError::Subscription)?;

        let state = match master.state() {
            Ok(state) => state,
            Err(e) => {
                error!(error = %e, "Reading master state failed, rolling back link");
                master.unregister_change_notify();
                return Err(LinkError::StateRead(e));
            }
        };

        if let Err(e) = slave.apply(state, self.context) {
            error!(error = %e, "Initial slave sync failed, rolling back link");
            master.unregister_change_notify();
            return Err(LinkError::Sync(e));
        }

        info!(
            master = %master_endpoint.name(),
            slave = %slave_endpoint.name(),
            volume = state.volume,
            muted = state.muted,
            "Devices linked"
        );

        self.link = Some(ActiveLink {
            master_index,
            slave_index,
            master_id: master_endpoint.id().to_string(),
            master,
            slave,
        });

        if let Some(observer) = &self.observer {
            observer.on_volume_or_mute_changed(state);
        }

        Ok(())
    }

    /// Remove the current link, if any. Never fails.
    pub fn unlink(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.master.unregister_change_notify();
            info!(
                master = link.master_index,
                slave = link.slave_index,
                "Devices unlinked"
            );
        }

        // Anything still queued belongs to the link that was just removed
        while self.receiver.try_recv().is_ok() {}
    }

    /// Set the master volume. The slave follows through the change notification.
    ///
    /// Returns `true` when there is no master to set.
    pub fn set_master_volume(&self, level: f32) -> bool {
        let Some(link) = &self.link else {
            return true;
        };

        match link.master.set_volume(clamp_volume(level), self.context) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, level, "Failed to set master volume");
                false
            }
        }
    }

    /// Set the master mute state. The slave follows through the change notification.
    ///
    /// Returns `true` when there is no master to set.
    pub fn set_master_mute(&self, muted: bool) -> bool {
        let Some(link) = &self.link else {
            return true;
        };

        match link.master.set_mute(muted, self.context) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, muted, "Failed to set master mute");
                false
            }
        }
    }

    /// Dispatch every queued change notification. Returns how many were dispatched.
    pub fn pump_notifications(&mut self) -> usize {
        let mut dispatched = 0;
        while let Ok(notification) = self.receiver.try_recv() {
            self.on_endpoint_changed(&notification);
            dispatched += 1;
        }
        dispatched
    }
}

impl<B: AudioBackend> EndpointVolumeListener for LinkController<B> {
    fn on_endpoint_changed(&mut self, notification: &VolumeNotification) {
        let Some(link) = &self.link else {
            debug!("Volume notification while unlinked, ignoring");
            return;
        };

        if notification.endpoint_id != link.master_id {
            debug!(endpoint = %notification.endpoint_id, "Stale volume notification, ignoring");
            return;
        }

        let state = notification.state;
        debug!(
            volume = state.volume,
            muted = state.muted,
            own = notification.context == self.context,
            "Master volume changed"
        );

        if notification.context != self.context {
            if let Some(observer) = &self.observer {
                observer.on_volume_or_mute_changed(state);
            }
        }

        if let Err(e) = link.slave.apply(state, self.context) {
            error!(error = %e, "Failed to sync master volume to slave device");
            self.unlink();
            if let Some(observer) = &self.observer {
                observer.on_fatal_sync_failure(&LinkError::Sync(e));
            }
        }
    }
}

impl<B: AudioBackend> Drop for LinkController<B> {
    fn drop(&mut self) {
        self.unlink();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock::{DeviceFaults, MockAudioSystem, MockBackend, MockWrite};
    use proptest::prelude::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingObserver {
        changes: RefCell<Vec<VolumeState>>,
        fatal: RefCell<Vec<String>>,
    }

    impl LinkObserver for RecordingObserver {
        fn on_volume_or_mute_changed(&self, state: VolumeState) {
            self.changes.borrow_mut().push(state);
        }

        fn on_fatal_sync_failure(&self, error: &LinkError) {
            self.fatal.borrow_mut().push(error.to_string());
        }
    }

    /// Catalog order: 0 = "Headphones" (hp), 1 = "Monitor" (mon), 2 = "Speakers" (spk)
    fn setup() -> (MockAudioSystem, LinkController<MockBackend>, Rc<RecordingObserver>) {
        let system = MockAudioSystem::new();
        system.add_device("spk", "Speakers");
        system.add_device("hp", "Headphones");
        system.add_device("mon", "Monitor");
        system.set_volume_state("spk", 0.25, true);

        let mut controller = LinkController::new(system.backend()).unwrap();
        let observer = Rc::new(RecordingObserver::default());
        controller.set_observer(observer.clone());
        (system, controller, observer)
    }

    #[test]
    fn test_link_syncs_slave_to_master() {
        let (system, mut controller, observer) = setup();

        controller.link(2, 0).unwrap();

        assert!(controller.is_linked());
        assert_eq!(controller.current_master_index(), Some(2));
        assert_eq!(controller.current_slave_index(), Some(0));
        assert_eq!(system.volume_state("hp"), Some(VolumeState::new(0.25, true)));
        assert_eq!(
            controller.slave_state().unwrap().unwrap(),
            controller.master_state().unwrap().unwrap()
        );
        assert_eq!(system.listener_count("spk"), 1);
        assert_eq!(system.listener_count("hp"), 0);
        assert_eq!(*observer.changes.borrow(), vec![VolumeState::new(0.25, true)]);
    }

    #[test]
    fn test_self_link_fails() {
        let (system, mut controller, _observer) = setup();

        assert!(matches!(controller.link(1, 1), Err(LinkError::SelfLink)));
        assert!(!controller.is_linked());
        assert_eq!(system.listener_count("hp"), 0);
    }

    #[test]
    fn test_invalid_index() {
        let (_system, mut controller, _observer) = setup();

        assert!(matches!(
            controller.link(0, 7),
            Err(LinkError::InvalidIndex { index: 7, len: 3 })
        ));
        assert!(!controller.is_linked());
        assert_eq!(controller.current_master_index(), None);
    }

    #[test]
    fn test_relink_replaces_existing_link() {
        let (system, mut controller, _observer) = setup();

        controller.link(2, 0).unwrap();
        controller.link(1, 0).unwrap();

        assert_eq!(controller.current_master_index(), Some(1));
        assert_eq!(system.listener_count("spk"), 0);
        assert_eq!(system.listener_count("mon"), 1);
    }

    #[test]
    fn test_failed_relink_leaves_controller_unlinked() {
        let (system, mut controller, _observer) = setup();
        controller.link(2, 0).unwrap();

        assert!(controller.link(2, 2).is_err());
        assert!(!controller.is_linked());
        assert_eq!(system.listener_count("spk"), 0);
    }

    fn assert_no_relay_after_failure(faults_on: &str, faults: DeviceFaults) -> LinkError {
        let (system, mut controller, observer) = setup();
        system.set_faults(faults_on, faults);
        system.clear_writes("hp");

        let err = controller.link(2, 0).unwrap_err();

        assert!(!controller.is_linked());
        assert_eq!(controller.current_master_index(), None);
        assert_eq!(controller.current_slave_index(), None);
        assert_eq!(system.listener_count("spk"), 0);

        system.set_faults(faults_on, DeviceFaults::default());
        system.clear_writes("hp");
        system.external_change("spk", 0.9, false);
        assert_eq!(controller.pump_notifications(), 0);
        assert!(system.writes("hp").is_empty());
        assert!(observer.changes.borrow().is_empty());
        err
    }

    #[test]
    fn test_activation_failure_rolls_back() {
        let faults = DeviceFaults {
            activate: true,
            ..DeviceFaults::default()
        };
        assert!(matches!(
            assert_no_relay_after_failure("hp", faults),
            LinkError::Activation { .. }
        ));
    }

    #[test]
    fn test_subscription_failure_rolls_back() {
        let faults = DeviceFaults {
            register: true,
            ..DeviceFaults::default()
        };
        assert!(matches!(
            assert_no_relay_after_failure("spk", faults),
            LinkError::Subscription(_)
        ));
    }

    #[test]
    fn test_state_read_failure_rolls_back() {
        let volume_fault = DeviceFaults {
            read_volume: true,
            ..DeviceFaults::default()
        };
        assert!(matches!(
            assert_no_relay_after_failure("spk", volume_fault),
            LinkError::StateRead(_)
        ));

        let mute_fault = DeviceFaults {
            read_mute: true,
            ..DeviceFaults::default()
        };
        assert!(matches!(
            assert_no_relay_after_failure("spk", mute_fault),
            LinkError::StateRead(_)
        ));
    }

    #[test]
    fn test_initial_sync_failure_rolls_back() {
        let faults = DeviceFaults {
            write: true,
            ..DeviceFaults::default()
        };
        assert!(matches!(
            assert_no_relay_after_failure("hp", faults),
            LinkError::Sync(_)
        ));
    }

    #[test]
    fn test_unlink_is_idempotent() {
        let (system, mut controller, _observer) = setup();

        controller.unlink();
        controller.unlink();
        assert!(!controller.is_linked());

        controller.link(2, 0).unwrap();
        controller.unlink();
        controller.unlink();
        assert!(!controller.is_linked());
        assert_eq!(controller.current_master_index(), None);
        assert_eq!(system.listener_count("spk"), 0);
    }

    #[test]
    fn test_external_change_is_relayed_and_reported() {
        let (system, mut controller, observer) = setup();
        controller.link(2, 0).unwrap();
        observer.changes.borrow_mut().clear();

        system.external_change("spk", 0.42, false);
        assert_eq!(controller.pump_notifications(), 1);

        assert_eq!(system.volume_state("hp"), Some(VolumeState::new(0.42, false)));
        assert_eq!(*observer.changes.borrow(), vec![VolumeState::new(0.42, false)]);
    }

    #[test]
    fn test_own_change_is_relayed_silently() {
        let (system, mut controller, observer) = setup();
        controller.link(2, 0).unwrap();
        observer.changes.borrow_mut().clear();

        let own = controller.event_context();
        system.change_with_context("spk", 0.42, false, own);
        controller.pump_notifications();

        assert_eq!(system.volume_state("hp"), Some(VolumeState::new(0.42, false)));
        assert!(observer.changes.borrow().is_empty());
    }

    #[test]
    fn test_slave_writes_carry_own_context() {
        let (system, mut controller, _observer) = setup();
        controller.link(2, 0).unwrap();
        let own = controller.event_context();

        assert_eq!(
            system.writes("hp"),
            vec![MockWrite::Volume(0.25, own), MockWrite::Mute(true, own)]
        );
    }

    #[test]
    fn test_master_setters_forward_through_notification() {
        let (system, mut controller, observer) = setup();
        controller.link(2, 0).unwrap();
        observer.changes.borrow_mut().clear();

        assert!(controller.set_master_volume(0.8));
        assert!(controller.set_master_mute(false));
        assert_eq!(controller.pump_notifications(), 2);

        assert_eq!(system.volume_state("spk"), Some(VolumeState::new(0.8, false)));
        assert_eq!(system.volume_state("hp"), Some(VolumeState::new(0.8, false)));
        assert!(observer.changes.borrow().is_empty());
    }

    #[test]
    fn test_master_setters_without_link() {
        let (system, controller, _observer) = setup();

        assert!(controller.set_master_volume(0.1));
        assert!(controller.set_master_mute(false));
        assert_eq!(system.volume_state("spk"), Some(VolumeState::new(0.25, true)));
    }

    #[test]
    fn test_master_setter_failure_reports_false() {
        let (system, mut controller, _observer) = setup();
        controller.link(2, 0).unwrap();
        system.set_faults(
            "spk",
            DeviceFaults {
                write: true,
                ..DeviceFaults::default()
            },
        );

        assert!(!controller.set_master_volume(0.5));
        assert!(!controller.set_master_mute(false));
        assert!(controller.is_linked());
    }

    #[test]
    fn test_master_volume_is_clamped() {
        let (system, mut controller, _observer) = setup();
        controller.link(2, 0).unwrap();

        assert!(controller.set_master_volume(1.8));
        controller.pump_notifications();
        assert_eq!(system.volume_state("spk").unwrap().volume, 1.0);
        assert_eq!(system.volume_state("hp").unwrap().volume, 1.0);
    }

    #[test]
    fn test_relay_failure_is_fatal_to_link() {
        let (system, mut controller, observer) = setup();
        controller.link(2, 0).unwrap();
        system.set_faults(
            "hp",
            DeviceFaults {
                write: true,
                ..DeviceFaults::default()
            },
        );

        system.external_change("spk", 0.5, false);
        system.external_change("spk", 0.6, false);
        assert_eq!(controller.pump_notifications(), 1);

        assert!(!controller.is_linked());
        assert_eq!(system.listener_count("spk"), 0);
        assert_eq!(observer.fatal.borrow().len(), 1);
    }

    #[test]
    fn test_notifications_after_unlink_are_ignored() {
        let (system, mut controller, observer) = setup();
        controller.link(2, 0).unwrap();
        observer.changes.borrow_mut().clear();
        system.clear_writes("hp");

        system.external_change("spk", 0.7, false);
        controller.unlink();
        controller.on_endpoint_changed(&VolumeNotification {
            endpoint_id: "spk".to_string(),
            state: VolumeState::new(0.7, false),
            context: EventContext::NONE,
        });

        assert_eq!(controller.pump_notifications(), 0);
        assert!(system.writes("hp").is_empty());
        assert!(observer.changes.borrow().is_empty());
    }

    #[test]
    fn test_stale_master_notification_is_ignored() {
        let (system, mut controller, observer) = setup();
        controller.link(2, 0).unwrap();
        observer.changes.borrow_mut().clear();
        system.clear_writes("hp");

        controller.on_endpoint_changed(&VolumeNotification {
            endpoint_id: "mon".to_string(),
            state: VolumeState::new(0.1, false),
            context: EventContext::NONE,
        });

        assert!(system.writes("hp").is_empty());
        assert!(observer.changes.borrow().is_empty());
    }

    #[test]
    fn test_drop_releases_subscription() {
        let (system, mut controller, _observer) = setup();
        controller.link(2, 0).unwrap();

        drop(controller);
        assert_eq!(system.listener_count("spk"), 0);
    }

    proptest! {
        #[test]
        fn self_link_always_fails(index in 0usize..3) {
            let (system, mut controller, _observer) = setup();
            prop_assert!(matches!(controller.link(index, index), Err(LinkError::SelfLink)));
            prop_assert!(!controller.is_linked());
            prop_assert_eq!(system.listener_count("spk"), 0);
        }

        #[test]
        fn link_copies_master_state(
            master in 0usize..3,
            slave in 0usize..3,
            volume in 0.0f32..=1.0,
            muted in any::<bool>(),
        ) {
            prop_assume!(master != slave);
            let (system, mut controller, _observer) = setup();
            let master_id = controller.get(master).unwrap().id().to_string();
            let slave_id = controller.get(slave).unwrap().id().to_string();
            system.set_volume_state(&master_id, volume, muted);

            controller.link(master, slave).unwrap();

            prop_assert_eq!(system.volume_state(&slave_id), Some(VolumeState::new(volume, muted)));
        }
    }
}

//! Device catalog.
//!
//! A sorted, de-duplicated snapshot of the rendering endpoints taken once per
//! enumeration. Positions into the catalog are what the link controller and
//! the host use to refer to devices.

use super::backend::AudioBackend;
use super::device::{AudioEndpoint, AudioError, LinkError};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Ordered list of rendering endpoints.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    endpoints: Vec<AudioEndpoint>,
}

impl Catalog {
    /// Enumerate the rendering endpoints of `backend`.
    ///
    /// Devices are sorted by display name using the backend's case-insensitive
    /// collation. Devices whose names compare equal keep their discovery order.
    pub fn enumerate<B: AudioBackend + ?Sized>(backend: &B) -> Result<Self, LinkError> {
        let raw = backend
            .enumerate_render_endpoints()
            .map_err(LinkError::Enumeration)?;

        if raw.reported_count == 0 && raw.endpoints.is_empty() {
            return Err(LinkError::EmptyCatalog);
        }

        if raw.reported_count != raw.endpoints.len() {
            return Err(LinkError::Enumeration(AudioError::IncompleteEnumeration {
                reported: raw.reported_count,
                resolved: raw.endpoints.len(),
            }));
        }

        {
            let mut seen = HashSet::with_capacity(raw.endpoints.len());
            for info in &raw.endpoints {
                if !seen.insert(info.id.as_str()) {
                    warn!(device_id = %info.id, "Audio subsystem reported a device twice");
                    return Err(LinkError::Enumeration(AudioError::DuplicateDevice {
                        device_id: info.id.clone(),
                    }));
                }
                if info.name.is_empty() {
                    return Err(LinkError::Enumeration(AudioError::MissingName {
                        device_id: info.id.clone(),
                    }));
                }
            }
        }

        let mut discovered: Vec<(usize, _)> = raw.endpoints.into_iter().enumerate().collect();
        // sort_by is stable, so equal names stay in discovery order
        discovered.sort_by(|(_, a), (_, b)| backend.compare_names(&a.name, &b.name));

        let endpoints: Vec<AudioEndpoint> = discovered
            .into_iter()
            .enumerate()
            .map(|(index, (discovery_index, info))| {
                AudioEndpoint::new(info.id, info.name, index, discovery_index)
            })
            .collect();

        debug!(count = endpoints.len(), "Enumerated rendering endpoints");

        Ok(Self { endpoints })
    }

    /// Bounds-checked lookup by catalog position.
    pub fn get(&self, index: usize) -> Result<&AudioEndpoint, LinkError> {
        self.endpoints.get(index).ok_or(LinkError::InvalidIndex {
            index,
            len: self.endpoints.len(),
        })
    }

    /// Position of the endpoint with the given identifier.
    pub fn position_of(&self, device_id: &str) -> Option<usize> {
        if device_id.is_empty() {
            return None;
        }
        self.endpoints.iter().position(|e| e.id() == device_id)
    }

    pub fn endpoints(&self) -> &[AudioEndpoint] {
        &self.endpoints
    }

    pub fn iter(&self) -> impl Iterator<Item = &AudioEndpoint> {
        self.endpoints.iter()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock::MockAudioSystem;

    fn names(catalog: &Catalog) -> Vec<&str> {
        catalog.iter().map(|e| e.name()).collect()
    }

    #[test]
    fn test_sorts_case_insensitively_with_stable_ties() {
        let system = MockAudioSystem::new();
        system.add_device("id-a", "Speakers");
        system.add_device("id-b", "speakers");
        system.add_device("id-c", "Headphones");

        let catalog = Catalog::enumerate(&system.backend()).unwrap();
        assert_eq!(names(&catalog), vec!["Headphones", "Speakers", "speakers"]);

        // Reversed discovery order reverses the tie
        let system = MockAudioSystem::new();
        system.add_device("id-b", "speakers");
        system.add_device("id-a", "Speakers");
        system.add_device("id-c", "Headphones");

        let catalog = Catalog::enumerate(&system.backend()).unwrap();
        assert_eq!(names(&catalog), vec!["Headphones", "speakers", "Speakers"]);
    }

    #[test]
    fn test_positions_and_discovery_order() {
        let system = MockAudioSystem::new();
        system.add_device("id-z", "Zebra DAC");
        system.add_device("id-a", "analog out");

        let catalog = Catalog::enumerate(&system.backend()).unwrap();
        let first = catalog.get(0).unwrap();
        assert_eq!(first.id(), "id-a");
        assert_eq!(first.index(), 0);
        assert_eq!(first.discovery_index(), 1);
        assert_eq!(catalog.get(1).unwrap().discovery_index(), 0);
        assert_eq!(catalog.position_of("id-z"), Some(1));
        assert_eq!(catalog.position_of("missing"), None);
        assert_eq!(catalog.position_of(""), None);
    }

    #[test]
    fn test_get_out_of_range() {
        let system = MockAudioSystem::new();
        system.add_device("id-a", "Speakers");

        let catalog = Catalog::enumerate(&system.backend()).unwrap();
        assert!(matches!(
            catalog.get(1),
            Err(LinkError::InvalidIndex { index: 1, len: 1 })
        ));
    }

    #[test]
    fn test_empty_catalog() {
        let system = MockAudioSystem::new();
        assert!(matches!(
            Catalog::enumerate(&system.backend()),
            Err(LinkError::EmptyCatalog)
        ));
    }

    #[test]
    fn test_unreachable_subsystem() {
        let system = MockAudioSystem::new();
        system.add_device("id-a", "Speakers");
        system.fail_enumeration(true);
        assert!(matches!(
            Catalog::enumerate(&system.backend()),
            Err(LinkError::Enumeration(_))
        ));
    }

    #[test]
    fn test_count_mismatch_is_fatal() {
        let system = MockAudioSystem::new();
        system.add_device("id-a", "Speakers");
        system.add_device("id-b", "Headphones");
        system.set_reported_count(Some(3));

        assert!(matches!(
            Catalog::enumerate(&system.backend()),
            Err(LinkError::Enumeration(AudioError::IncompleteEnumeration {
                reported: 3,
                resolved: 2
            }))
        ));
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let system = MockAudioSystem::new();
        system.add_device("id-a", "Speakers");
        system.add_device("id-a", "Speakers (copy)");

        assert!(matches!(
            Catalog::enumerate(&system.backend()),
            Err(LinkError::Enumeration(AudioError::DuplicateDevice { .. }))
        ));
    }

    #[test]
    fn test_unnamed_device_fails_enumeration() {
        let system = MockAudioSystem::new();
        system.add_device("id-a", "Speakers");
        system.add_device("id-b", "");

        assert!(matches!(
            Catalog::enumerate(&system.backend()),
            Err(LinkError::Enumeration(AudioError::MissingName { device_id })) if device_id == "id-b"
        ));
    }

    #[test]
    fn test_disabled_devices_are_excluded() {
        let system = MockAudioSystem::new();
        system.add_device("id-a", "Speakers");
        system.add_device_with_state("id-b", "HDMI", crate::audio::DeviceState::Disabled);
        system.add_device_with_state("id-c", "Dock", crate::audio::DeviceState::Unplugged);

        let catalog = Catalog::enumerate(&system.backend()).unwrap();
        assert_eq!(names(&catalog), vec!["Dock", "Speakers"]);
    }
}

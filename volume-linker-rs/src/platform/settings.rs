//! Persisted link settings.
//!
//! Devices are remembered by their persistent ID, never by catalog position:
//! positions change whenever devices are added, removed or renamed.

use crate::audio::Catalog;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What the host remembers between sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    /// Persistent ID of the master device, empty if none
    pub master_device_id: String,

    /// Persistent ID of the slave device, empty if none
    pub slave_device_id: String,

    /// Whether the link was active when settings were last saved
    pub link_active: bool,
}

/// Saved settings resolved against the current catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SavedSelection {
    pub master: Option<usize>,
    pub slave: Option<usize>,
    pub link_active: bool,
}

impl SavedSelection {
    /// The (master, slave) pair to relink: both devices resolved and the
    /// link was active.
    pub fn link_target(&self) -> Option<(usize, usize)> {
        match (self.master, self.slave) {
            (Some(master), Some(slave)) if self.link_active => Some((master, slave)),
            _ => None,
        }
    }
}

/// Settings store error types.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to access registry key: {0}")]
    RegistryAccess(String),

    #[error("Failed to read setting: {key}")]
    ReadFailed { key: String },

    #[error("Failed to write setting: {key}")]
    WriteFailed { key: String },
}

impl LinkSettings {
    /// Settings from the raw stored values.
    ///
    /// All three values must be present; if any is missing the whole set
    /// falls back to the defaults.
    pub fn from_stored(
        master_device_id: Option<String>,
        slave_device_id: Option<String>,
        link_active: Option<u32>,
    ) -> Self {
        match (master_device_id, slave_device_id, link_active) {
            (Some(master_device_id), Some(slave_device_id), Some(link_active)) => Self {
                master_device_id,
                slave_device_id,
                link_active: link_active != 0,
            },
            _ => Self::default(),
        }
    }

    /// Resolve the saved device IDs to catalog positions.
    ///
    /// IDs that no longer match a device resolve to `None`. The settings
    /// themselves are left untouched.
    pub fn resolve(&self, catalog: &Catalog) -> SavedSelection {
        SavedSelection {
            master: catalog.position_of(&self.master_device_id),
            slave: catalog.position_of(&self.slave_device_id),
            link_active: self.link_active,
        }
    }

    /// Build settings from the current selection.
    ///
    /// A selection that does not name a catalog device is stored as an empty
    /// ID, and a link is only recorded when both devices are valid.
    pub fn from_selection(
        catalog: &Catalog,
        master: Option<usize>,
        slave: Option<usize>,
        linked: bool,
    ) -> Self {
        let id_at = |index: Option<usize>| {
            index
                .and_then(|i| catalog.get(i).ok())
                .map(|endpoint| endpoint.id().to_string())
                .unwrap_or_default()
        };

        let master_device_id = id_at(master);
        let slave_device_id = id_at(slave);
        let link_active = linked && !master_device_id.is_empty() && !slave_device_id.is_empty();

        Self {
            master_device_id,
            slave_device_id,
            link_active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock::MockAudioSystem;

    /// Catalog order: 0 = "Headphones" (hp), 1 = "Speakers" (spk)
    fn catalog() -> Catalog {
        let system = MockAudioSystem::new();
        system.add_device("spk", "Speakers");
        system.add_device("hp", "Headphones");
        Catalog::enumerate(&system.backend()).unwrap()
    }

    #[test]
    fn test_defaults_are_empty_and_unlinked() {
        let settings = LinkSettings::default();
        assert!(settings.master_device_id.is_empty());
        assert!(settings.slave_device_id.is_empty());
        assert!(!settings.link_active);
        assert_eq!(settings.resolve(&catalog()), SavedSelection::default());
    }

    #[test]
    fn test_resolve_by_id() {
        let settings = LinkSettings {
            master_device_id: "spk".to_string(),
            slave_device_id: "hp".to_string(),
            link_active: true,
        };

        let selection = settings.resolve(&catalog());
        assert_eq!(selection.master, Some(1));
        assert_eq!(selection.slave, Some(0));
        assert_eq!(selection.link_target(), Some((1, 0)));
    }

    #[test]
    fn test_missing_device_clears_selection_without_rewriting() {
        let settings = LinkSettings {
            master_device_id: "usb-dac".to_string(),
            slave_device_id: "hp".to_string(),
            link_active: true,
        };
        let before = settings.clone();

        let selection = settings.resolve(&catalog());
        assert_eq!(selection.master, None);
        assert_eq!(selection.slave, Some(0));
        assert_eq!(selection.link_target(), None);
        assert_eq!(settings, before);
    }

    #[test]
    fn test_partial_stored_values_fall_back_to_defaults() {
        let complete = LinkSettings::from_stored(
            Some("spk".to_string()),
            Some("hp".to_string()),
            Some(1),
        );
        assert_eq!(complete.master_device_id, "spk");
        assert_eq!(complete.slave_device_id, "hp");
        assert!(complete.link_active);

        let no_link_flag =
            LinkSettings::from_stored(Some("spk".to_string()), Some("hp".to_string()), None);
        assert_eq!(no_link_flag, LinkSettings::default());

        let no_slave = LinkSettings::from_stored(Some("spk".to_string()), None, Some(1));
        assert_eq!(no_slave, LinkSettings::default());

        let empty_ids =
            LinkSettings::from_stored(Some(String::new()), Some(String::new()), Some(0));
        assert_eq!(empty_ids, LinkSettings::default());
    }

    #[test]
    fn test_from_selection() {
        let catalog = catalog();

        let settings = LinkSettings::from_selection(&catalog, Some(1), Some(0), true);
        assert_eq!(settings.master_device_id, "spk");
        assert_eq!(settings.slave_device_id, "hp");
        assert!(settings.link_active);

        let unlinked = LinkSettings::from_selection(&catalog, Some(1), Some(0), false);
        assert!(!unlinked.link_active);
    }

    #[test]
    fn test_invalid_selection_saves_empty_id_and_no_link() {
        let catalog = catalog();

        let settings = LinkSettings::from_selection(&catalog, Some(1), Some(9), true);
        assert_eq!(settings.master_device_id, "spk");
        assert_eq!(settings.slave_device_id, "");
        assert!(!settings.link_active);

        let none = LinkSettings::from_selection(&catalog, None, None, true);
        assert_eq!(none, LinkSettings::default());
    }

    #[test]
    fn test_selection_survives_reordering() {
        let catalog = catalog();
        let saved = LinkSettings::from_selection(&catalog, Some(1), Some(0), true);

        let system = MockAudioSystem::new();
        system.add_device("hp", "Headphones");
        system.add_device("spk", "Speakers");
        system.add_device("aaa", "AAA Line Out");
        let reordered = Catalog::enumerate(&system.backend()).unwrap();

        let selection = saved.resolve(&reordered);
        assert_eq!(selection.master, Some(2));
        assert_eq!(selection.slave, Some(1));
    }
}

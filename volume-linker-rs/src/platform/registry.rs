//! Windows Registry settings store.
//!
//! Link settings live under `HKCU\Software\VolumeLinker`.

use super::settings::{LinkSettings, SettingsError};
use tracing::warn;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{ERROR_FILE_NOT_FOUND, ERROR_MORE_DATA};
use windows::Win32::System::Registry::{
    RegCloseKey, RegCreateKeyExW, RegOpenKeyExW, RegQueryValueExW, RegSetValueExW, HKEY,
    HKEY_CURRENT_USER, KEY_READ, KEY_WRITE, REG_CREATE_KEY_DISPOSITION, REG_DWORD,
    REG_OPTION_NON_VOLATILE, REG_SZ, REG_VALUE_TYPE,
};

/// Open registry key, closed on drop.
struct RegKey(HKEY);

impl Drop for RegKey {
    fn drop(&mut self) {
        unsafe {
            let _ = RegCloseKey(self.0);
        }
    }
}

/// Registry-based settings store.
pub struct RegistrySettings {
    app_key_path: Vec<u16>,
}

impl RegistrySettings {
    const APP_KEY: &'static str = r"Software\VolumeLinker";
    const MASTER_VALUE: &'static str = "MasterDevice";
    const SLAVE_VALUE: &'static str = "SlaveDevice";
    const LINK_ACTIVE_VALUE: &'static str = "LinkActive";

    pub fn new() -> Self {
        Self {
            app_key_path: to_wide(Self::APP_KEY),
        }
    }

    /// Load settings from the registry.
    ///
    /// A missing key reads as the defaults, and so does the whole set when
    /// any value is missing or has the wrong type. Other failures are errors.
    pub fn load(&self) -> Result<LinkSettings, SettingsError> {
        let Some(key) = self.open_read()? else {
            return Ok(LinkSettings::default());
        };

        Ok(LinkSettings::from_stored(
            read_string(&key, Self::MASTER_VALUE)?,
            read_string(&key, Self::SLAVE_VALUE)?,
            read_dword(&key, Self::LINK_ACTIVE_VALUE)?,
        ))
    }

    /// Save settings to the registry, creating the key if needed.
    pub fn save(&self, settings: &LinkSettings) -> Result<(), SettingsError> {
        let key = self.open_write()?;
        write_string(&key, Self::MASTER_VALUE, &settings.master_device_id)?;
        write_string(&key, Self::SLAVE_VALUE, &settings.slave_device_id)?;
        write_dword(&key, Self::LINK_ACTIVE_VALUE, settings.link_active as u32)?;
        Ok(())
    }

    fn open_read(&self) -> Result<Option<RegKey>, SettingsError> {
        unsafe {
            let mut hkey = HKEY::default();
            let result = RegOpenKeyExW(
                HKEY_CURRENT_USER,
                PCWSTR::from_raw(self.app_key_path.as_ptr()),
                0,
                KEY_READ,
                &mut hkey,
            );

            if result == ERROR_FILE_NOT_FOUND {
                return Ok(None);
            }
            if result.is_err() {
                return Err(SettingsError::RegistryAccess(format!(
                    "open {} failed ({})",
                    Self::APP_KEY,
                    result.0
                )));
            }
            Ok(Some(RegKey(hkey)))
        }
    }

    fn open_write(&self) -> Result<RegKey, SettingsError> {
        unsafe {
            let mut hkey = HKEY::default();
            let mut disposition = REG_CREATE_KEY_DISPOSITION::default();

            let result = RegCreateKeyExW(
                HKEY_CURRENT_USER,
                PCWSTR::from_raw(self.app_key_path.as_ptr()),
                0,
                PCWSTR::null(),
                REG_OPTION_NON_VOLATILE,
                KEY_WRITE,
                None,
                &mut hkey,
                Some(&mut disposition),
            );

            if result.is_err() {
                return Err(SettingsError::RegistryAccess(format!(
                    "create {} failed ({})",
                    Self::APP_KEY,
                    result.0
                )));
            }
            Ok(RegKey(hkey))
        }
    }
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self::new()
    }
}

fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn read_string(key: &RegKey, name: &str) -> Result<Option<String>, SettingsError> {
    let value_name = to_wide(name);
    let read_failed = || SettingsError::ReadFailed {
        key: name.to_string(),
    };

    unsafe {
        // First call reports the size in bytes
        let mut value_type = REG_VALUE_TYPE::default();
        let mut data_size = 0u32;
        let result = RegQueryValueExW(
            key.0,
            PCWSTR::from_raw(value_name.as_ptr()),
            None,
            Some(&mut value_type),
            None,
            Some(&mut data_size),
        );
        if result == ERROR_FILE_NOT_FOUND {
            return Ok(None);
        }
        if result.is_err() {
            return Err(read_failed());
        }
        if value_type != REG_SZ {
            warn!(value = name, "Stored setting has the wrong type");
            return Ok(None);
        }

        let mut buffer = vec![0u16; (data_size as usize).div_ceil(2)];
        let mut data_size = (buffer.len() * 2) as u32;
        let result = RegQueryValueExW(
            key.0,
            PCWSTR::from_raw(value_name.as_ptr()),
            None,
            None,
            Some(buffer.as_mut_ptr() as *mut u8),
            Some(&mut data_size),
        );
        if result.is_err() {
            return Err(read_failed());
        }

        // Stored strings are not guaranteed to be null-terminated
        buffer.truncate(data_size as usize / 2);
        if let Some(end) = buffer.iter().position(|&c| c == 0) {
            buffer.truncate(end);
        }

        String::from_utf16(&buffer)
            .map(Some)
            .map_err(|_| read_failed())
    }
}

fn read_dword(key: &RegKey, name: &str) -> Result<Option<u32>, SettingsError> {
    let value_name = to_wide(name);

    unsafe {
        let mut value_type = REG_VALUE_TYPE::default();
        let mut data: u32 = 0;
        let mut data_size = std::mem::size_of::<u32>() as u32;

        let result = RegQueryValueExW(
            key.0,
            PCWSTR::from_raw(value_name.as_ptr()),
            None,
            Some(&mut value_type),
            Some(&mut data as *mut u32 as *mut u8),
            Some(&mut data_size),
        );

        if result == ERROR_FILE_NOT_FOUND {
            Ok(None)
        } else if value_type != REG_DWORD && (result.is_ok() || result == ERROR_MORE_DATA) {
            warn!(value = name, "Stored setting has the wrong type");
            Ok(None)
        } else if result.is_err() {
            Err(SettingsError::ReadFailed {
                key: name.to_string(),
            })
        } else {
            Ok(Some(data))
        }
    }
}

fn write_string(key: &RegKey, name: &str, value: &str) -> Result<(), SettingsError> {
    let value_name = to_wide(name);
    let value_wide = to_wide(value);

    unsafe {
        let result = RegSetValueExW(
            key.0,
            PCWSTR::from_raw(value_name.as_ptr()),
            0,
            REG_SZ,
            Some(std::slice::from_raw_parts(
                value_wide.as_ptr() as *const u8,
                value_wide.len() * 2,
            )),
        );

        if result.is_err() {
            Err(SettingsError::WriteFailed {
                key: name.to_string(),
            })
        } else {
            Ok(())
        }
    }
}

fn write_dword(key: &RegKey, name: &str, value: u32) -> Result<(), SettingsError> {
    let value_name = to_wide(name);

    unsafe {
        let result = RegSetValueExW(
            key.0,
            PCWSTR::from_raw(value_name.as_ptr()),
            0,
            REG_DWORD,
            Some(std::slice::from_raw_parts(
                &value as *const u32 as *const u8,
                std::mem::size_of::<u32>(),
            )),
        );

        if result.is_err() {
            Err(SettingsError::WriteFailed {
                key: name.to_string(),
            })
        } else {
            Ok(())
        }
    }
}

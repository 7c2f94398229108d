//! Machine-wide single-instance guard.

use windows::core::w;
use windows::Win32::Foundation::{CloseHandle, GetLastError, ERROR_ALREADY_EXISTS, HANDLE};
use windows::Win32::System::Threading::CreateMutexW;

/// Held for the lifetime of the process; releases the named mutex on drop.
pub struct SingleInstance {
    handle: HANDLE,
}

impl SingleInstance {
    /// Claim the instance mutex.
    ///
    /// Returns `Ok(None)` if another instance already holds it.
    pub fn acquire() -> windows::core::Result<Option<Self>> {
        unsafe {
            let handle = CreateMutexW(None, false, w!("Global\\VolumeLinker"))?;

            if GetLastError() == ERROR_ALREADY_EXISTS {
                let _ = CloseHandle(handle);
                return Ok(None);
            }

            Ok(Some(Self { handle }))
        }
    }
}

impl Drop for SingleInstance {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.handle);
        }
    }
}

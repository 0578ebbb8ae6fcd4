use std::{ffi::OsStr, os::windows::ffi::OsStrExt, path::Path};

use windows::{
    core::{Error, Result, PCWSTR},
    Win32::{
        Foundation::RPC_E_CHANGED_MODE,
        System::{
            Com::{CoInitializeEx, CoUninitialize, COINIT_APARTMENTTHREADED},
            Environment::ExpandEnvironmentStringsW,
        },
    },
};

/// RAII guard for COM initialization on the current thread.
pub(crate) struct ComGuard {
    initialized: bool,
}

impl ComGuard {
    /// Initializes COM in STA mode if needed.
    pub(crate) unsafe fn new() -> Result<Self> {
        let hr = CoInitializeEx(None, COINIT_APARTMENTTHREADED);
        if hr.is_ok() {
            Ok(Self { initialized: true })
        } else if hr == RPC_E_CHANGED_MODE {
            Ok(Self { initialized: false })
        } else {
            Err(Error::from(hr))
        }
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        if self.initialized {
            unsafe {
                CoUninitialize();
            }
        }
    }
}

/// Converts an [`OsStr`] into a null-terminated wide string buffer suitable for Win32 APIs.
pub(crate) fn os_str_to_wide(value: &OsStr) -> Vec<u16> {
    value.encode_wide().chain(Some(0)).collect()
}

/// Null-terminated wide copy of a path, e.g. for `SHChangeNotify` with `SHCNF_PATHW`.
pub(crate) fn path_to_wide(path: &Path) -> Vec<u16> {
    os_str_to_wide(path.as_os_str())
}

/// Trims trailing null terminators and converts a UTF-16 buffer into a [`String`].
pub(crate) fn wide_to_string(buffer: &[u16]) -> Option<String> {
    let end = buffer.iter().position(|c| *c == 0).unwrap_or(buffer.len());
    if end == 0 {
        return None;
    }

    String::from_utf16(&buffer[..end]).ok()
}

/// Expands Windows environment variables (e.g. `%LOCALAPPDATA%`).
pub(crate) fn expand_env_vars(value: &str) -> Option<String> {
    if !value.contains('%') {
        return Some(value.to_string());
    }

    let wide_input = os_str_to_wide(OsStr::new(value));
    unsafe {
        let required = ExpandEnvironmentStringsW(PCWSTR(wide_input.as_ptr()), None);
        if required == 0 {
            return None;
        }

        let mut buffer = vec![0u16; required as usize];
        let written = ExpandEnvironmentStringsW(PCWSTR(wide_input.as_ptr()), Some(&mut buffer));
        if written == 0 {
            return None;
        }

        wide_to_string(&buffer)
    }
}

//! Elevated relaunch for installing into a protected registry location.
//!
//! The unprivileged process calls [`request_elevated_install`] and exits. The
//! elevated instance is started with [`ELEVATED_INSTALL_FLAG`] (plus the
//! `--config` path when one was given), installs the integration without
//! interaction and exits with a status code.

use std::path::Path;

use log::info;

use crate::integration::{RegistrarError, ELEVATED_INSTALL_FLAG};

/// Arguments passed to the elevated instance.
///
/// The elevated process starts in the system directory, so the settings path
/// is made absolute against the current directory first.
pub fn elevated_arguments(config_path: Option<&Path>) -> Vec<String> {
    let mut args = vec![ELEVATED_INSTALL_FLAG.to_string()];
    if let Some(path) = config_path {
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        args.push("--config".to_string());
        args.push(path.display().to_string());
    }
    args
}

/// Joins arguments into a single command line, quoting where needed.
pub fn join_arguments(args: &[String]) -> String {
    args.iter()
        .map(|arg| quote_arg(arg))
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote_arg(arg: &str) -> String {
    if arg.is_empty() || arg.contains(' ') || arg.contains('"') {
        format!("\"{}\"", arg.replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}

/// Starts `exe` elevated with the install flag. The caller is expected to exit
/// once this returns `Ok`.
pub fn request_elevated_install(
    exe: &Path,
    config_path: Option<&Path>,
) -> Result<(), RegistrarError> {
    let parameters = join_arguments(&elevated_arguments(config_path));
    info!("relaunching {} elevated: {parameters}", exe.display());
    shell_execute_runas(exe, &parameters)
}

#[cfg(windows)]
fn shell_execute_runas(exe: &Path, parameters: &str) -> Result<(), RegistrarError> {
    use std::ffi::OsStr;

    use windows::{
        core::PCWSTR,
        Win32::{
            Foundation::HWND,
            UI::{Shell::ShellExecuteW, WindowsAndMessaging::SW_SHOWNORMAL},
        },
    };

    use crate::windows_utils::{os_str_to_wide, path_to_wide, ComGuard};

    let _guard = unsafe { ComGuard::new() }
        .map_err(|err| RegistrarError::Elevation(err.to_string()))?;

    let verb = os_str_to_wide(OsStr::new("runas"));
    let file = path_to_wide(exe);
    let params = os_str_to_wide(OsStr::new(parameters));

    let result = unsafe {
        ShellExecuteW(
            HWND::default(),
            PCWSTR(verb.as_ptr()),
            PCWSTR(file.as_ptr()),
            PCWSTR(params.as_ptr()),
            PCWSTR::null(),
            SW_SHOWNORMAL,
        )
    };

    // Values up to 32 are error codes; the user declining the UAC prompt lands here too.
    if result.0 as isize <= 32 {
        Err(RegistrarError::Elevation(format!(
            "ShellExecuteW failed with code {}",
            result.0 as isize
        )))
    } else {
        Ok(())
    }
}

#[cfg(not(windows))]
fn shell_execute_runas(_exe: &Path, _parameters: &str) -> Result<(), RegistrarError> {
    Err(RegistrarError::Unsupported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_carry_install_flag() {
        assert_eq!(elevated_arguments(None), vec![ELEVATED_INSTALL_FLAG]);

        let settings = std::env::temp_dir().join("my settings.json");
        assert_eq!(
            elevated_arguments(Some(&settings)),
            vec![
                ELEVATED_INSTALL_FLAG.to_string(),
                "--config".to_string(),
                settings.display().to_string(),
            ]
        );
    }

    #[test]
    fn relative_config_path_is_resolved_against_current_dir() {
        let args = elevated_arguments(Some(Path::new("settings.json")));
        let expected = std::env::current_dir().unwrap().join("settings.json");

        assert_eq!(args[2], expected.display().to_string());
        assert!(Path::new(&args[2]).is_absolute());
    }

    #[test]
    fn join_quotes_arguments_with_spaces() {
        let args = vec![
            ELEVATED_INSTALL_FLAG.to_string(),
            "--config".to_string(),
            "my settings.json".to_string(),
        ];
        assert_eq!(
            join_arguments(&args),
            "--install-context-menu --config \"my settings.json\""
        );
        assert_eq!(join_arguments(&["a\"b".to_string()]), "\"a\\\"b\"");
    }

    #[cfg(not(windows))]
    #[test]
    fn elevation_is_unsupported_off_windows() {
        let err = request_elevated_install(Path::new("/usr/bin/folder-color"), None).unwrap_err();
        assert!(matches!(err, RegistrarError::Unsupported));
    }
}

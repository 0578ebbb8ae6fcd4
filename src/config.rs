use std::{
    env, fs,
    path::{Path, PathBuf},
};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::{
    integration::{DEFAULT_INTEGRATION_NAME, DEFAULT_MENU_LABEL},
    registry::RegistryScope,
};

const CONFIG_DIR: &str = "FolderColor";
const CONFIG_FILE: &str = "settings.json";
const ICONS_DIR: &str = "icons";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Registry key name under `Directory\shell`.
    pub integration_name: String,
    pub menu_label: String,
    /// Defaults to `icons` next to the executable.
    pub icons_dir: Option<PathBuf>,
    pub registry_scope: RegistryScope,
    /// Restart Explorer after each marked folder.
    pub restart_explorer: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            integration_name: DEFAULT_INTEGRATION_NAME.to_string(),
            menu_label: DEFAULT_MENU_LABEL.to_string(),
            icons_dir: None,
            registry_scope: RegistryScope::default(),
            restart_explorer: true,
        }
    }
}

impl AppConfig {
    /// Loads `path`, or the default location when `None`. Missing or
    /// malformed files yield defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) => path,
                None => return Self::default(),
            },
        };

        match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|err| {
                warn!("ignoring malformed {}: {err}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| err.to_string())?;
        }
        let data = serde_json::to_string_pretty(self).map_err(|err| err.to_string())?;
        fs::write(path, data).map_err(|err| err.to_string())
    }

    /// The icon resource directory, with environment variables expanded.
    pub fn resolved_icons_dir(&self) -> Option<PathBuf> {
        match &self.icons_dir {
            Some(dir) => Some(expand_path(dir)),
            None => env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(|dir| dir.join(ICONS_DIR))),
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    config_base_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

#[cfg(windows)]
fn config_base_dir() -> Option<PathBuf> {
    env::var_os("APPDATA").map(PathBuf::from)
}

#[cfg(not(windows))]
fn config_base_dir() -> Option<PathBuf> {
    env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))
}

#[cfg(windows)]
fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    crate::windows_utils::expand_env_vars(&raw)
        .map(PathBuf::from)
        .unwrap_or_else(|| path.to_path_buf())
}

#[cfg(not(windows))]
fn expand_path(path: &Path) -> PathBuf {
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(Some(&dir.path().join("settings.json")));

        assert_eq!(config, AppConfig::default());
        assert!(config.restart_explorer);
        assert_eq!(config.registry_scope, RegistryScope::Machine);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "registry_scope": "user", "restart_explorer": false }"#).unwrap();

        let config = AppConfig::load(Some(&path));
        assert_eq!(config.registry_scope, RegistryScope::User);
        assert!(!config.restart_explorer);
        assert_eq!(config.integration_name, DEFAULT_INTEGRATION_NAME);
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(AppConfig::load(Some(&path)), AppConfig::default());
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let config = AppConfig {
            menu_label: "Folder color".into(),
            icons_dir: Some(dir.path().join("icons")),
            ..AppConfig::default()
        };

        config.save(&path).unwrap();
        assert_eq!(AppConfig::load(Some(&path)), config);
    }

    #[test]
    fn explicit_icons_dir_wins() {
        let config = AppConfig {
            icons_dir: Some(PathBuf::from("assets/icons")),
            ..AppConfig::default()
        };
        assert_eq!(
            config.resolved_icons_dir(),
            Some(PathBuf::from("assets/icons"))
        );
    }
}

//! Registry access for the context-menu integration.
//!
//! Paths are relative to the classes root of the configured [`RegistryScope`].
//! Every call opens the keys it needs and closes them before returning.

use std::io;

use serde::{Deserialize, Serialize};

/// Where the integration lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryScope {
    /// `HKEY_CLASSES_ROOT`; writes need an elevated process.
    #[default]
    Machine,
    /// `HKEY_CURRENT_USER\Software\Classes`; visible to the current user only.
    User,
}

/// A key with its string values and subkeys, written in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryKeyTree {
    pub values: Vec<(String, String)>,
    pub subkeys: Vec<(String, RegistryKeyTree)>,
}

impl RegistryKeyTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a string value; an empty name is the key's default value.
    pub fn value(mut self, name: impl Into<String>, data: impl Into<String>) -> Self {
        self.values.push((name.into(), data.into()));
        self
    }

    pub fn subkey(mut self, name: impl Into<String>, tree: RegistryKeyTree) -> Self {
        self.subkeys.push((name.into(), tree));
        self
    }

    pub fn get_value(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, data)| data.as_str())
    }

    pub fn get_subkey(&self, name: &str) -> Option<&RegistryKeyTree> {
        self.subkeys
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, tree)| tree)
    }
}

pub trait RegistryBackend: Send + Sync {
    fn key_exists(&self, path: &str) -> io::Result<bool>;

    /// Creates `path` and everything under `tree`, overwriting values that
    /// already exist.
    fn write_tree(&self, path: &str, tree: &RegistryKeyTree) -> io::Result<()>;

    /// Deletes `path` recursively. A missing key is not an error.
    fn delete_tree(&self, path: &str) -> io::Result<()>;
}

/// The real registry for the current platform.
pub fn system_registry(scope: RegistryScope) -> Box<dyn RegistryBackend> {
    #[cfg(windows)]
    {
        Box::new(WinRegistry::new(scope))
    }

    #[cfg(not(windows))]
    {
        Box::new(UnsupportedRegistry { scope })
    }
}

#[cfg(windows)]
pub use self::windows_registry::WinRegistry;

#[cfg(windows)]
mod windows_registry {
    use std::io;

    use winreg::{
        enums::{HKEY_CLASSES_ROOT, HKEY_CURRENT_USER, KEY_READ},
        RegKey,
    };

    use super::{RegistryBackend, RegistryKeyTree, RegistryScope};

    const USER_CLASSES: &str = r"Software\Classes";

    pub struct WinRegistry {
        scope: RegistryScope,
    }

    impl WinRegistry {
        pub fn new(scope: RegistryScope) -> Self {
            Self { scope }
        }

        fn root_and_path(&self, path: &str) -> (RegKey, String) {
            match self.scope {
                RegistryScope::Machine => (RegKey::predef(HKEY_CLASSES_ROOT), path.to_string()),
                RegistryScope::User => (
                    RegKey::predef(HKEY_CURRENT_USER),
                    format!(r"{USER_CLASSES}\{path}"),
                ),
            }
        }
    }

    impl RegistryBackend for WinRegistry {
        fn key_exists(&self, path: &str) -> io::Result<bool> {
            let (root, path) = self.root_and_path(path);
            match root.open_subkey_with_flags(&path, KEY_READ) {
                Ok(_) => Ok(true),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
                Err(err) => Err(err),
            }
        }

        fn write_tree(&self, path: &str, tree: &RegistryKeyTree) -> io::Result<()> {
            let (root, path) = self.root_and_path(path);
            let (key, _) = root.create_subkey(&path)?;
            write_key(&key, tree)
        }

        fn delete_tree(&self, path: &str) -> io::Result<()> {
            let (root, path) = self.root_and_path(path);
            match root.delete_subkey_all(&path) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(err),
            }
        }
    }

    fn write_key(key: &RegKey, tree: &RegistryKeyTree) -> io::Result<()> {
        for (name, data) in &tree.values {
            key.set_value(name, data)?;
        }

        for (name, child) in &tree.subkeys {
            let (subkey, _) = key.create_subkey(name)?;
            write_key(&subkey, child)?;
        }

        Ok(())
    }
}

/// Stand-in for platforms without a registry.
#[cfg(not(windows))]
pub struct UnsupportedRegistry {
    scope: RegistryScope,
}

#[cfg(not(windows))]
impl UnsupportedRegistry {
    fn unsupported(&self) -> io::Error {
        io::Error::new(
            io::ErrorKind::Unsupported,
            format!("no {:?} registry on this platform", self.scope),
        )
    }
}

#[cfg(not(windows))]
impl RegistryBackend for UnsupportedRegistry {
    fn key_exists(&self, _path: &str) -> io::Result<bool> {
        Ok(false)
    }

    fn write_tree(&self, _path: &str, _tree: &RegistryKeyTree) -> io::Result<()> {
        Err(self.unsupported())
    }

    fn delete_tree(&self, _path: &str) -> io::Result<()> {
        Ok(())
    }
}

use std::path::{Path, PathBuf};

use log::debug;

/// Name of the marker that removes any customization instead of applying one.
pub const DEFAULT_COLOR: &str = "Default";

/// Recognized colors, in display order. Each maps to `<lowercase name>.ico`.
pub const COLOR_NAMES: [&str; 9] = [
    DEFAULT_COLOR,
    "Black",
    "Blue",
    "Brown",
    "Gray",
    "Green",
    "Orange",
    "Red",
    "Yellow",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorOption {
    pub name: String,
    pub icon_path: PathBuf,
}

impl ColorOption {
    pub fn new(name: impl Into<String>, icon_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            icon_path: icon_path.into(),
        }
    }

    /// The "no marker" option, usable even when `default.ico` is not shipped.
    pub fn default_marker() -> Self {
        Self::new(DEFAULT_COLOR, PathBuf::new())
    }

    pub fn is_default(&self) -> bool {
        self.name.eq_ignore_ascii_case(DEFAULT_COLOR)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PaletteError {
    #[error("icons folder not found: {}", .0.display())]
    MissingResourceDir(PathBuf),
}

/// The colors whose icon resource was found at startup.
#[derive(Debug, Clone, Default)]
pub struct Palette {
    options: Vec<ColorOption>,
}

impl Palette {
    /// Scans `icons_dir` for the fixed set of icon files. Colors whose file is
    /// missing are left out.
    pub fn load(icons_dir: &Path) -> Result<Self, PaletteError> {
        if !icons_dir.is_dir() {
            return Err(PaletteError::MissingResourceDir(icons_dir.to_path_buf()));
        }

        let options = COLOR_NAMES
            .iter()
            .filter_map(|name| {
                let icon_path = icons_dir.join(icon_file_name(name));
                if icon_path.is_file() {
                    Some(ColorOption::new(*name, icon_path))
                } else {
                    debug!("skipping color {name}: {} missing", icon_path.display());
                    None
                }
            })
            .collect::<Vec<_>>();

        debug!("loaded {} color(s) from {}", options.len(), icons_dir.display());
        Ok(Self { options })
    }

    pub fn options(&self) -> &[ColorOption] {
        &self.options
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Case-insensitive lookup by color name.
    pub fn find(&self, name: &str) -> Option<&ColorOption> {
        let name = name.trim();
        self.options
            .iter()
            .find(|option| option.name.eq_ignore_ascii_case(name))
    }

    pub fn names(&self) -> Vec<&str> {
        self.options.iter().map(|option| option.name.as_str()).collect()
    }
}

pub fn icon_file_name(color: &str) -> String {
    format!("{}.ico", color.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn icons_dir_with(names: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in names {
            std::fs::write(dir.path().join(icon_file_name(name)), b"ico").unwrap();
        }
        dir
    }

    #[test]
    fn load_keeps_palette_order_and_skips_missing_icons() {
        let dir = icons_dir_with(&["Yellow", "Default", "Red"]);
        let palette = Palette::load(dir.path()).unwrap();

        assert_eq!(palette.names(), vec!["Default", "Red", "Yellow"]);
        assert_eq!(
            palette.find("Red").unwrap().icon_path,
            dir.path().join("red.ico")
        );
    }

    #[test]
    fn load_ignores_unrecognized_files() {
        let dir = icons_dir_with(&["Blue"]);
        std::fs::write(dir.path().join("purple.ico"), b"ico").unwrap();

        let palette = Palette::load(dir.path()).unwrap();
        assert_eq!(palette.names(), vec!["Blue"]);
    }

    #[test]
    fn load_fails_without_resource_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("icons");

        let err = Palette::load(&missing).unwrap_err();
        assert!(matches!(err, PaletteError::MissingResourceDir(path) if path == missing));
    }

    #[test]
    fn find_is_case_insensitive() {
        let dir = icons_dir_with(&["Green"]);
        let palette = Palette::load(dir.path()).unwrap();

        assert!(palette.find("green").is_some());
        assert!(palette.find(" GREEN ").is_some());
        assert!(palette.find("Orange").is_none());
    }

    #[test]
    fn default_marker_is_recognized_by_name() {
        assert!(ColorOption::default_marker().is_default());
        assert!(ColorOption::new("default", "x.ico").is_default());
        assert!(!ColorOption::new("Red", "red.ico").is_default());
    }
}

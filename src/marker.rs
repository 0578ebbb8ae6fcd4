//! Writes and clears the per-folder `desktop.ini` that carries a color marker.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use log::debug;
use tempfile::NamedTempFile;

use crate::{
    attributes::{self, FileAttributes},
    palette::ColorOption,
};

pub const DESCRIPTOR_FILE: &str = "desktop.ini";

const SECTION_HEADER: &str = "[.ShellClassInfo]";
const ICON_RESOURCE_KEY: &str = "IconResource=";

pub fn descriptor_path(folder: &Path) -> PathBuf {
    folder.join(DESCRIPTOR_FILE)
}

/// Renders the descriptor text pointing at frame 0 of `icon_path`.
pub fn render_descriptor(icon_path: &Path) -> String {
    [
        SECTION_HEADER.to_string(),
        format!("{ICON_RESOURCE_KEY}{},0", icon_path.display()),
        "ConfirmFileOp=0".to_string(),
    ]
    .iter()
    .map(|line| format!("{line}\r\n"))
    .collect()
}

/// Applies `color` to `folder`.
///
/// Returns `Ok(false)` when the folder or the color's icon does not exist; no
/// file is touched in that case. I/O failures are returned to the caller.
pub fn apply_marker(folder: &Path, color: &ColorOption) -> io::Result<bool> {
    if !folder.is_dir() {
        debug!("skipping {}: not a directory", folder.display());
        return Ok(false);
    }

    if color.is_default() {
        clear_marker(folder)?;
        return Ok(true);
    }

    if !color.icon_path.is_file() {
        debug!(
            "skipping {}: icon {} missing",
            folder.display(),
            color.icon_path.display()
        );
        return Ok(false);
    }

    let descriptor = descriptor_path(folder);
    if descriptor.exists() {
        attributes::make_writable(&descriptor)?;
    }

    write_replacing(folder, &descriptor, &render_descriptor(&color.icon_path))?;
    attributes::write(&descriptor, FileAttributes::HIDDEN | FileAttributes::SYSTEM)?;

    // The system bit on the folder tells the shell to look for desktop.ini.
    let folder_attributes = attributes::read(folder)?;
    attributes::write(folder, folder_attributes | FileAttributes::SYSTEM)?;

    debug!("marked {} with {}", folder.display(), color.name);
    Ok(true)
}

/// Removes the descriptor and the folder's system bit. A folder without a
/// descriptor is left untouched.
pub fn clear_marker(folder: &Path) -> io::Result<()> {
    let descriptor = descriptor_path(folder);
    if !descriptor.exists() {
        return Ok(());
    }

    attributes::make_writable(&descriptor)?;
    fs::remove_file(&descriptor)?;

    let folder_attributes = attributes::read(folder)?;
    attributes::write(folder, folder_attributes.without(FileAttributes::SYSTEM))?;

    debug!("cleared marker on {}", folder.display());
    Ok(())
}

/// Reads back the icon path referenced by the folder's descriptor, if any.
pub fn read_marker(folder: &Path) -> io::Result<Option<PathBuf>> {
    let descriptor = descriptor_path(folder);
    let contents = match fs::read_to_string(&descriptor) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };

    Ok(parse_icon_resource(&contents))
}

fn parse_icon_resource(contents: &str) -> Option<PathBuf> {
    let mut in_section = false;
    for line in contents.lines().map(str::trim) {
        if line.starts_with('[') {
            in_section = line.eq_ignore_ascii_case(SECTION_HEADER);
            continue;
        }
        if !in_section {
            continue;
        }

        if let Some(value) = line.strip_prefix(ICON_RESOURCE_KEY) {
            let path = match value.rsplit_once(',') {
                Some((path, index)) if index.trim().parse::<i32>().is_ok() => path,
                _ => value,
            };
            return Some(PathBuf::from(path.trim()));
        }
    }
    None
}

// Stages the contents under a unique name next to the target and renames over
// it, so readers never observe a half-written descriptor. A failed rename drops
// the staged file.
fn write_replacing(folder: &Path, target: &Path, contents: &str) -> io::Result<()> {
    let mut staged = NamedTempFile::new_in(folder)?;
    staged.write_all(contents.as_bytes())?;
    staged.persist(target)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        _root: tempfile::TempDir,
        folder: PathBuf,
        red: ColorOption,
    }

    fn fixture() -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let folder = root.path().join("Projects");
        fs::create_dir(&folder).unwrap();
        let icon = root.path().join("red.ico");
        fs::write(&icon, b"ico").unwrap();

        Fixture {
            folder,
            red: ColorOption::new("Red", icon),
            _root: root,
        }
    }

    fn folder_entries(folder: &Path) -> Vec<String> {
        let mut names = fs::read_dir(folder)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    #[test]
    fn named_marker_writes_fixed_template() {
        let fx = fixture();

        assert!(apply_marker(&fx.folder, &fx.red).unwrap());

        let contents = fs::read_to_string(descriptor_path(&fx.folder)).unwrap();
        let lines = contents.lines().collect::<Vec<_>>();
        assert_eq!(
            lines,
            vec![
                "[.ShellClassInfo]".to_string(),
                format!("IconResource={},0", fx.red.icon_path.display()),
                "ConfirmFileOp=0".to_string(),
            ]
        );
        assert_eq!(folder_entries(&fx.folder), vec![DESCRIPTOR_FILE]);
    }

    #[test]
    fn written_marker_reads_back_same_icon() {
        let fx = fixture();

        apply_marker(&fx.folder, &fx.red).unwrap();
        assert_eq!(read_marker(&fx.folder).unwrap(), Some(fx.red.icon_path.clone()));
    }

    #[test]
    fn unmarked_folder_reads_as_none() {
        let fx = fixture();
        assert_eq!(read_marker(&fx.folder).unwrap(), None);
    }

    #[test]
    fn missing_folder_fails_without_side_effects() {
        let fx = fixture();
        let missing = fx.folder.join("gone");

        assert!(!apply_marker(&missing, &fx.red).unwrap());
        assert!(!apply_marker(&missing, &ColorOption::default_marker()).unwrap());
        assert!(!missing.exists());
        assert!(folder_entries(&fx.folder).is_empty());
    }

    #[test]
    fn missing_icon_fails_without_side_effects() {
        let fx = fixture();
        let ghost = ColorOption::new("Blue", fx.folder.join("blue.ico"));

        assert!(!apply_marker(&fx.folder, &ghost).unwrap());
        assert!(folder_entries(&fx.folder).is_empty());
    }

    #[test]
    fn default_marker_on_unmarked_folder_is_noop() {
        let fx = fixture();

        assert!(apply_marker(&fx.folder, &ColorOption::default_marker()).unwrap());
        assert!(folder_entries(&fx.folder).is_empty());
    }

    #[test]
    fn default_marker_removes_existing_descriptor() {
        let fx = fixture();
        apply_marker(&fx.folder, &fx.red).unwrap();

        assert!(apply_marker(&fx.folder, &ColorOption::default_marker()).unwrap());
        assert!(!descriptor_path(&fx.folder).exists());
        assert!(!attributes::read(&fx.folder)
            .unwrap()
            .contains(FileAttributes::SYSTEM));
    }

    #[test]
    fn overwrites_read_only_descriptor() {
        let fx = fixture();
        let descriptor = descriptor_path(&fx.folder);
        fs::write(&descriptor, "[.ShellClassInfo]\r\nIconResource=old.ico,0\r\n").unwrap();
        attributes::write(&descriptor, FileAttributes::READONLY).unwrap();

        assert!(apply_marker(&fx.folder, &fx.red).unwrap());
        assert_eq!(read_marker(&fx.folder).unwrap(), Some(fx.red.icon_path.clone()));
    }

    #[test]
    fn unrelated_files_survive_marking() {
        let fx = fixture();
        let user_file = fx.folder.join("desktop.ini.tmp");
        fs::write(&user_file, "keep me").unwrap();

        assert!(apply_marker(&fx.folder, &fx.red).unwrap());

        assert_eq!(fs::read_to_string(&user_file).unwrap(), "keep me");
        assert_eq!(
            folder_entries(&fx.folder),
            vec![DESCRIPTOR_FILE, "desktop.ini.tmp"]
        );
    }

    #[test]
    fn parse_ignores_keys_outside_shell_section() {
        let contents = "[Other]\r\nIconResource=wrong.ico,0\r\n[.ShellClassInfo]\r\nIconResource=C:\\icons\\a,b.ico,3\r\n";
        assert_eq!(
            parse_icon_resource(contents),
            Some(PathBuf::from("C:\\icons\\a,b.ico"))
        );
    }

    #[cfg(windows)]
    #[test]
    fn named_marker_sets_hidden_system_attributes() {
        let fx = fixture();
        apply_marker(&fx.folder, &fx.red).unwrap();

        let descriptor = attributes::read(&descriptor_path(&fx.folder)).unwrap();
        assert!(descriptor.contains(FileAttributes::HIDDEN | FileAttributes::SYSTEM));
        assert!(attributes::read(&fx.folder)
            .unwrap()
            .contains(FileAttributes::SYSTEM));
    }
}

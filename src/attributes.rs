//! File attribute access for the descriptor file and the folder that carries it.
//!
//! Windows exposes the real read-only/hidden/system bits. Elsewhere only the
//! read-only bit maps onto permissions; hidden and system are accepted and dropped.

use std::{io, ops::BitOr, path::Path};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileAttributes(u32);

impl FileAttributes {
    pub const READONLY: Self = Self(0x0001);
    pub const HIDDEN: Self = Self(0x0002);
    pub const SYSTEM: Self = Self(0x0004);
    pub const DIRECTORY: Self = Self(0x0010);
    pub const NORMAL: Self = Self(0x0080);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl BitOr for FileAttributes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[cfg(windows)]
pub fn read(path: &Path) -> io::Result<FileAttributes> {
    use std::os::windows::fs::MetadataExt;

    let metadata = std::fs::metadata(path)?;
    Ok(FileAttributes(metadata.file_attributes()))
}

#[cfg(windows)]
pub fn write(path: &Path, attributes: FileAttributes) -> io::Result<()> {
    use windows::{
        core::PCWSTR,
        Win32::Storage::FileSystem::{SetFileAttributesW, FILE_FLAGS_AND_ATTRIBUTES},
    };

    use crate::windows_utils::path_to_wide;

    // SetFileAttributesW ignores the directory bit, so a value read back from
    // a folder can be written back unchanged.
    let wide = path_to_wide(path);
    unsafe {
        SetFileAttributesW(
            PCWSTR(wide.as_ptr()),
            FILE_FLAGS_AND_ATTRIBUTES(attributes.bits()),
        )
    }
    .map_err(|_| io::Error::last_os_error())
}

#[cfg(not(windows))]
pub fn read(path: &Path) -> io::Result<FileAttributes> {
    let metadata = std::fs::metadata(path)?;
    let mut attributes = FileAttributes::default();
    if metadata.permissions().readonly() {
        attributes = attributes | FileAttributes::READONLY;
    }
    if metadata.is_dir() {
        attributes = attributes | FileAttributes::DIRECTORY;
    }
    if attributes == FileAttributes::default() {
        attributes = FileAttributes::NORMAL;
    }
    Ok(attributes)
}

#[cfg(not(windows))]
pub fn write(path: &Path, attributes: FileAttributes) -> io::Result<()> {
    let mut permissions = std::fs::metadata(path)?.permissions();
    let readonly = attributes.contains(FileAttributes::READONLY);
    if permissions.readonly() == readonly {
        return Ok(());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mode = permissions.mode();
        permissions.set_mode(if readonly { mode & !0o222 } else { mode | 0o200 });
    }
    #[cfg(not(unix))]
    permissions.set_readonly(readonly);

    std::fs::set_permissions(path, permissions)
}

/// Clears every attribute that would block overwriting or deleting `path`.
pub fn make_writable(path: &Path) -> io::Result<()> {
    write(path, FileAttributes::NORMAL)
}

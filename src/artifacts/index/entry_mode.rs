//! Entry modes shared by trees and the index

const TYPE_MASK: u32 = 0o170000;
const TYPE_DIRECTORY: u32 = 0o040000;
const TYPE_SYMLINK: u32 = 0o120000;
const TYPE_GITLINK: u32 = 0o160000;

#[derive(Debug, Clone, Copy, Eq, Ord, Default, PartialEq, PartialOrd, Hash)]
pub enum FileMode {
    #[default]
    Regular,
    Executable,
}

#[derive(Debug, Clone, Copy, Eq, Ord, Default, PartialEq, PartialOrd, Hash)]
pub enum EntryMode {
    File(FileMode),
    Symlink,
    /// Submodule commit pointer
    Gitlink,
    #[default]
    Directory,
}

impl EntryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryMode::File(FileMode::Regular) => "100644",
            EntryMode::File(FileMode::Executable) => "100755",
            EntryMode::Symlink => "120000",
            EntryMode::Gitlink => "160000",
            EntryMode::Directory => "40000",
        }
    }

    pub fn as_u32(&self) -> u32 {
        match self {
            EntryMode::File(FileMode::Regular) => 0o100644,
            EntryMode::File(FileMode::Executable) => 0o100755,
            EntryMode::Symlink => TYPE_SYMLINK,
            EntryMode::Gitlink => TYPE_GITLINK,
            EntryMode::Directory => TYPE_DIRECTORY,
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, EntryMode::Directory)
    }

    pub fn from_octal_str(mode: &str) -> anyhow::Result<Self> {
        let mode = u32::from_str_radix(mode, 8)
            .map_err(|_| anyhow::anyhow!("Invalid entry mode {mode}"))?;

        Ok(mode.into())
    }
}

/// Git normalizes file permissions to either 644 or 755, so any mode with an
/// executable bit maps to `Executable`.
impl From<u32> for EntryMode {
    fn from(mode: u32) -> Self {
        match mode & TYPE_MASK {
            TYPE_DIRECTORY => EntryMode::Directory,
            TYPE_SYMLINK => EntryMode::Symlink,
            TYPE_GITLINK => EntryMode::Gitlink,
            _ if mode & 0o111 != 0 => EntryMode::File(FileMode::Executable),
            _ => EntryMode::File(FileMode::Regular),
        }
    }
}

impl From<FileMode> for EntryMode {
    fn from(mode: FileMode) -> Self {
        EntryMode::File(mode)
    }
}

/// an enum to describe the type of a file
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FileKind {
    /// an regular file
    RegularFile,
    /// a directory
    Directory,
    /// a symbolic link
    SymbolicLink,
}

impl FileKind {
    /// the type bits stored in the high nibble of `i_mode`
    pub fn mode_bits(self) -> u16 {
        match self {
            FileKind::RegularFile => libc::S_IFREG as u16,
            FileKind::Directory => libc::S_IFDIR as u16,
            FileKind::SymbolicLink => libc::S_IFLNK as u16,
        }
    }

    /// permission bits every object of this kind is created with
    pub fn default_permissions(self) -> u16 {
        match self {
            FileKind::Directory => 0o755,
            FileKind::RegularFile | FileKind::SymbolicLink => 0o644,
        }
    }

    /// recover the kind from an `i_mode` value
    pub fn from_mode(mode: u16) -> Option<Self> {
        let format = mode & libc::S_IFMT as u16;
        [
            FileKind::RegularFile,
            FileKind::Directory,
            FileKind::SymbolicLink,
        ]
        .into_iter()
        .find(|kind| kind.mode_bits() == format)
    }
}

use std::fmt::Display;
use std::io;

use thiserror::Error;

use crate::path::PurePath;

pub(crate) mod utils;

/// Identity of one entry. Issued sequentially, never reused.
pub type Inode = usize;

/// The root directory is always inode 0 and is its own parent.
pub const ROOT_INODE: Inode = 0;

/// Read-only view of a filesystem, which is all the structure validator needs.
pub trait FsBackend {
    fn exists(&self, path: &PurePath) -> bool;
    fn is_dir(&self, path: &PurePath) -> Result<bool>;
    fn listdir(&self, path: &PurePath) -> Result<Vec<PurePath>>;
}

/// Errors raised by [`ArchiveFS`](crate::ArchiveFS) and the bound path handles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsError {
    /// Path or inode does not exist.
    #[error("no such file or directory: {0}")]
    NotFound(String),

    /// The target of a create/move/rename is already taken.
    #[error("file exists: {0}")]
    AlreadyExists(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// Malformed name, or an operation the tree shape forbids (removing the root,
    /// moving a directory below itself).
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// An inode reference could not be resolved. The parent pointers and the
    /// directory index disagree; this is a bug, not a user error.
    #[error("dangling inode reference: {0}")]
    InternalInconsistency(Inode),
}

impl FsError {
    pub fn not_found(path: impl Display) -> Self {
        Self::NotFound(path.to_string())
    }

    pub fn already_exists(path: impl Display) -> Self {
        Self::AlreadyExists(path.to_string())
    }

    pub fn not_a_directory(path: impl Display) -> Self {
        Self::NotADirectory(path.to_string())
    }

    pub fn is_a_directory(path: impl Display) -> Self {
        Self::IsADirectory(path.to_string())
    }

    pub fn directory_not_empty(path: impl Display) -> Self {
        Self::DirectoryNotEmpty(path.to_string())
    }

    pub fn invalid_path(msg: impl Display) -> Self {
        Self::InvalidPath(msg.to_string())
    }

    /// Closest `std::io::ErrorKind` for this error.
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            FsError::NotFound(_) => io::ErrorKind::NotFound,
            FsError::AlreadyExists(_) => io::ErrorKind::AlreadyExists,
            FsError::NotADirectory(_) => io::ErrorKind::NotADirectory,
            FsError::IsADirectory(_) => io::ErrorKind::IsADirectory,
            FsError::DirectoryNotEmpty(_) => io::ErrorKind::DirectoryNotEmpty,
            FsError::InvalidPath(_) => io::ErrorKind::InvalidInput,
            FsError::InternalInconsistency(_) => io::ErrorKind::Other,
        }
    }
}

impl From<FsError> for io::Error {
    fn from(e: FsError) -> Self {
        io::Error::new(e.kind(), e)
    }
}

pub type Result<T> = std::result::Result<T, FsError>;

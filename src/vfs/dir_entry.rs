use crate::core::Inode;
use crate::path::PurePath;
use crate::vfs::EntryType;

/// One row of a verbose directory listing, also returned by `stat`.
#[derive(Debug, Clone, PartialEq)]
pub struct DirEntry {
    path: PurePath,
    inode: Inode,
    parent: Inode,
    kind: EntryType,
}

impl DirEntry {
    pub fn new(path: PurePath, inode: Inode, parent: Inode, kind: EntryType) -> DirEntry {
        DirEntry {
            path,
            inode,
            parent,
            kind,
        }
    }

    pub fn path(&self) -> &PurePath {
        &self.path
    }

    /// Stored name, case preserved. Empty for the root.
    pub fn name(&self) -> &str {
        self.path.name().unwrap_or("")
    }

    pub fn inode(&self) -> Inode {
        self.inode
    }

    pub fn parent(&self) -> Inode {
        self.parent
    }

    pub fn kind(&self) -> EntryType {
        self.kind
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryType::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryType::Directory
    }

    pub fn is_root(&self) -> bool {
        self.kind == EntryType::Directory && self.path.is_root()
    }
}

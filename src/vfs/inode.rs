use std::cmp::Ordering;

use crate::core::Inode;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EntryType {
    File,
    Directory,
}

/// The single authoritative fact about one entry: its current name and the
/// directory that contains it. Knows nothing about paths, caches or the tree.
#[derive(Debug, Clone)]
pub struct InodeRecord {
    inode: Inode,
    name: String,
    parent: Inode,
}

impl InodeRecord {
    pub fn new(inode: Inode, name: impl Into<String>, parent: Inode) -> InodeRecord {
        InodeRecord {
            inode,
            name: name.into(),
            parent,
        }
    }

    pub fn inode(&self) -> Inode {
        self.inode
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Inode {
        self.parent
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub(crate) fn set_parent(&mut self, parent: Inode) {
        self.parent = parent;
    }

    /// Only the root is its own parent.
    pub fn is_root(&self) -> bool {
        self.inode == self.parent
    }
}

impl PartialEq for InodeRecord {
    fn eq(&self, other: &Self) -> bool {
        self.inode == other.inode
    }
}

impl Eq for InodeRecord {}

impl PartialOrd for InodeRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InodeRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.inode.cmp(&other.inode)
    }
}

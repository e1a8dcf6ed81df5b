use tracing::error;

use crate::core::Inode;
use crate::path::PurePath;
use crate::vfs::ArchiveFS;

/// Lazy depth-first, pre-order traversal: an entry is always yielded before any
/// of its descendants. Sibling order is unspecified.
///
/// Entries whose path cannot be derived are logged and skipped.
///
/// Created by [`ArchiveFS::walk_tree`]. Borrows the filesystem, so it cannot
/// outlive or overlap a mutation.
pub struct WalkTree<'a> {
    fs: &'a ArchiveFS,
    stack: Vec<(Inode, usize)>,
    include_root: bool,
    recursive: bool,
}

impl<'a> WalkTree<'a> {
    pub(crate) fn new(fs: &'a ArchiveFS, root: Inode, include_root: bool, recursive: bool) -> Self {
        Self {
            fs,
            stack: vec![(root, 0)],
            include_root,
            recursive,
        }
    }

    pub(crate) fn next_inode(&mut self) -> Option<Inode> {
        while let Some((inode, depth)) = self.stack.pop() {
            if depth == 0 || self.recursive {
                if let Some(children) = self.fs.child_inodes(inode) {
                    self.stack
                        .extend(children.iter().rev().map(|&child| (child, depth + 1)));
                }
            }
            if depth == 0 && !self.include_root {
                continue;
            }
            return Some(inode);
        }
        None
    }
}

impl Iterator for WalkTree<'_> {
    type Item = PurePath;

    fn next(&mut self) -> Option<PurePath> {
        while let Some(inode) = self.next_inode() {
            match self.fs.path_of(inode) {
                Ok(path) => return Some(path),
                Err(e) => error!(inode, %e, "skipping unresolvable entry"),
            }
        }
        None
    }
}

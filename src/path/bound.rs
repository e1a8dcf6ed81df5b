//! Path handle bound to one [`ArchiveFS`].

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::core::{Inode, Result};
use crate::path::PurePath;
use crate::vfs::{ArchiveFS, DirEntry, Overwrite, Target};

/// Single-threaded shared ownership of a filesystem, as held by [`ArchivePath`].
pub type SharedFs = Rc<RefCell<ArchiveFS>>;

/// A [`PurePath`] plus the filesystem that owns it.
///
/// Every method forwards to the owning [`ArchiveFS`], borrowing it only for the duration of
/// the call. Mutating methods that relocate the entry return a handle to its new location.
///
/// Two handles are equal when they name the same (case-folded) path in the same filesystem.
/// Within one filesystem, ordering follows its [`SortFlags`](crate::SortFlags).
#[derive(Clone)]
pub struct ArchivePath {
    path: PurePath,
    fs: SharedFs,
}

impl ArchivePath {
    pub fn new(fs: &SharedFs, path: impl Into<PurePath>) -> Self {
        Self {
            path: path.into(),
            fs: Rc::clone(fs),
        }
    }

    pub fn root(fs: &SharedFs) -> Self {
        Self::new(fs, PurePath::root())
    }

    fn with_pure(&self, path: PurePath) -> Self {
        Self {
            path,
            fs: Rc::clone(&self.fs),
        }
    }

    pub fn pure(&self) -> &PurePath {
        &self.path
    }

    pub fn into_pure(self) -> PurePath {
        self.path
    }

    pub fn fs(&self) -> &SharedFs {
        &self.fs
    }

    pub fn name(&self) -> Option<&str> {
        self.path.name()
    }

    pub fn suffix(&self) -> Option<String> {
        self.path.suffix()
    }

    pub fn parent(&self) -> Self {
        self.with_pure(self.path.parent())
    }

    pub fn join(&self, segment: impl AsRef<str>) -> Self {
        self.with_pure(self.path.join(segment))
    }

    pub fn with_name(&self, name: impl AsRef<str>) -> Self {
        self.with_pure(self.path.with_name(name))
    }

    // queries

    pub fn exists(&self) -> bool {
        self.fs.borrow().exists(&self.path)
    }

    pub fn is_dir(&self) -> Result<bool> {
        self.fs.borrow().is_dir(&self.path)
    }

    pub fn is_file(&self) -> Result<bool> {
        self.fs.borrow().is_file(&self.path)
    }

    pub fn inode(&self) -> Result<Inode> {
        self.fs.borrow().inode_of(&self.path)
    }

    pub fn stat(&self) -> Result<DirEntry> {
        self.fs.borrow().stat(&self.path)
    }

    pub fn listdir(&self) -> Result<Vec<ArchivePath>> {
        let paths = self.fs.borrow().listdir(&self.path)?;
        Ok(paths.into_iter().map(|p| self.with_pure(p)).collect())
    }

    /// Iterates a snapshot of the children taken when called.
    pub fn iterdir(&self) -> Result<impl Iterator<Item = ArchivePath>> {
        Ok(self.listdir()?.into_iter())
    }

    pub fn list_names(&self) -> Result<Vec<String>> {
        self.fs.borrow().list_names(&self.path)
    }

    pub fn sorted_listdir(&self) -> Result<Vec<ArchivePath>> {
        let paths = self.fs.borrow().sorted_listdir(&self.path)?;
        Ok(paths.into_iter().map(|p| self.with_pure(p)).collect())
    }

    /// Pre-order traversal, see [`ArchiveFS::walk_tree`].
    pub fn walk(&self, include_root: bool, recursive: bool) -> Result<Vec<ArchivePath>> {
        let paths: Vec<PurePath> = self
            .fs
            .borrow()
            .walk_tree(&self.path, include_root, recursive)?
            .collect();
        Ok(paths.into_iter().map(|p| self.with_pure(p)).collect())
    }

    // mutations

    pub fn touch(&self) -> Result<Inode> {
        self.fs.borrow_mut().touch(&self.path)
    }

    pub fn mkdir(&self, exist_ok: bool) -> Result<Inode> {
        self.fs.borrow_mut().mkdir(&self.path, exist_ok)
    }

    pub fn rm(&self) -> Result<()> {
        self.fs.borrow_mut().rm(&self.path)
    }

    pub fn rmdir(&self) -> Result<()> {
        self.fs.borrow_mut().rmdir(&self.path)
    }

    pub fn rmtree(&self) -> Result<usize> {
        self.fs.borrow_mut().rmtree(&self.path)
    }

    /// Moves the entry into `dest_dir`. `None` when skipped under [`Overwrite::IGNORE`].
    pub fn move_to(
        &self,
        dest_dir: impl Into<PurePath>,
        overwrite: Overwrite,
    ) -> Result<Option<ArchivePath>> {
        let dest_dir = dest_dir.into();
        let name = self.stat()?.name().to_string();
        let moved = self
            .fs
            .borrow_mut()
            .move_to(&self.path, &dest_dir, overwrite)?;
        Ok(moved.then(|| self.with_pure(dest_dir.join(name))))
    }

    pub fn rename(
        &self,
        dest: impl Into<PurePath>,
        overwrite: Overwrite,
    ) -> Result<Option<ArchivePath>> {
        let dest = dest.into();
        let renamed = self.fs.borrow_mut().rename(&self.path, &dest, overwrite)?;
        Ok(renamed.then(|| self.with_pure(dest)))
    }

    pub fn chname(&self, new_name: &str, overwrite: Overwrite) -> Result<Option<ArchivePath>> {
        let renamed = self
            .fs
            .borrow_mut()
            .chname(&self.path, new_name, overwrite)?;
        Ok(renamed.then(|| self.with_name(new_name)))
    }

    pub fn replace(&self, dest: impl Into<PurePath>) -> Result<ArchivePath> {
        let dest = dest.into();
        self.fs.borrow_mut().replace(&self.path, &dest)?;
        Ok(self.with_pure(dest))
    }
}

impl From<&ArchivePath> for PurePath {
    fn from(path: &ArchivePath) -> Self {
        path.path.clone()
    }
}

impl From<&ArchivePath> for Target {
    fn from(path: &ArchivePath) -> Self {
        Target::ByPath(path.path.clone())
    }
}

impl PartialEq for ArchivePath {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.fs, &other.fs) && self.path == other.path
    }
}

impl Eq for ArchivePath {}

impl Hash for ArchivePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl PartialOrd for ArchivePath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ArchivePath {
    /// Groups handles by filesystem, then follows its sort policy. Paths the policy cannot
    /// tell apart fall back to case-folded path order, keeping `cmp` consistent with `eq`.
    fn cmp(&self, other: &Self) -> Ordering {
        Rc::as_ptr(&self.fs)
            .cmp(&Rc::as_ptr(&other.fs))
            .then_with(|| self.fs.borrow().compare(&self.path, &other.path))
            .then_with(|| self.path.cmp(&other.path))
    }
}

impl fmt::Display for ArchivePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.path, f)
    }
}

impl fmt::Debug for ArchivePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArchivePath({})", self.path)
    }
}

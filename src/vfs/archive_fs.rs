//! This module provides the case-insensitive, in-memory filesystem that models the layout of a
//! mod archive before anything is written to disk.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, error, trace};

use crate::core::{FsBackend, FsError, Inode, ROOT_INODE, Result, utils};
use crate::path::{PurePath, SharedFs};
use crate::vfs::cache::{Caches, Mutation};
use crate::vfs::{DirEntry, EntryType, InodeRecord, Overwrite, SortFlags, WalkTree};

/// Argument of operations that accept either a path or a raw inode number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    ByPath(PurePath),
    ByInode(Inode),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::ByPath(path) => write!(f, "{path}"),
            Target::ByInode(inode) => write!(f, "inode {inode}"),
        }
    }
}

impl From<PurePath> for Target {
    fn from(path: PurePath) -> Self {
        Target::ByPath(path)
    }
}

impl From<&PurePath> for Target {
    fn from(path: &PurePath) -> Self {
        Target::ByPath(path.clone())
    }
}

impl From<&str> for Target {
    fn from(path: &str) -> Self {
        Target::ByPath(PurePath::new(path))
    }
}

impl From<String> for Target {
    fn from(path: String) -> Self {
        Target::ByPath(PurePath::new(path))
    }
}

impl From<&String> for Target {
    fn from(path: &String) -> Self {
        Target::ByPath(PurePath::new(path))
    }
}

impl From<Inode> for Target {
    fn from(inode: Inode) -> Self {
        Target::ByInode(inode)
    }
}

/// Public verb behind a relocation. Decides how a non-empty directory in the way is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relocation {
    Move,
    Rename,
}

impl Relocation {
    fn occupied(self, target: &PurePath) -> FsError {
        match self {
            Relocation::Move => FsError::already_exists(target),
            Relocation::Rename => FsError::directory_not_empty(target),
        }
    }
}

/// A case-insensitive pseudo-filesystem kept entirely in memory.
///
/// `ArchiveFS` lets tooling enumerate, rearrange, rename, merge and validate the tree of an
/// archive before it is installed. It never touches the host filesystem.
///
/// ### Internal state
///
/// * `inodes`: the inode table. Slot `n` holds the record of inode `n`; a deleted inode leaves a
///   tombstone (`None`) so the number is never issued again and stale references fail to resolve.
/// * `dirs`: the directory index: directory inode -> inodes it directly contains. Files never
///   appear as keys.
/// * `caches`: memoized derived values (paths, names, listings). Never authoritative; see
///   [`Mutation::invalidations`] for what each mutation drops.
/// * `sort`: ordering policy used by [`ArchiveFS::compare`] and sorted listings.
///
/// ### Invariants
///
/// 1. **Root**: inode 0 exists, is a directory and is its own parent.
/// 2. **Parents**: every other live inode has a live directory as parent.
/// 3. **Index consistency**: `i ∈ dirs[d]` exactly when `inodes[i].parent == d`.
/// 4. **Names**: siblings never share a case-folded name; stored names keep their case.
/// 5. **Identity**: inode numbers only grow and are never reused.
///
/// ### Thread Safety
///
/// Built for exclusive use by one thread. Lookups memoize through a `RefCell`, so the type is
/// not `Sync`. Use [`ArchiveFS::duplicate`] to hand an independent snapshot elsewhere.
///
/// ### Example
///
/// ```
/// use archive_fs::{ArchiveFS, Overwrite};
///
/// let mut fs = ArchiveFS::new();
/// fs.mkdir("/a/b/c", false).unwrap();
/// fs.touch("/a/b/c/f.txt").unwrap();
/// fs.move_to("/a/b/c", "/a", Overwrite::PROMPT).unwrap();
///
/// assert!(fs.exists("/A/C/F.TXT"));
/// assert!(!fs.exists("/a/b/c"));
/// ```
pub struct ArchiveFS {
    inodes: Vec<Option<InodeRecord>>,
    dirs: BTreeMap<Inode, BTreeSet<Inode>>,
    caches: RefCell<Caches>,
    sort: SortFlags,
}

impl ArchiveFS {
    /// Creates an empty filesystem holding only the root directory.
    pub fn new() -> Self {
        Self::with_sort(SortFlags::default())
    }

    pub fn with_sort(sort: SortFlags) -> Self {
        let mut dirs = BTreeMap::new();
        dirs.insert(ROOT_INODE, BTreeSet::new());

        Self {
            inodes: vec![Some(InodeRecord::new(ROOT_INODE, "", ROOT_INODE))],
            dirs,
            caches: RefCell::new(Caches::default()),
            sort,
        }
    }

    pub fn sort_flags(&self) -> SortFlags {
        self.sort
    }

    pub fn set_sort(&mut self, sort: SortFlags) {
        self.sort = sort;
    }

    /// Wraps the filesystem so that [`ArchivePath`](crate::ArchivePath) handles can share it.
    pub fn shared(self) -> SharedFs {
        Rc::new(RefCell::new(self))
    }

    pub fn root(&self) -> PurePath {
        PurePath::root()
    }

    /// Number of live entries, root included.
    pub fn len(&self) -> usize {
        self.inodes.iter().filter(|slot| slot.is_some()).count()
    }

    /// `true` when nothing but the root exists.
    pub fn is_empty(&self) -> bool {
        self.len() == 1
    }

    /// Number of inodes ever issued, tombstones included.
    pub fn inode_count(&self) -> usize {
        self.inodes.len()
    }

    // ----------------------------------------------------------------------------------------
    // identity and derived values
    // ----------------------------------------------------------------------------------------

    /// The record behind `inode`, or `InternalInconsistency` for a tombstone or an inode that
    /// was never issued.
    pub fn record(&self, inode: Inode) -> Result<&InodeRecord> {
        match self.inodes.get(inode) {
            Some(Some(record)) => Ok(record),
            _ => Err(FsError::InternalInconsistency(inode)),
        }
    }

    fn record_mut(&mut self, inode: Inode) -> Result<&mut InodeRecord> {
        match self.inodes.get_mut(inode) {
            Some(Some(record)) => Ok(record),
            _ => Err(FsError::InternalInconsistency(inode)),
        }
    }

    pub(crate) fn child_inodes(&self, inode: Inode) -> Option<&BTreeSet<Inode>> {
        self.dirs.get(&inode)
    }

    fn is_dir_inode(&self, inode: Inode) -> bool {
        self.dirs.contains_key(&inode)
    }

    fn children(&self, dir: Inode) -> Result<&BTreeSet<Inode>> {
        match self.dirs.get(&dir) {
            Some(children) => Ok(children),
            None => Err(FsError::not_a_directory(self.path_of(dir)?)),
        }
    }

    pub fn parent_of(&self, inode: Inode) -> Result<Inode> {
        Ok(self.record(inode)?.parent())
    }

    /// Stored name of `inode`, case preserved.
    pub fn name_of(&self, inode: Inode) -> Result<String> {
        if let Some(name) = self.caches.borrow().names.get(&inode) {
            return Ok(name.clone());
        }
        let name = self.record(inode)?.name().to_string();
        self.caches.borrow_mut().names.insert(inode, name.clone());
        Ok(name)
    }

    fn lower_name_of(&self, inode: Inode) -> Result<String> {
        if let Some(name) = self.caches.borrow().lower_names.get(&inode) {
            return Ok(name.clone());
        }
        let name = utils::fold(&self.name_of(inode)?);
        self.caches.borrow_mut().lower_names.insert(inode, name.clone());
        Ok(name)
    }

    /// Derives the path of `inode` by walking parent pointers up to the root.
    pub fn path_of(&self, inode: Inode) -> Result<PurePath> {
        if let Some(path) = self.caches.borrow().paths.get(&inode) {
            return Ok(path.clone());
        }
        trace!(inode, "path cache miss");

        let mut parts = Vec::new();
        let mut current = inode;
        loop {
            let record = self.record(current)?;
            if record.is_root() {
                break;
            }
            parts.push(record.name().to_string());
            if parts.len() > self.inodes.len() {
                error!(inode, "parent chain does not reach the root");
                return Err(FsError::InternalInconsistency(inode));
            }
            current = record.parent();
        }
        parts.reverse();

        let path = PurePath::from_parts(parts);
        self.caches.borrow_mut().paths.insert(inode, path.clone());
        Ok(path)
    }

    /// Case-insensitive lookup of `path`.
    pub fn resolve(&self, path: &PurePath) -> Option<Inode> {
        if let Some(&inode) = self.caches.borrow().lookup.get(path) {
            return Some(inode);
        }
        trace!(%path, "lookup cache miss");

        let mut current = ROOT_INODE;
        for part in path.parts() {
            current = self.child_named(current, part).ok().flatten()?;
        }
        self.caches.borrow_mut().remember_lookup(path.clone(), current);
        Some(current)
    }

    pub fn inode_of(&self, path: impl Into<PurePath>) -> Result<Inode> {
        let path = path.into();
        self.resolve(&path).ok_or_else(|| FsError::not_found(&path))
    }

    /// The child of `dir` whose name matches `name` ignoring case.
    fn child_named(&self, dir: Inode, name: &str) -> Result<Option<Inode>> {
        let folded = utils::fold(name);
        for &child in self.children(dir)? {
            if self.lower_name_of(child)? == folded {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }

    fn resolve_target(&self, target: &Target) -> Result<Inode> {
        match target {
            Target::ByPath(path) => self.resolve(path).ok_or_else(|| FsError::not_found(path)),
            Target::ByInode(inode) => self.record(*inode).map(|_| *inode),
        }
    }

    fn dir_inode(&self, target: &Target) -> Result<Inode> {
        let inode = self.resolve_target(target)?;
        if !self.is_dir_inode(inode) {
            return Err(FsError::not_a_directory(target));
        }
        Ok(inode)
    }

    /// `true` if `ancestor` is `inode` or one of its ancestors.
    fn is_ancestor_or_self(&self, ancestor: Inode, inode: Inode) -> Result<bool> {
        let mut current = inode;
        for _ in 0..=self.inodes.len() {
            if current == ancestor {
                return Ok(true);
            }
            let record = self.record(current)?;
            if record.is_root() {
                return Ok(false);
            }
            current = record.parent();
        }
        Err(FsError::InternalInconsistency(inode))
    }

    // ----------------------------------------------------------------------------------------
    // queries
    // ----------------------------------------------------------------------------------------

    /// Checks whether a path or inode exists. Never fails.
    pub fn exists(&self, target: impl Into<Target>) -> bool {
        match target.into() {
            Target::ByPath(path) => self.resolve(&path).is_some(),
            Target::ByInode(inode) => matches!(self.inodes.get(inode), Some(Some(_))),
        }
    }

    /// Checks whether `target` is a directory.
    ///
    /// `NotFound` for a missing path, `InternalInconsistency` for a stale inode.
    pub fn is_dir(&self, target: impl Into<Target>) -> Result<bool> {
        let inode = self.resolve_target(&target.into())?;
        Ok(self.is_dir_inode(inode))
    }

    pub fn is_file(&self, target: impl Into<Target>) -> Result<bool> {
        self.is_dir(target).map(|is_dir| !is_dir)
    }

    pub fn stat(&self, target: impl Into<Target>) -> Result<DirEntry> {
        let inode = self.resolve_target(&target.into())?;
        self.entry_of(inode)
    }

    fn entry_of(&self, inode: Inode) -> Result<DirEntry> {
        let kind = if self.is_dir_inode(inode) {
            EntryType::Directory
        } else {
            EntryType::File
        };
        Ok(DirEntry::new(
            self.path_of(inode)?,
            inode,
            self.parent_of(inode)?,
            kind,
        ))
    }

    /// Snapshot of the direct children of a directory, unordered.
    pub fn listdir(&self, target: impl Into<Target>) -> Result<Vec<PurePath>> {
        let dir = self.dir_inode(&target.into())?;
        self.children(dir)?
            .iter()
            .map(|&child| self.path_of(child))
            .collect()
    }

    /// Lazy variant of [`listdir`](Self::listdir). A child whose path cannot be derived is
    /// logged and skipped.
    pub fn iterdir(
        &self,
        target: impl Into<Target>,
    ) -> Result<impl Iterator<Item = PurePath> + '_> {
        let dir = self.dir_inode(&target.into())?;
        Ok(self
            .children(dir)?
            .iter()
            .filter_map(move |&child| match self.path_of(child) {
                Ok(path) => Some(path),
                Err(e) => {
                    error!(inode = child, %e, "skipping unresolvable child");
                    None
                }
            }))
    }

    /// Stored names of the direct children of a directory.
    pub fn list_names(&self, target: impl Into<Target>) -> Result<Vec<String>> {
        let dir = self.dir_inode(&target.into())?;
        if let Some(names) = self.caches.borrow().child_names.get(&dir) {
            return Ok(names.clone());
        }
        let names = self
            .children(dir)?
            .iter()
            .map(|&child| self.name_of(child))
            .collect::<Result<Vec<_>>>()?;
        self.caches.borrow_mut().child_names.insert(dir, names.clone());
        Ok(names)
    }

    /// Direct children with inode, parent and kind.
    pub fn listdir_verbose(&self, target: impl Into<Target>) -> Result<Vec<DirEntry>> {
        let dir = self.dir_inode(&target.into())?;
        if let Some(listing) = self.caches.borrow().listings.get(&dir) {
            return Ok(listing.clone());
        }
        let listing = self
            .children(dir)?
            .iter()
            .map(|&child| self.entry_of(child))
            .collect::<Result<Vec<_>>>()?;
        self.caches.borrow_mut().listings.insert(dir, listing.clone());
        Ok(listing)
    }

    /// [`listdir`](Self::listdir) ordered by the sort policy.
    pub fn sorted_listdir(&self, target: impl Into<Target>) -> Result<Vec<PurePath>> {
        let mut paths = self.listdir(target)?;
        self.sort_paths(&mut paths);
        Ok(paths)
    }

    /// Depth-first, pre-order traversal starting at `root`.
    ///
    /// * `include_root`: yield `root` itself first.
    /// * `recursive`: descend below the direct children.
    pub fn walk_tree(
        &self,
        root: impl Into<Target>,
        include_root: bool,
        recursive: bool,
    ) -> Result<WalkTree<'_>> {
        let inode = self.resolve_target(&root.into())?;
        Ok(WalkTree::new(self, inode, include_root, recursive))
    }

    // ----------------------------------------------------------------------------------------
    // ordering
    // ----------------------------------------------------------------------------------------

    /// Orders two paths by the active [`SortFlags`].
    ///
    /// 1. `DIRS_FIRST` (else `FILES_FIRST`) decides when exactly one side is a directory.
    /// 2. `CASE_SENSITIVE | NAME` compares raw names of siblings.
    /// 3. `NAME` compares case-folded paths.
    /// 4. `INODE` compares inode numbers when nothing above decided.
    ///
    /// `DESCENDING` reverses the result.
    pub fn compare(&self, a: &PurePath, b: &PurePath) -> Ordering {
        let flags = self.sort;
        let a_inode = self.resolve(a);
        let b_inode = self.resolve(b);
        let a_dir = a_inode.is_some_and(|i| self.is_dir_inode(i));
        let b_dir = b_inode.is_some_and(|i| self.is_dir_inode(i));

        let mut ord = Ordering::Equal;
        if a_dir != b_dir {
            if flags.contains(SortFlags::DIRS_FIRST) {
                ord = if a_dir { Ordering::Less } else { Ordering::Greater };
            } else if flags.contains(SortFlags::FILES_FIRST) {
                ord = if a_dir { Ordering::Greater } else { Ordering::Less };
            }
        }
        if ord == Ordering::Equal {
            let siblings = a.parent() == b.parent();
            if flags.contains(SortFlags::CASE_SENSITIVE | SortFlags::NAME) && siblings {
                ord = a.name().cmp(&b.name());
            } else if flags.contains(SortFlags::NAME) {
                ord = a.cmp(b);
            }
        }
        if ord == Ordering::Equal && flags.contains(SortFlags::INODE) {
            ord = a_inode.cmp(&b_inode);
        }

        if flags.contains(SortFlags::DESCENDING) {
            ord.reverse()
        } else {
            ord
        }
    }

    pub fn sort_paths(&self, paths: &mut [PurePath]) {
        paths.sort_by(|a, b| self.compare(a, b));
    }

    // ----------------------------------------------------------------------------------------
    // creation and removal
    // ----------------------------------------------------------------------------------------

    fn create(&mut self, parent: Inode, name: &str, is_dir: bool) -> Result<Inode> {
        if !utils::is_valid_name(name) {
            return Err(FsError::invalid_path(format!("bad entry name {name:?}")));
        }
        if !self.is_dir_inode(parent) {
            return Err(FsError::InternalInconsistency(parent));
        }

        let inode = self.inodes.len();
        self.inodes.push(Some(InodeRecord::new(inode, name, parent)));
        if let Some(siblings) = self.dirs.get_mut(&parent) {
            siblings.insert(inode);
        }
        if is_dir {
            self.dirs.insert(inode, BTreeSet::new());
        }
        self.caches.get_mut().invalidate(Mutation::Create { parent });

        debug!(inode, parent, entry = name, is_dir, "created entry");
        Ok(inode)
    }

    /// Walks `path` from the root, creating every missing directory. Fails with
    /// `NotADirectory` before creating anything if an existing component is a file.
    fn make_dirs(&mut self, path: &PurePath) -> Result<Inode> {
        let mut current = ROOT_INODE;
        for (depth, part) in path.parts().iter().enumerate() {
            current = match self.child_named(current, part)? {
                Some(child) if self.is_dir_inode(child) => child,
                Some(_) => {
                    let prefix = PurePath::from_parts(path.parts()[..=depth].to_vec());
                    return Err(FsError::not_a_directory(prefix));
                }
                None => self.create(current, part, true)?,
            };
        }
        Ok(current)
    }

    /// Creates a file, along with any missing ancestor directory.
    /// Returns the inode of the (possibly pre-existing) entry.
    pub fn touch(&mut self, path: impl Into<PurePath>) -> Result<Inode> {
        let path = path.into();
        if let Some(inode) = self.resolve(&path) {
            return Ok(inode);
        }
        let name = path
            .name()
            .ok_or_else(|| FsError::invalid_path("the root cannot be created"))?;
        let parent = self.make_dirs(&path.parent())?;
        self.create(parent, name, false)
    }

    /// Creates a directory and all its missing parents.
    ///
    /// `AlreadyExists` if `path` exists, unless `exist_ok` is set and it is a directory.
    pub fn mkdir(&mut self, path: impl Into<PurePath>, exist_ok: bool) -> Result<Inode> {
        let path = path.into();
        if let Some(inode) = self.resolve(&path) {
            if exist_ok && self.is_dir_inode(inode) {
                return Ok(inode);
            }
            return Err(FsError::already_exists(&path));
        }
        self.make_dirs(&path)
    }

    fn delete_inode(&mut self, inode: Inode) -> Result<()> {
        let parent = self.parent_of(inode)?;
        if inode == ROOT_INODE {
            return Err(FsError::invalid_path("the root cannot be removed"));
        }
        if self.dirs.get(&inode).is_some_and(|children| !children.is_empty()) {
            return Err(FsError::directory_not_empty(self.path_of(inode)?));
        }

        self.dirs.remove(&inode);
        if let Some(siblings) = self.dirs.get_mut(&parent) {
            siblings.remove(&inode);
        }
        self.caches.get_mut().invalidate(Mutation::Delete { inode, parent });
        self.inodes[inode] = None;

        debug!(inode, parent, "removed entry");
        Ok(())
    }

    fn remove_subtree(&mut self, root: Inode) -> Result<usize> {
        let mut walk = WalkTree::new(self, root, true, true);
        let mut doomed = Vec::new();
        while let Some(inode) = walk.next_inode() {
            doomed.push(inode);
        }
        // pre-order reversed: every entry goes before its parent
        for &inode in doomed.iter().rev() {
            self.delete_inode(inode)?;
        }
        Ok(doomed.len())
    }

    /// Removes a file.
    pub fn rm(&mut self, path: impl Into<PurePath>) -> Result<()> {
        let path = path.into();
        let inode = self.inode_of(&path)?;
        if self.is_dir_inode(inode) {
            return Err(FsError::is_a_directory(&path));
        }
        self.delete_inode(inode)
    }

    /// Removes an empty directory.
    pub fn rmdir(&mut self, path: impl Into<PurePath>) -> Result<()> {
        let path = path.into();
        if path.is_root() {
            return Err(FsError::invalid_path("the root cannot be removed"));
        }
        let inode = self.inode_of(&path)?;
        if !self.is_dir_inode(inode) {
            return Err(FsError::not_a_directory(&path));
        }
        self.delete_inode(inode)
    }

    /// Removes `path` and everything below it. Returns the number of removed entries.
    pub fn rmtree(&mut self, path: impl Into<PurePath>) -> Result<usize> {
        let path = path.into();
        if path.is_root() {
            return Err(FsError::invalid_path("the root cannot be removed"));
        }
        let inode = self.inode_of(&path)?;
        let removed = self.remove_subtree(inode)?;
        debug!(%path, removed, "removed tree");
        Ok(removed)
    }

    // ----------------------------------------------------------------------------------------
    // move / rename
    // ----------------------------------------------------------------------------------------

    /// Moves `src` into the directory `dest_dir`, keeping its name and inode.
    ///
    /// A same-named entry already in `dest_dir` is reported as `AlreadyExists`, file or
    /// non-empty directory alike, unless `overwrite` says otherwise. Returns `Ok(false)` when a collision was skipped under [`Overwrite::IGNORE`].
    pub fn move_to(
        &mut self,
        src: impl Into<PurePath>,
        dest_dir: impl Into<PurePath>,
        overwrite: Overwrite,
    ) -> Result<bool> {
        let dest_dir = dest_dir.into();
        let inode = self.inode_of(src)?;
        let parent = self.inode_of(&dest_dir)?;
        if !self.is_dir_inode(parent) {
            return Err(FsError::not_a_directory(&dest_dir));
        }
        let name = self.name_of(inode)?;
        self.relocate(inode, parent, &name, overwrite, Relocation::Move)
    }

    /// Moves `src` to the full path `dest`.
    ///
    /// An existing directory at `dest` is replaced, not descended into: an empty one is removed
    /// silently, a non-empty one follows `overwrite` and raises `DirectoryNotEmpty` under
    /// [`Overwrite::PROMPT`]. Renaming to a different case of the same
    /// path only changes the stored name.
    pub fn rename(
        &mut self,
        src: impl Into<PurePath>,
        dest: impl Into<PurePath>,
        overwrite: Overwrite,
    ) -> Result<bool> {
        let dest = dest.into();
        let inode = self.inode_of(src)?;
        let name = dest
            .name()
            .ok_or_else(|| FsError::invalid_path("cannot rename onto the root"))?;
        let dest_parent = dest.parent();
        let parent = self.inode_of(&dest_parent)?;
        if !self.is_dir_inode(parent) {
            return Err(FsError::not_a_directory(&dest_parent));
        }
        self.relocate(inode, parent, name, overwrite, Relocation::Rename)
    }

    /// Changes only the final segment of `path`.
    pub fn chname(
        &mut self,
        path: impl Into<PurePath>,
        new_name: &str,
        overwrite: Overwrite,
    ) -> Result<bool> {
        if !utils::is_valid_name(new_name) {
            return Err(FsError::invalid_path(format!("bad entry name {new_name:?}")));
        }
        let path = path.into();
        let dest = path.with_name(new_name);
        self.rename(path, dest, overwrite)
    }

    /// [`rename`](Self::rename) with [`Overwrite::REPLACE`].
    pub fn replace(
        &mut self,
        src: impl Into<PurePath>,
        dest: impl Into<PurePath>,
    ) -> Result<bool> {
        self.rename(src, dest, Overwrite::REPLACE)
    }

    fn relocate(
        &mut self,
        src: Inode,
        parent: Inode,
        name: &str,
        overwrite: Overwrite,
        verb: Relocation,
    ) -> Result<bool> {
        // Everything that can fail is checked before the first change.
        self.check_relocate(src, parent, name, overwrite, verb)?;
        self.apply_relocate(src, parent, name, overwrite, verb)
    }

    fn check_relocate(
        &self,
        src: Inode,
        parent: Inode,
        name: &str,
        overwrite: Overwrite,
        verb: Relocation,
    ) -> Result<()> {
        if src == ROOT_INODE {
            return Err(FsError::invalid_path("the root cannot be moved"));
        }
        if !utils::is_valid_name(name) {
            return Err(FsError::invalid_path(format!("bad entry name {name:?}")));
        }
        if self.is_ancestor_or_self(src, parent)? {
            return Err(FsError::invalid_path(format!(
                "cannot move {} into itself",
                self.path_of(src)?
            )));
        }

        let target = match self.child_named(parent, name)? {
            Some(target) if target != src => target,
            _ => return Ok(()),
        };
        if self.is_ancestor_or_self(target, src)? {
            return Err(FsError::invalid_path(format!(
                "cannot replace {} with its own descendant",
                self.path_of(target)?
            )));
        }

        if !self.is_dir_inode(target) {
            if overwrite.replaces() || overwrite.ignores() {
                return Ok(());
            }
            return Err(FsError::already_exists(self.path_of(target)?));
        }
        if self.children(target)?.is_empty() {
            return Ok(());
        }
        if self.is_dir_inode(src) && overwrite.merges() {
            for &child in self.children(src)? {
                self.check_relocate(child, target, &self.name_of(child)?, overwrite, verb)?;
            }
            return Ok(());
        }
        if overwrite.replaces() || overwrite.ignores() {
            return Ok(());
        }
        Err(verb.occupied(&self.path_of(target)?))
    }

    fn apply_relocate(
        &mut self,
        src: Inode,
        parent: Inode,
        name: &str,
        overwrite: Overwrite,
        verb: Relocation,
    ) -> Result<bool> {
        if let Some(target) = self.child_named(parent, name)? {
            if target != src {
                if self.is_dir_inode(target) {
                    if self.children(target)?.is_empty() {
                        self.delete_inode(target)?;
                    } else if self.is_dir_inode(src) && overwrite.merges() {
                        return self.merge(src, target, overwrite, verb);
                    } else if overwrite.replaces() {
                        self.remove_subtree(target)?;
                    } else if overwrite.ignores() {
                        debug!(src, target, "collision ignored");
                        return Ok(false);
                    } else {
                        return Err(verb.occupied(&self.path_of(target)?));
                    }
                } else if overwrite.replaces() {
                    self.delete_inode(target)?;
                } else if overwrite.ignores() {
                    debug!(src, target, "collision ignored");
                    return Ok(false);
                } else {
                    return Err(FsError::already_exists(self.path_of(target)?));
                }
            }
        }
        self.place(src, parent, name)?;
        Ok(true)
    }

    /// Moves every child of `src` into `target`, then drops `src` if it ended up empty.
    fn merge(
        &mut self,
        src: Inode,
        target: Inode,
        overwrite: Overwrite,
        verb: Relocation,
    ) -> Result<bool> {
        let children: Vec<Inode> = self.children(src)?.iter().copied().collect();
        let mut complete = true;
        for child in children {
            let name = self.name_of(child)?;
            if !self.apply_relocate(child, target, &name, overwrite, verb)? {
                complete = false;
            }
        }
        if self.children(src)?.is_empty() {
            self.delete_inode(src)?;
        } else {
            complete = false;
        }
        debug!(src, target, complete, "merged directory");
        Ok(complete)
    }

    /// Rewrites the record of `inode` and keeps the directory index in step.
    fn place(&mut self, inode: Inode, parent: Inode, name: &str) -> Result<()> {
        if !self.is_dir_inode(parent) {
            return Err(FsError::InternalInconsistency(parent));
        }
        let record = self.record(inode)?;
        let old_parent = record.parent();
        let renamed = record.name() != name;
        let moved = old_parent != parent;
        let is_dir = self.is_dir_inode(inode);
        if !renamed && !moved {
            return Ok(());
        }

        let record = self.record_mut(inode)?;
        record.set_name(name);
        record.set_parent(parent);

        if moved {
            if let Some(siblings) = self.dirs.get_mut(&old_parent) {
                siblings.remove(&inode);
            }
            if let Some(siblings) = self.dirs.get_mut(&parent) {
                siblings.insert(inode);
            }
            self.caches.get_mut().invalidate(Mutation::Move {
                inode,
                old_parent,
                new_parent: parent,
                is_dir,
            });
        }
        if renamed {
            self.caches.get_mut().invalidate(Mutation::Rename {
                inode,
                parent,
                is_dir,
            });
        }

        debug!(inode, old_parent, parent, entry = name, "relocated entry");
        Ok(())
    }

    // ----------------------------------------------------------------------------------------
    // copies
    // ----------------------------------------------------------------------------------------

    /// Builds an independent filesystem whose root is the directory `from`.
    ///
    /// Paths are re-keyed relative to `from`; inode numbers are issued afresh.
    pub fn derive_subtree(&self, from: impl Into<PurePath>) -> Result<ArchiveFS> {
        let from = from.into();
        let root = self.inode_of(&from)?;
        if !self.is_dir_inode(root) {
            return Err(FsError::not_a_directory(&from));
        }

        let mut derived = ArchiveFS::with_sort(self.sort);
        let mut walk = WalkTree::new(self, root, false, true);
        while let Some(inode) = walk.next_inode() {
            let relative = self
                .path_of(inode)?
                .relative_to(&from)
                .ok_or(FsError::InternalInconsistency(inode))?;
            if self.is_dir_inode(inode) {
                derived.mkdir(relative, true)?;
            } else {
                derived.touch(relative)?;
            }
        }

        debug!(%from, entries = derived.len(), "derived subtree");
        Ok(derived)
    }

    /// Deep copy of the inode table and directory index, with cold caches.
    pub fn duplicate(&self) -> ArchiveFS {
        debug!(inodes = self.inodes.len(), "duplicated filesystem");
        ArchiveFS {
            inodes: self.inodes.clone(),
            dirs: self.dirs.clone(),
            caches: RefCell::new(Caches::default()),
            sort: self.sort,
        }
    }

    // ----------------------------------------------------------------------------------------
    // invariants
    // ----------------------------------------------------------------------------------------

    /// Verifies the structural invariants, returning `InternalInconsistency` naming the first
    /// offending inode.
    pub fn check_consistency(&self) -> Result<()> {
        let result = self.verify();
        if let Err(e) = &result {
            error!(%e, "archive filesystem invariant violated");
        }
        result
    }

    fn verify(&self) -> Result<()> {
        let root = self.record(ROOT_INODE)?;
        if !root.is_root() || !self.is_dir_inode(ROOT_INODE) {
            return Err(FsError::InternalInconsistency(ROOT_INODE));
        }

        for (inode, slot) in self.inodes.iter().enumerate() {
            let Some(record) = slot else {
                if self.dirs.contains_key(&inode) {
                    return Err(FsError::InternalInconsistency(inode));
                }
                continue;
            };
            if record.inode() != inode {
                return Err(FsError::InternalInconsistency(inode));
            }
            if inode == ROOT_INODE {
                continue;
            }
            let parent = record.parent();
            if parent == inode || !self.dirs.get(&parent).is_some_and(|c| c.contains(&inode)) {
                return Err(FsError::InternalInconsistency(inode));
            }
            self.path_of(inode)?;
        }

        for (&dir, children) in &self.dirs {
            self.record(dir)?;
            let mut names = HashSet::new();
            for &child in children {
                let unique = names.insert(self.lower_name_of(child)?);
                if self.record(child)?.parent() != dir || !unique {
                    return Err(FsError::InternalInconsistency(child));
                }
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn cache_len(&self, cache: crate::vfs::CacheKind) -> usize {
        self.caches.borrow().len(cache)
    }
}

impl Default for ArchiveFS {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ArchiveFS {
    fn clone(&self) -> Self {
        self.duplicate()
    }
}

impl fmt::Debug for ArchiveFS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "\n{inode:<8}    {ty:<4}    {parent:<8}    name",
            inode = "inode",
            ty = "type",
            parent = "parent",
        )?;
        for record in self.inodes.iter().flatten() {
            writeln!(
                f,
                "{inode:<8}    {ty:<4}    {parent:<8}    {name:?}",
                inode = record.inode(),
                ty = if self.is_dir_inode(record.inode()) { "dir" } else { "file" },
                parent = record.parent(),
                name = record.name(),
            )?;
        }
        Ok(())
    }
}

impl FsBackend for ArchiveFS {
    fn exists(&self, path: &PurePath) -> bool {
        ArchiveFS::exists(self, path)
    }

    fn is_dir(&self, path: &PurePath) -> Result<bool> {
        ArchiveFS::is_dir(self, path)
    }

    fn listdir(&self, path: &PurePath) -> Result<Vec<PurePath>> {
        ArchiveFS::listdir(self, path)
    }
}

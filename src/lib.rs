//! An in-memory, case-insensitive pseudo-filesystem for mod archives.
//! Lets tooling preview and fix up the layout of an archive before anything is installed.
//!
//! ### Overview
//!
//! `archive-fs` models the directory tree of an extracted mod archive without touching the disk.
//! Entries are identified by stable inode numbers, paths are matched ignoring case (the way the
//! game's own data directory behaves) and every derived value is memoized and invalidated on
//! mutation.
//!
//! **Key ideas**:
//! - **Identity**: an entry keeps its inode through moves and renames; deleted inodes are never reused.
//! - **Case-insensitivity**: `/Data/Meshes` and `/data/MESHES` name the same entry, stored names keep their case.
//! - **Overwrite policy**: collisions during moves and renames are resolved by [`Overwrite`] flags (ignore, replace, merge).
//! - **Validation**: [`Fsck`] tells whether the top level of a tree looks like installable game data.
//! - **Handles**: [`ArchivePath`] binds a path to a shared filesystem for pathlib-style use.
//!
//! ### Example
//!
//! ```
//! use archive_fs::{ArchiveFS, Fsck, FsckConfig, Overwrite, PurePath};
//!
//! let mut fs = ArchiveFS::new();
//! fs.touch("/MyMod-1.2/Meshes/rock.nif").unwrap();
//! fs.touch("/MyMod-1.2/MyMod.esp").unwrap();
//!
//! let fsck = Fsck::new(FsckConfig::default());
//! assert!(!fsck.quick_check(&fs, &PurePath::root()).unwrap());
//!
//! let report = fsck.full_check(&fs, &PurePath::root()).unwrap();
//! assert_eq!(report.root, PurePath::new("/mymod-1.2"));
//!
//! fs.move_to("/mymod-1.2/meshes", "/", Overwrite::PROMPT).unwrap();
//! fs.move_to("/mymod-1.2/mymod.esp", "/", Overwrite::PROMPT).unwrap();
//! fs.rmdir("/MyMod-1.2").unwrap();
//! assert!(fsck.quick_check(&fs, &PurePath::root()).unwrap());
//! ```

mod core;
mod fsck;
mod path;
mod vfs;

pub use crate::core::{FsBackend, FsError, Inode, ROOT_INODE, Result};
pub use fsck::{Fsck, FsckConfig, FsckReport};
pub use path::{ArchivePath, PurePath, SharedFs};
pub use vfs::{
    ArchiveFS, CacheKind, DirEntry, EntryType, InodeRecord, Invalidation, Mutation, Overwrite,
    Scope, SortFlags, Target, WalkTree,
};

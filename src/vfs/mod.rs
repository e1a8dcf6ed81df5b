mod archive_fs;
mod cache;
mod dir_entry;
mod inode;
mod policy;
mod walk;

pub use archive_fs::{ArchiveFS, Target};
pub use cache::{CacheKind, Invalidation, Mutation, Scope};
pub use dir_entry::DirEntry;
pub use inode::{EntryType, InodeRecord};
pub use policy::{Overwrite, SortFlags};
pub use walk::WalkTree;

//! Memoized views over the inode table and the directory index.
//!
//! Nothing in here is authoritative. Every mutation of [`ArchiveFS`](crate::ArchiveFS)
//! is described by a [`Mutation`], and [`Mutation::invalidations`] is the one table
//! that says which cache entries the mutation makes stale.
//!
//! Renaming or moving a directory changes the derived path of every descendant
//! without touching their records, so path-keyed caches are dropped wholesale in
//! that case. A file only invalidates its own entries.

use std::collections::HashMap;

use tracing::trace;

use crate::core::Inode;
use crate::path::PurePath;
use crate::vfs::DirEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheKind {
    /// path -> inode
    Lookup,
    /// inode -> stored name
    Name,
    /// inode -> case-folded name
    LowerName,
    /// inode -> derived path
    Path,
    /// directory -> names of its children
    ChildNames,
    /// directory -> verbose listing (carries full paths)
    Listing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Entries derived from this inode only.
    Entry(Inode),
    /// The whole cache.
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invalidation {
    pub cache: CacheKind,
    pub scope: Scope,
}

impl Invalidation {
    fn entry(cache: CacheKind, inode: Inode) -> Self {
        Self {
            cache,
            scope: Scope::Entry(inode),
        }
    }

    fn all(cache: CacheKind) -> Self {
        Self {
            cache,
            scope: Scope::All,
        }
    }
}

/// A change to the authoritative state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Create {
        parent: Inode,
    },
    Delete {
        inode: Inode,
        parent: Inode,
    },
    /// Name change in place. `parent` is the containing directory.
    Rename {
        inode: Inode,
        parent: Inode,
        is_dir: bool,
    },
    Move {
        inode: Inode,
        old_parent: Inode,
        new_parent: Inode,
        is_dir: bool,
    },
}

impl Mutation {
    /// Cache entries made stale by this mutation.
    pub fn invalidations(&self) -> Vec<Invalidation> {
        use CacheKind::*;

        match *self {
            Mutation::Create { parent } => vec![
                Invalidation::entry(ChildNames, parent),
                Invalidation::entry(Listing, parent),
            ],
            Mutation::Delete { inode, parent } => vec![
                Invalidation::entry(Name, inode),
                Invalidation::entry(LowerName, inode),
                Invalidation::entry(Path, inode),
                Invalidation::entry(Lookup, inode),
                Invalidation::entry(ChildNames, inode),
                Invalidation::entry(Listing, inode),
                Invalidation::entry(ChildNames, parent),
                Invalidation::entry(Listing, parent),
            ],
            Mutation::Rename {
                inode,
                parent,
                is_dir,
            } => {
                let mut out = vec![
                    Invalidation::entry(Name, inode),
                    Invalidation::entry(LowerName, inode),
                    Invalidation::entry(ChildNames, parent),
                    Invalidation::entry(Listing, parent),
                ];
                out.extend(Self::path_scope(inode, is_dir));
                out
            }
            Mutation::Move {
                inode,
                old_parent,
                new_parent,
                is_dir,
            } => {
                let mut out = vec![
                    Invalidation::entry(ChildNames, old_parent),
                    Invalidation::entry(Listing, old_parent),
                    Invalidation::entry(ChildNames, new_parent),
                    Invalidation::entry(Listing, new_parent),
                ];
                out.extend(Self::path_scope(inode, is_dir));
                out
            }
        }
    }

    fn path_scope(inode: Inode, is_dir: bool) -> Vec<Invalidation> {
        use CacheKind::*;

        if is_dir {
            vec![
                Invalidation::all(Lookup),
                Invalidation::all(Path),
                Invalidation::all(Listing),
            ]
        } else {
            vec![
                Invalidation::entry(Lookup, inode),
                Invalidation::entry(Path, inode),
            ]
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Caches {
    pub(crate) lookup: HashMap<PurePath, Inode>,
    /// inode -> keys of `lookup` resolving to it
    lookup_keys: HashMap<Inode, Vec<PurePath>>,
    pub(crate) names: HashMap<Inode, String>,
    pub(crate) lower_names: HashMap<Inode, String>,
    pub(crate) paths: HashMap<Inode, PurePath>,
    pub(crate) child_names: HashMap<Inode, Vec<String>>,
    pub(crate) listings: HashMap<Inode, Vec<DirEntry>>,
}

impl Caches {
    pub(crate) fn remember_lookup(&mut self, path: PurePath, inode: Inode) {
        self.lookup_keys.entry(inode).or_default().push(path.clone());
        self.lookup.insert(path, inode);
    }

    pub(crate) fn invalidate(&mut self, mutation: Mutation) {
        trace!(?mutation, "invalidating caches");
        for invalidation in mutation.invalidations() {
            self.apply(invalidation);
        }
    }

    fn apply(&mut self, invalidation: Invalidation) {
        match (invalidation.cache, invalidation.scope) {
            (CacheKind::Lookup, Scope::All) => {
                self.lookup.clear();
                self.lookup_keys.clear();
            }
            (CacheKind::Lookup, Scope::Entry(inode)) => {
                for path in self.lookup_keys.remove(&inode).unwrap_or_default() {
                    // the key may have been re-resolved to another inode since
                    if self.lookup.get(&path) == Some(&inode) {
                        self.lookup.remove(&path);
                    }
                }
            }
            (CacheKind::Name, Scope::All) => self.names.clear(),
            (CacheKind::Name, Scope::Entry(inode)) => {
                self.names.remove(&inode);
            }
            (CacheKind::LowerName, Scope::All) => self.lower_names.clear(),
            (CacheKind::LowerName, Scope::Entry(inode)) => {
                self.lower_names.remove(&inode);
            }
            (CacheKind::Path, Scope::All) => self.paths.clear(),
            (CacheKind::Path, Scope::Entry(inode)) => {
                self.paths.remove(&inode);
            }
            (CacheKind::ChildNames, Scope::All) => self.child_names.clear(),
            (CacheKind::ChildNames, Scope::Entry(inode)) => {
                self.child_names.remove(&inode);
            }
            (CacheKind::Listing, Scope::All) => self.listings.clear(),
            (CacheKind::Listing, Scope::Entry(inode)) => {
                self.listings.remove(&inode);
            }
        }
    }

    pub(crate) fn len(&self, cache: CacheKind) -> usize {
        match cache {
            CacheKind::Lookup => self.lookup.len(),
            CacheKind::Name => self.names.len(),
            CacheKind::LowerName => self.lower_names.len(),
            CacheKind::Path => self.paths.len(),
            CacheKind::ChildNames => self.child_names.len(),
            CacheKind::Listing => self.listings.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds_with_scope(invalidations: &[Invalidation], scope: Scope) -> Vec<CacheKind> {
        let mut kinds: Vec<CacheKind> = invalidations
            .iter()
            .filter(|i| i.scope == scope)
            .map(|i| i.cache)
            .collect();
        kinds.sort();
        kinds
    }

    mod table {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn test_create_touches_parent_listings_only() {
            let inv = Mutation::Create { parent: 4 }.invalidations();
            assert_eq!(
                kinds_with_scope(&inv, Scope::Entry(4)),
                vec![CacheKind::ChildNames, CacheKind::Listing]
            );
            assert_eq!(inv.len(), 2);
        }

        #[test]
        fn test_delete_is_local() {
            let inv = Mutation::Delete {
                inode: 9,
                parent: 2,
            }
            .invalidations();
            assert!(inv.iter().all(|i| i.scope != Scope::All));
            assert_eq!(
                kinds_with_scope(&inv, Scope::Entry(2)),
                vec![CacheKind::ChildNames, CacheKind::Listing]
            );
            let own = kinds_with_scope(&inv, Scope::Entry(9));
            for kind in [
                CacheKind::Lookup,
                CacheKind::Name,
                CacheKind::LowerName,
                CacheKind::Path,
            ] {
                assert!(own.contains(&kind), "{kind:?} must be dropped on delete");
            }
        }

        #[test]
        fn test_file_rename_is_local() {
            let inv = Mutation::Rename {
                inode: 5,
                parent: 1,
                is_dir: false,
            }
            .invalidations();
            assert!(inv.iter().all(|i| i.scope != Scope::All));
            assert_eq!(
                kinds_with_scope(&inv, Scope::Entry(5)),
                vec![
                    CacheKind::Lookup,
                    CacheKind::Name,
                    CacheKind::LowerName,
                    CacheKind::Path
                ]
            );
        }

        #[test]
        fn test_dir_rename_clears_paths_globally() {
            let inv = Mutation::Rename {
                inode: 5,
                parent: 1,
                is_dir: true,
            }
            .invalidations();
            assert_eq!(
                kinds_with_scope(&inv, Scope::All),
                vec![CacheKind::Lookup, CacheKind::Path, CacheKind::Listing]
            );
            assert_eq!(
                kinds_with_scope(&inv, Scope::Entry(5)),
                vec![CacheKind::Name, CacheKind::LowerName]
            );
        }

        #[test]
        fn test_move_touches_both_parents() {
            let inv = Mutation::Move {
                inode: 7,
                old_parent: 1,
                new_parent: 2,
                is_dir: false,
            }
            .invalidations();
            for parent in [1, 2] {
                assert_eq!(
                    kinds_with_scope(&inv, Scope::Entry(parent)),
                    vec![CacheKind::ChildNames, CacheKind::Listing]
                );
            }
            assert_eq!(
                kinds_with_scope(&inv, Scope::Entry(7)),
                vec![CacheKind::Lookup, CacheKind::Path]
            );

            let dir_inv = Mutation::Move {
                inode: 7,
                old_parent: 1,
                new_parent: 2,
                is_dir: true,
            }
            .invalidations();
            assert_eq!(
                kinds_with_scope(&dir_inv, Scope::All),
                vec![CacheKind::Lookup, CacheKind::Path, CacheKind::Listing]
            );
        }
    }

    mod apply {
        use super::*;
        use pretty_assertions::assert_eq;

        fn filled() -> Caches {
            let mut caches = Caches::default();
            caches.remember_lookup(PurePath::new("/a"), 1);
            caches.remember_lookup(PurePath::new("/a/f"), 2);
            caches.remember_lookup(PurePath::new("/g"), 3);
            for (inode, path) in [(1, "/a"), (2, "/a/f"), (3, "/g")] {
                caches.paths.insert(inode, PurePath::new(path));
                caches.names.insert(inode, path.to_string());
                caches.lower_names.insert(inode, path.to_string());
            }
            caches.child_names.insert(0, vec!["a".into(), "g".into()]);
            caches.child_names.insert(1, vec!["f".into()]);
            caches
        }

        #[test]
        fn test_file_move_keeps_unrelated_entries() {
            let mut caches = filled();
            caches.invalidate(Mutation::Move {
                inode: 2,
                old_parent: 1,
                new_parent: 0,
                is_dir: false,
            });
            assert!(!caches.lookup.contains_key(&PurePath::new("/a/f")));
            assert!(caches.lookup.contains_key(&PurePath::new("/a")));
            assert!(caches.lookup.contains_key(&PurePath::new("/g")));
            assert_eq!(caches.len(CacheKind::Path), 2);
            assert_eq!(caches.len(CacheKind::ChildNames), 0);
            assert_eq!(caches.len(CacheKind::Name), 3);
        }

        #[test]
        fn test_dir_rename_drops_descendant_paths() {
            let mut caches = filled();
            caches.invalidate(Mutation::Rename {
                inode: 1,
                parent: 0,
                is_dir: true,
            });
            assert_eq!(caches.len(CacheKind::Lookup), 0);
            assert_eq!(caches.len(CacheKind::Path), 0);
            assert!(!caches.names.contains_key(&1));
            assert!(caches.names.contains_key(&2));
            assert!(!caches.child_names.contains_key(&0));
            assert!(caches.child_names.contains_key(&1));
        }

        #[test]
        fn test_delete_drops_own_and_parent_entries() {
            let mut caches = filled();
            caches.invalidate(Mutation::Delete {
                inode: 3,
                parent: 0,
            });
            assert!(!caches.lookup.contains_key(&PurePath::new("/g")));
            assert!(!caches.paths.contains_key(&3));
            assert!(!caches.names.contains_key(&3));
            assert!(!caches.lower_names.contains_key(&3));
            assert!(!caches.child_names.contains_key(&0));
            assert_eq!(caches.len(CacheKind::Lookup), 2);
        }

        #[test]
        fn test_entry_lookup_uses_reverse_keys() {
            let mut caches = filled();
            caches.remember_lookup(PurePath::new("/A/F"), 2);
            caches.remember_lookup(PurePath::new("/g"), 4);

            caches.apply(Invalidation::entry(CacheKind::Lookup, 3));
            assert_eq!(caches.lookup.get(&PurePath::new("/G")), Some(&4));

            caches.apply(Invalidation::entry(CacheKind::Lookup, 2));
            assert!(!caches.lookup.contains_key(&PurePath::new("/a/f")));
            assert_eq!(caches.len(CacheKind::Lookup), 2);
            assert!(caches.lookup_keys.get(&2).is_none());

            caches.apply(Invalidation::all(CacheKind::Lookup));
            assert_eq!(caches.len(CacheKind::Lookup), 0);
            assert!(caches.lookup_keys.is_empty());
        }
    }
}

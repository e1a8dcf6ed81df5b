//! Filesystem-agnostic, case-insensitive path value.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::core::utils;

/// An absolute path inside an archive, not tied to any filesystem.
///
/// Segments keep the case they were written with, but equality, hashing and
/// ordering all compare case-folded segments, so `/Meshes/A.nif` and
/// `/meshes/a.NIF` are the same key. The root is the path with no segments and
/// displays as `/`.
///
/// ```
/// use archive_fs::PurePath;
///
/// let a = PurePath::new("Textures/Sky.dds");
/// assert_eq!(a, PurePath::new("/textures/sky.DDS"));
/// assert_eq!(a.to_string(), "/Textures/Sky.dds");
/// ```
#[derive(Clone, Default)]
pub struct PurePath {
    parts: Vec<String>,
}

impl PurePath {
    /// Parses `path`. Relative paths are taken relative to the root; see
    /// [`split`](crate::core::utils::split) for the normalization rules.
    pub fn new(path: impl AsRef<str>) -> Self {
        Self {
            parts: utils::split(path.as_ref()),
        }
    }

    pub fn root() -> Self {
        Self { parts: Vec::new() }
    }

    pub(crate) fn from_parts(parts: Vec<String>) -> Self {
        Self { parts }
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn is_root(&self) -> bool {
        self.parts.is_empty()
    }

    /// Number of segments; the root has depth 0.
    pub fn depth(&self) -> usize {
        self.parts.len()
    }

    /// Final segment, `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.parts.last().map(String::as_str)
    }

    /// Final segment without its last extension.
    pub fn stem(&self) -> Option<&str> {
        let name = self.name()?;
        match name.rfind('.') {
            Some(0) | None => Some(name),
            Some(pos) => Some(&name[..pos]),
        }
    }

    /// Lower-cased extension of the final segment, without the dot.
    pub fn suffix(&self) -> Option<String> {
        let name = self.name()?;
        match name.rfind('.') {
            Some(0) | None => None,
            Some(pos) => Some(utils::fold(&name[pos + 1..])),
        }
    }

    /// The containing directory. The root is its own parent.
    pub fn parent(&self) -> PurePath {
        let mut parts = self.parts.clone();
        parts.pop();
        Self { parts }
    }

    /// Appends `segment`, which may itself contain several segments.
    pub fn join(&self, segment: impl AsRef<str>) -> PurePath {
        let mut parts = self.parts.clone();
        parts.extend(utils::split(segment.as_ref()));
        Self { parts }
    }

    /// Same parent, different final segment.
    pub fn with_name(&self, name: impl AsRef<str>) -> PurePath {
        self.parent().join(name)
    }

    /// Case-insensitive prefix test on whole segments.
    pub fn starts_with(&self, base: &PurePath) -> bool {
        base.parts.len() <= self.parts.len()
            && base
                .parts
                .iter()
                .zip(&self.parts)
                .all(|(a, b)| utils::fold(a) == utils::fold(b))
    }

    /// Re-keys `self` below `base`, e.g. `/a/b/c` relative to `/a` is `/b/c`.
    pub fn relative_to(&self, base: &PurePath) -> Option<PurePath> {
        if !self.starts_with(base) {
            return None;
        }
        Some(Self {
            parts: self.parts[base.parts.len()..].to_vec(),
        })
    }

    /// Every proper ancestor, nearest first, ending with the root.
    pub fn ancestors(&self) -> impl Iterator<Item = PurePath> + '_ {
        (0..self.parts.len())
            .rev()
            .map(move |n| Self::from_parts(self.parts[..n].to_vec()))
    }

    /// Case-folded segments, the identity used for hashing and comparison.
    pub fn folded(&self) -> Vec<String> {
        self.parts.iter().map(|p| utils::fold(p)).collect()
    }

    fn folded_iter(&self) -> impl Iterator<Item = String> + '_ {
        self.parts.iter().map(|p| utils::fold(p))
    }
}

impl PartialEq for PurePath {
    fn eq(&self, other: &Self) -> bool {
        self.parts.len() == other.parts.len() && self.folded_iter().eq(other.folded_iter())
    }
}

impl Eq for PurePath {}

impl Hash for PurePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parts.len().hash(state);
        for part in self.folded_iter() {
            part.hash(state);
        }
    }
}

impl PartialOrd for PurePath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PurePath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded_iter().cmp(other.folded_iter())
    }
}

impl fmt::Display for PurePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parts.is_empty() {
            return f.write_str("/");
        }
        for part in &self.parts {
            write!(f, "/{part}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for PurePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PurePath({self})")
    }
}

impl From<&str> for PurePath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for PurePath {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

impl From<&String> for PurePath {
    fn from(path: &String) -> Self {
        Self::new(path)
    }
}

impl From<&PurePath> for PurePath {
    fn from(path: &PurePath) -> Self {
        path.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    mod parsing {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn test_root_forms() {
            assert!(PurePath::new("/").is_root());
            assert!(PurePath::new("").is_root());
            assert!(PurePath::root().is_root());
            assert_eq!(PurePath::root().to_string(), "/");
            assert_eq!(PurePath::root().name(), None);
            assert_eq!(PurePath::root().parent(), PurePath::root());
        }

        #[test]
        fn test_relative_is_rooted() {
            let p = PurePath::new("a/b.txt");
            assert_eq!(p.to_string(), "/a/b.txt");
            assert_eq!(p.depth(), 2);
        }

        #[test]
        fn test_name_stem_suffix() {
            let p = PurePath::new("/Data/Plugin.Final.ESP");
            assert_eq!(p.name(), Some("Plugin.Final.ESP"));
            assert_eq!(p.stem(), Some("Plugin.Final"));
            assert_eq!(p.suffix().as_deref(), Some("esp"));

            let hidden = PurePath::new("/.gitignore");
            assert_eq!(hidden.suffix(), None);
            assert_eq!(hidden.stem(), Some(".gitignore"));

            assert_eq!(PurePath::new("/readme").suffix(), None);
        }
    }

    mod case_folding {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn test_eq_and_hash_ignore_case() {
            let a = PurePath::new("/Foo/Bar.txt");
            let b = PurePath::new("/foo/bar.TXT");
            assert_eq!(a, b);

            let mut set = HashSet::new();
            set.insert(a.clone());
            assert!(set.contains(&b));
            assert!(!set.insert(b));
        }

        #[test]
        fn test_display_preserves_case() {
            assert_eq!(PurePath::new("/Foo/Bar.txt").to_string(), "/Foo/Bar.txt");
        }

        #[test]
        fn test_ordering_is_folded() {
            let mut paths = vec![
                PurePath::new("/b"),
                PurePath::new("/A/z"),
                PurePath::new("/a"),
                PurePath::new("/C"),
            ];
            paths.sort();
            let shown: Vec<String> = paths.iter().map(|p| p.to_string()).collect();
            assert_eq!(shown, vec!["/a", "/A/z", "/b", "/C"]);
        }

        #[test]
        fn test_prefix_ignores_case() {
            let p = PurePath::new("/Mod/Meshes/a.nif");
            assert!(p.starts_with(&PurePath::new("/mod")));
            assert!(p.starts_with(&PurePath::root()));
            assert!(!p.starts_with(&PurePath::new("/mo")));
            assert!(!PurePath::new("/mod").starts_with(&p));
        }
    }

    mod derivation {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn test_join_and_with_name() {
            let base = PurePath::new("/a");
            assert_eq!(base.join("b/c").to_string(), "/a/b/c");
            assert_eq!(base.join("b").with_name("x").to_string(), "/a/x");
        }

        #[test]
        fn test_relative_to() {
            let p = PurePath::new("/ModXYZ/Scripts/main.pex");
            let rel = p.relative_to(&PurePath::new("/modxyz")).unwrap();
            assert_eq!(rel.to_string(), "/Scripts/main.pex");
            assert_eq!(p.relative_to(&PurePath::new("/other")), None);
            assert_eq!(p.relative_to(&p).unwrap(), PurePath::root());
        }

        #[test]
        fn test_ancestors() {
            let p = PurePath::new("/a/b/c");
            let shown: Vec<String> = p.ancestors().map(|a| a.to_string()).collect();
            assert_eq!(shown, vec!["/a/b", "/a", "/"]);
            assert_eq!(PurePath::root().ancestors().count(), 0);
        }
    }
}

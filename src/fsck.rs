//! Read-only structure validation: does the top level of a tree look like game data?
//!
//! A mod archive is installable as-is when its root directly contains recognized data folders
//! (`meshes`, `textures`, ...) or plugin files (`.esp`, `.esm`, ...). Archives that wrap
//! everything in one extra folder are detected by [`Fsck::full_check`].

use std::collections::BTreeSet;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{FsBackend, Result, utils};
use crate::path::PurePath;

const DATA_FOLDERS: &[&str] = &[
    "meshes",
    "textures",
    "music",
    "sound",
    "scripts",
    "interface",
    "strings",
    "video",
    "materials",
    "shaders",
    "lodsettings",
    "grass",
    "seq",
    "menus",
    "fonts",
    "distantlod",
    "facegen",
    "trees",
    "skse",
    "f4se",
    "obse",
    "nvse",
    "fose",
];

const DATA_SUFFIXES: &[&str] = &["esp", "esm", "esl", "bsa", "ba2", "modgroups"];

const DOC_SUFFIXES: &[&str] = &["txt", "md", "pdf", "rtf", "htm", "html", "doc", "docx"];

/// What counts as recognized game data. All entries are stored case-folded; suffixes are
/// stored without their leading dot.
///
/// Loaded from TOML with every key optional:
///
/// ```toml
/// folders = ["meshes", "textures"]
/// suffixes = [".esp", "esm"]
/// doc_suffixes = ["txt"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawFsckConfig")]
pub struct FsckConfig {
    pub folders: BTreeSet<String>,
    pub suffixes: BTreeSet<String>,
    pub doc_suffixes: BTreeSet<String>,
}

#[derive(Deserialize)]
#[serde(default)]
struct RawFsckConfig {
    folders: Vec<String>,
    suffixes: Vec<String>,
    doc_suffixes: Vec<String>,
}

impl Default for RawFsckConfig {
    fn default() -> Self {
        let owned = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        Self {
            folders: owned(DATA_FOLDERS),
            suffixes: owned(DATA_SUFFIXES),
            doc_suffixes: owned(DOC_SUFFIXES),
        }
    }
}

impl From<RawFsckConfig> for FsckConfig {
    fn from(raw: RawFsckConfig) -> Self {
        Self {
            folders: raw.folders.iter().map(|f| utils::fold(f)).collect(),
            suffixes: normalize_suffixes(raw.suffixes),
            doc_suffixes: normalize_suffixes(raw.doc_suffixes),
        }
    }
}

fn normalize_suffixes<I, S>(suffixes: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    suffixes
        .into_iter()
        .map(|s| utils::fold(s.as_ref().trim_start_matches('.')))
        .filter(|s| !s.is_empty())
        .collect()
}

impl FsckConfig {
    /// Config recognizing exactly `folders` and `suffixes`, with the default doc suffixes.
    pub fn new<F, S>(folders: F, suffixes: S) -> Self
    where
        F: IntoIterator,
        F::Item: AsRef<str>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        Self {
            folders: folders.into_iter().map(|f| utils::fold(f.as_ref())).collect(),
            suffixes: normalize_suffixes(suffixes),
            doc_suffixes: normalize_suffixes(DOC_SUFFIXES),
        }
    }

    pub fn from_toml_str(source: &str) -> anyhow::Result<Self> {
        toml::from_str(source).context("failed to parse fsck configuration")
    }

    pub fn is_data_folder(&self, name: &str) -> bool {
        self.folders.contains(&utils::fold(name))
    }

    pub fn is_data_file(&self, path: &PurePath) -> bool {
        path.suffix().is_some_and(|s| self.suffixes.contains(&s))
    }

    pub fn is_doc_file(&self, path: &PurePath) -> bool {
        path.suffix().is_some_and(|s| self.doc_suffixes.contains(&s))
    }
}

impl Default for FsckConfig {
    /// Layout of a Bethesda-style `Data` directory.
    fn default() -> Self {
        RawFsckConfig::default().into()
    }
}

/// Findings of [`Fsck::full_check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsckReport {
    /// Directory the findings were collected from. Differs from the checked root when the
    /// data turned out to be wrapped in a single folder.
    pub root: PurePath,
    pub folders: Vec<PurePath>,
    pub files: Vec<PurePath>,
    pub docs: Vec<PurePath>,
    pub valid: bool,
}

/// Structure validator over any [`FsBackend`].
#[derive(Debug, Clone, Default)]
pub struct Fsck {
    config: FsckConfig,
}

impl Fsck {
    pub fn new(config: FsckConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FsckConfig {
        &self.config
    }

    fn recognizes(&self, fs: &impl FsBackend, path: &PurePath) -> Result<bool> {
        if fs.is_dir(path)? {
            Ok(path.name().is_some_and(|n| self.config.is_data_folder(n)))
        } else {
            Ok(self.config.is_data_file(path))
        }
    }

    /// Scans the direct children of `root` and stops at the first recognized one.
    pub fn quick_check(&self, fs: &impl FsBackend, root: &PurePath) -> Result<bool> {
        for child in fs.listdir(root)? {
            if self.recognizes(fs, &child)? {
                debug!(%root, %child, "recognized game data");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Collects every recognized child of `root`.
    ///
    /// When nothing is recognized and `root` holds a single directory, that directory is
    /// checked instead (one level only).
    pub fn full_check(&self, fs: &impl FsBackend, root: &PurePath) -> Result<FsckReport> {
        let report = self.scan(fs, root)?;
        if report.valid {
            return Ok(report);
        }

        let children = fs.listdir(root)?;
        if let [only] = children.as_slice() {
            if fs.is_dir(only)? {
                let nested = self.scan(fs, only)?;
                if nested.valid {
                    debug!(%root, wrapper = %only, "game data wrapped in a single folder");
                    return Ok(nested);
                }
            }
        }
        Ok(report)
    }

    fn scan(&self, fs: &impl FsBackend, root: &PurePath) -> Result<FsckReport> {
        let mut report = FsckReport {
            root: root.clone(),
            folders: Vec::new(),
            files: Vec::new(),
            docs: Vec::new(),
            valid: false,
        };
        for child in fs.listdir(root)? {
            if fs.is_dir(&child)? {
                if child.name().is_some_and(|n| self.config.is_data_folder(n)) {
                    report.folders.push(child);
                }
            } else if self.config.is_data_file(&child) {
                report.files.push(child);
            } else if self.config.is_doc_file(&child) {
                report.docs.push(child);
            }
        }
        report.folders.sort();
        report.files.sort();
        report.docs.sort();
        report.valid = !report.folders.is_empty() || !report.files.is_empty();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FsError;
    use crate::vfs::ArchiveFS;

    fn setup_test_fsck() -> Fsck {
        Fsck::new(FsckConfig::new(["Meshes", "scripts"], [".esp", "ESM"]))
    }

    fn archive(entries: &[&str]) -> ArchiveFS {
        let mut fs = ArchiveFS::new();
        for entry in entries {
            if let Some(dir) = entry.strip_suffix('/') {
                fs.mkdir(dir, true).unwrap();
            } else {
                fs.touch(*entry).unwrap();
            }
        }
        fs
    }

    mod config {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn test_normalization() {
            let config = FsckConfig::new(["Meshes"], [".ESP", "bsa"]);
            assert!(config.is_data_folder("MESHES"));
            assert!(config.is_data_file(&PurePath::new("/x/Plugin.Esp")));
            assert!(config.is_data_file(&PurePath::new("/a.bsa")));
            assert!(!config.is_data_file(&PurePath::new("/esp")));
            assert!(config.is_doc_file(&PurePath::new("/readme.TXT")));
        }

        #[test]
        fn test_from_toml() -> anyhow::Result<()> {
            let config = FsckConfig::from_toml_str(
                r#"
                folders = ["Textures"]
                suffixes = [".ESM"]
                "#,
            )?;
            assert_eq!(config.folders, BTreeSet::from(["textures".to_string()]));
            assert_eq!(config.suffixes, BTreeSet::from(["esm".to_string()]));
            assert_eq!(config.doc_suffixes, FsckConfig::default().doc_suffixes);
            Ok(())
        }

        #[test]
        fn test_empty_toml_is_default() -> anyhow::Result<()> {
            assert_eq!(FsckConfig::from_toml_str("")?, FsckConfig::default());
            Ok(())
        }

        #[test]
        fn test_bad_toml() {
            let err = FsckConfig::from_toml_str("folders = 3").unwrap_err();
            assert!(err.to_string().contains("fsck configuration"));
        }

        #[test]
        fn test_default_layout() {
            let config = FsckConfig::default();
            assert!(config.is_data_folder("Textures"));
            assert!(config.is_data_file(&PurePath::new("/Skyrim.esm")));
        }
    }

    mod quick_check {
        use super::*;

        #[test]
        fn test_unrecognized_root() -> Result<()> {
            let fs = archive(&["textures/", "random.txt"]);
            assert!(!setup_test_fsck().quick_check(&fs, &PurePath::root())?);
            Ok(())
        }

        #[test]
        fn test_recognized_root() -> Result<()> {
            let fs = archive(&["meshes/", "plugin.esp"]);
            assert!(setup_test_fsck().quick_check(&fs, &PurePath::root())?);

            let fs = archive(&["readme.txt", "PLUGIN.ESM"]);
            assert!(setup_test_fsck().quick_check(&fs, &PurePath::root())?);
            Ok(())
        }

        #[test]
        fn test_file_named_like_folder() -> Result<()> {
            let fs = archive(&["meshes"]);
            assert!(!setup_test_fsck().quick_check(&fs, &PurePath::root())?);
            Ok(())
        }

        #[test]
        fn test_missing_root() {
            let fs = archive(&[]);
            let result = setup_test_fsck().quick_check(&fs, &PurePath::new("/nope"));
            assert!(matches!(result, Err(FsError::NotFound(_))));
        }
    }

    mod full_check {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn test_collects_findings() -> Result<()> {
            let fs = archive(&["Scripts/", "meshes/", "a.esp", "notes.txt", "junk/", "x.bin"]);
            let report = setup_test_fsck().full_check(&fs, &PurePath::root())?;
            assert!(report.valid);
            assert_eq!(report.root, PurePath::root());
            assert_eq!(report.folders, vec![PurePath::new("/meshes"), PurePath::new("/Scripts")]);
            assert_eq!(report.files, vec![PurePath::new("/a.esp")]);
            assert_eq!(report.docs, vec![PurePath::new("/notes.txt")]);
            Ok(())
        }

        #[test]
        fn test_wrapped_in_single_folder() -> Result<()> {
            let fs = archive(&["ModXYZ/scripts/", "ModXYZ/readme.md"]);
            let fsck = setup_test_fsck();
            assert!(!fsck.quick_check(&fs, &PurePath::root())?);

            let report = fsck.full_check(&fs, &PurePath::root())?;
            assert!(report.valid);
            assert_eq!(report.root.to_string(), "/ModXYZ");
            assert_eq!(report.folders, vec![PurePath::new("/ModXYZ/scripts")]);
            assert_eq!(report.docs, vec![PurePath::new("/ModXYZ/readme.md")]);
            Ok(())
        }

        #[test]
        fn test_recurses_one_level_only() -> Result<()> {
            let fs = archive(&["outer/inner/scripts/"]);
            let report = setup_test_fsck().full_check(&fs, &PurePath::root())?;
            assert!(!report.valid);
            assert_eq!(report.root, PurePath::root());
            Ok(())
        }

        #[test]
        fn test_no_recursion_with_siblings() -> Result<()> {
            let fs = archive(&["ModXYZ/scripts/", "other.bin"]);
            let report = setup_test_fsck().full_check(&fs, &PurePath::root())?;
            assert!(!report.valid);
            assert!(report.folders.is_empty() && report.files.is_empty());
            Ok(())
        }

        #[test]
        fn test_bound_subtree() -> Result<()> {
            let fs = archive(&["Data/meshes/rock.nif", "Data/mod.esp"]);
            let report = setup_test_fsck().full_check(&fs, &PurePath::new("/data"))?;
            assert!(report.valid);
            assert_eq!(report.files, vec![PurePath::new("/Data/mod.esp")]);
            Ok(())
        }
    }
}

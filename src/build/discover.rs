//! Source discovery.
//!
//! Walks a source root and returns every file whose extension is in the
//! configured set, in a stable order. An entry whose name contains a `.` is
//! treated as a file and never descended into; every other entry is treated
//! as a directory. A directory with a dot in its name (`v1.2/`) is therefore
//! skipped, and dotfiles such as `.git` are never walked.

use crate::error::{BuildError, Result};
use crate::toolchain::{SourceKind, SourceUnit};
use std::collections::BTreeMap;
use std::path::Path;
use walkdir::WalkDir;

/// Recognized source extensions and the command class each maps to.
#[derive(Debug, Clone)]
pub struct ExtensionSet {
    kinds: BTreeMap<String, SourceKind>,
}

impl ExtensionSet {
    pub fn new<I, S>(extensions: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut kinds = BTreeMap::new();
        for ext in extensions {
            let ext = ext.as_ref().trim_start_matches('.');
            let kind = SourceKind::from_extension(ext)
                .ok_or_else(|| BuildError::UnknownExtension(ext.to_string()))?;
            kinds.insert(ext.to_string(), kind);
        }
        if kinds.is_empty() {
            return Err(BuildError::NoExtensions);
        }
        Ok(Self { kinds })
    }

    pub fn kind_of(&self, path: &Path) -> Option<SourceKind> {
        let ext = path.extension()?.to_str()?;
        self.kinds.get(ext).copied()
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }
}

impl Default for ExtensionSet {
    fn default() -> Self {
        Self {
            kinds: [("S", SourceKind::Asm), ("c", SourceKind::C), ("cpp", SourceKind::Cxx)]
                .into_iter()
                .map(|(e, k)| (e.to_string(), k))
                .collect(),
        }
    }
}

/// Discover every recognized source under `root`.
///
/// A missing root yields an empty list.
pub fn discover(root: &Path, extensions: &ExtensionSet) -> Vec<SourceUnit> {
    let mut found = Vec::new();
    walk(root, extensions, &mut found);
    found
}

fn walk(dir: &Path, extensions: &ExtensionSet, found: &mut Vec<SourceUnit>) {
    let entries = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok());

    let mut subdirs = Vec::new();
    for entry in entries {
        let name = entry.file_name().to_string_lossy();
        if name.contains('.') {
            if let Some(kind) = extensions.kind_of(entry.path()) {
                found.push(SourceUnit::new(entry.path(), kind));
            }
        } else {
            subdirs.push(entry.into_path());
        }
    }

    // Files of a directory come before its subdirectories' contents
    for sub in subdirs {
        walk(&sub, extensions, found);
    }
}

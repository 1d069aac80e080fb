//! Header virtualization.
//!
//! Every library's public headers appear under `<store>/include/<lib>/`,
//! independent of where the library lives on disk. Binary libraries get a
//! directory alias; embedded libraries get one transformed copy per exposed
//! header. Consumers only ever see an include root.

use super::store::ArchStore;
use crate::error::{BuildError, Result};
use crate::toolchain::{ToolOutput, Toolchain, TransformJob};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One entry in the virtual header namespace.
#[derive(Debug, Clone)]
pub enum HeaderExposure {
    /// `alias` is a directory link pointing at `target`.
    Alias { alias: PathBuf, target: PathBuf },
    /// A header produced by the header transformer.
    Transform(TransformJob),
}

impl HeaderExposure {
    pub fn output(&self) -> &Path {
        match self {
            HeaderExposure::Alias { alias, .. } => alias,
            HeaderExposure::Transform(job) => &job.output,
        }
    }

    /// Whether `other` would produce the same entry from the same source.
    pub fn same_as(&self, other: &HeaderExposure) -> bool {
        match (self, other) {
            (
                HeaderExposure::Alias { alias, target },
                HeaderExposure::Alias {
                    alias: other_alias,
                    target: other_target,
                },
            ) => alias == other_alias && target == other_target,
            (HeaderExposure::Transform(a), HeaderExposure::Transform(b)) => {
                a.output == b.output && a.header == b.header
            }
            _ => false,
        }
    }

    pub fn alias_is_valid(&self) -> bool {
        match self {
            HeaderExposure::Alias { alias, target } => alias_points_to(alias, target),
            HeaderExposure::Transform(job) => job.output.is_file(),
        }
    }

    /// Create the entry. Re-creating a valid entry is a no-op, and losing a
    /// creation race to an identical entry is not an error.
    pub fn materialize(&self, toolchain: &dyn Toolchain) -> Result<ToolOutput> {
        ArchStore::ensure_parent(self.output())?;
        match self {
            HeaderExposure::Alias { alias, target } => {
                create_alias(alias, target)?;
                Ok(ToolOutput::quiet())
            }
            HeaderExposure::Transform(job) => toolchain.transform_header(job),
        }
    }
}

fn alias_points_to(alias: &Path, target: &Path) -> bool {
    fs::read_link(alias).is_ok_and(|dest| dest == target)
}

fn create_alias(alias: &Path, target: &Path) -> Result<()> {
    if let Ok(dest) = fs::read_link(alias) {
        if dest == target {
            return Ok(());
        }
        // A stale link from an earlier configuration
        match remove_link(alias) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(BuildError::io(alias, e)),
        }
    }

    match symlink_dir(target, alias) {
        Ok(()) => Ok(()),
        Err(_) if alias_points_to(alias, target) => Ok(()),
        Err(e) => Err(BuildError::io(alias, e)),
    }
}

#[cfg(unix)]
fn symlink_dir(target: &Path, alias: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, alias)
}

#[cfg(windows)]
fn symlink_dir(target: &Path, alias: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(target, alias)
}

#[cfg(unix)]
fn remove_link(alias: &Path) -> io::Result<()> {
    fs::remove_file(alias)
}

#[cfg(windows)]
fn remove_link(alias: &Path) -> io::Result<()> {
    fs::remove_dir(alias)
}

/// Where an embedded library's public header appears in the namespace:
/// `include/<lib>/<path relative to the include root that contains it>`,
/// or just the file name when no include root contains it.
pub fn virtual_header_path(
    store: &ArchStore,
    library: &str,
    header: &Path,
    includes: &[PathBuf],
) -> PathBuf {
    let rel = includes
        .iter()
        .find_map(|inc| header.strip_prefix(inc).ok())
        .map(Path::to_path_buf)
        .or_else(|| header.file_name().map(PathBuf::from))
        .unwrap_or_else(|| header.to_path_buf());
    store.header_dir(library).join(rel)
}

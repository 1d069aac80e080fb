//! Build artifact cleanup.
//!
//! `kiln clean` removes the store of the active architecture only. Stores
//! of other triples under the same `bin_root` are left alone.

use super::store::{ArchContext, ArchStore};
use crate::config::KilnConfig;
use crate::error::{BuildError, Result as BuildResult};
use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Remove `<bin_root>/<triple>`. Returns `false` if there was nothing to
/// remove.
pub fn clean_store(store: &ArchStore) -> BuildResult<bool> {
    match fs::remove_dir_all(store.dir()) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(BuildError::io(store.dir(), e)),
    }
}

pub fn clean(root: &Path, config: &KilnConfig, cross: Option<&str>) -> Result<()> {
    let toolchain = config.toolchain(root, cross);
    let context = ArchContext::resolve(&toolchain)
        .context("Failed to query the compiler for its target triple")?;
    let store = ArchStore::new(root, &config.bin_root(root), context);

    if clean_store(&store)? {
        println!("{} Removed {}", "🗑️".red(), store.dir().display());
        println!("{} Clean complete.", "✓".green());
    } else {
        println!("{} Nothing to clean", "!".yellow());
    }
    Ok(())
}

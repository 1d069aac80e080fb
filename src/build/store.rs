//! Architecture-scoped output store.
//!
//! Every output lives under `<bin_root>/<triple>/`, so builds for different
//! toolchains share nothing. The triple is resolved once per invocation.

use crate::error::{BuildError, Result};
use crate::toolchain::{ConvertJob, Toolchain, sanitize_triple};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// The resolved identity of the active toolchain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchContext {
    triple: String,
}

impl ArchContext {
    /// Ask the toolchain for its target triple.
    pub fn resolve(toolchain: &dyn Toolchain) -> Result<Self> {
        Ok(Self {
            triple: sanitize_triple(&toolchain.triple()?)?,
        })
    }

    pub fn new(triple: impl Into<String>) -> Self {
        Self {
            triple: triple.into(),
        }
    }

    pub fn triple(&self) -> &str {
        &self.triple
    }
}

/// Maps logical outputs to paths under `<bin_root>/<triple>/`.
#[derive(Debug, Clone)]
pub struct ArchStore {
    project_root: PathBuf,
    dir: PathBuf,
    context: ArchContext,
}

impl ArchStore {
    pub fn new(project_root: &Path, bin_root: &Path, context: ArchContext) -> Self {
        let bin_root = if bin_root.is_absolute() {
            bin_root.to_path_buf()
        } else {
            project_root.join(bin_root)
        };
        Self {
            project_root: project_root.to_path_buf(),
            dir: bin_root.join(context.triple()),
            context,
        }
    }

    /// `<bin_root>/<triple>`
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn context(&self) -> &ArchContext {
        &self.context
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Path of `source` relative to the project root. Sources outside the
    /// root are mapped under `_ext/` with `..` spelled `_up`.
    fn relative(&self, source: &Path) -> PathBuf {
        if let Ok(rel) = source.strip_prefix(&self.project_root) {
            return rel.to_path_buf();
        }
        if source.is_relative() && !source.starts_with("..") {
            return source.to_path_buf();
        }

        let mut mapped = PathBuf::from("_ext");
        for comp in source.components() {
            match comp {
                Component::Normal(part) => mapped.push(part),
                Component::ParentDir => mapped.push("_up"),
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }
        mapped
    }

    /// Object output for a source file: the source tree mirrored with `.o`.
    pub fn object_path(&self, source: &Path) -> PathBuf {
        self.dir.join(self.relative(source)).with_extension("o")
    }

    /// Dependency record stored next to an object.
    pub fn record_path(object: &Path) -> PathBuf {
        object.with_extension("d")
    }

    /// Input listing stored next to a linked output: `app.elf.inputs`.
    pub fn listing_path(output: &Path) -> PathBuf {
        let mut path = output.as_os_str().to_owned();
        path.push(".inputs");
        PathBuf::from(path)
    }

    /// Relocatable unit produced by an embedded library.
    pub fn library_unit(&self, library: &str) -> PathBuf {
        self.dir.join("lib").join(format!("lib{}.o", library))
    }

    /// Root of the virtual header namespace, passed to every compile.
    pub fn include_root(&self) -> PathBuf {
        self.dir.join("include")
    }

    /// `include/<lib>`: alias for binary libraries, directory of
    /// materialized headers for embedded ones.
    pub fn header_dir(&self, library: &str) -> PathBuf {
        self.include_root().join(library)
    }

    pub fn artifact(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.elf", name))
    }

    pub fn image(&self, name: &str, format: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", name, ConvertJob::extension_for(format)))
    }

    pub fn compile_db(&self) -> PathBuf {
        self.dir.join("compile_commands.json")
    }

    /// Create the parent directory of `path`. Safe to race: a concurrent
    /// creator winning is not an error.
    pub fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        Ok(())
    }
}

pub fn ensure_dir(dir: &Path) -> Result<()> {
    match fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(_) if dir.is_dir() => Ok(()),
        Err(e) => Err(BuildError::io(dir, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(triple: &str) -> ArchStore {
        ArchStore::new(Path::new("/proj"), Path::new("bin"), ArchContext::new(triple))
    }

    #[test]
    fn test_object_path_mirrors_source_tree() {
        let s = store("avr");
        assert_eq!(
            s.object_path(Path::new("/proj/src/drivers/uart.c")),
            PathBuf::from("/proj/bin/avr/src/drivers/uart.o")
        );
        assert_eq!(
            ArchStore::record_path(&s.object_path(Path::new("/proj/src/boot.S"))),
            PathBuf::from("/proj/bin/avr/src/boot.d")
        );
    }

    #[test]
    fn test_outside_sources_are_mapped() {
        let s = store("avr");
        assert_eq!(
            s.object_path(Path::new("/opt/sdk/startup.S")),
            PathBuf::from("/proj/bin/avr/_ext/opt/sdk/startup.o")
        );
        assert_eq!(
            s.object_path(Path::new("../shared/crc.c")),
            PathBuf::from("/proj/bin/avr/_ext/_up/shared/crc.o")
        );
    }

    #[test]
    fn test_architectures_never_share_paths() {
        let avr = store("avr");
        let arm = store("arm-none-eabi");
        let src = Path::new("/proj/src/main.c");
        assert_ne!(avr.object_path(src), arm.object_path(src));
        assert_ne!(avr.library_unit("hal"), arm.library_unit("hal"));
        assert_ne!(avr.header_dir("hal"), arm.header_dir("hal"));
        assert_ne!(avr.artifact("app"), arm.artifact("app"));
    }

    #[test]
    fn test_named_outputs() {
        let s = store("avr");
        assert_eq!(s.library_unit("hal"), PathBuf::from("/proj/bin/avr/lib/libhal.o"));
        assert_eq!(s.header_dir("hal"), PathBuf::from("/proj/bin/avr/include/hal"));
        assert_eq!(s.artifact("blinky"), PathBuf::from("/proj/bin/avr/blinky.elf"));
        assert_eq!(s.image("blinky", "ihex"), PathBuf::from("/proj/bin/avr/blinky.hex"));
    }

    #[test]
    fn test_ensure_parent_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a").join("b").join("c.o");
        ArchStore::ensure_parent(&file).unwrap();
        ArchStore::ensure_parent(&file).unwrap();
        assert!(dir.path().join("a").join("b").is_dir());
    }
}

//! Project configuration (`kiln.toml`).
//!
//! Read once before the graph is built. Relative paths are resolved against
//! the directory holding `kiln.toml`.

use crate::build::{
    BinaryLibrary, EmbeddedLibrary, ExtensionSet, LibraryDecl, TargetDecl,
};
use crate::toolchain::{CompileConfig, GnuToolchain};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "kiln.toml";

#[derive(Deserialize, Debug, Default)]
pub struct KilnConfig {
    pub package: PackageConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default, rename = "library")]
    pub libraries: Vec<LibraryConfig>,
    #[serde(default, rename = "target")]
    pub targets: Vec<TargetConfig>,
}

#[derive(Deserialize, Debug, Default)]
pub struct PackageConfig {
    pub name: String,
    pub version: Option<String>,
}

impl PackageConfig {
    /// `name v1.2.0`, or just the name when no version is declared.
    pub fn display_name(&self) -> String {
        match &self.version {
            Some(version) => format!("{} v{}", self.name, version),
            None => self.name.clone(),
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct BuildConfig {
    pub src: PathBuf,
    pub bin_root: PathBuf,
    pub extensions: Vec<String>,
    /// Toolchain prefix, e.g. `avr-` or `arm-none-eabi-`.
    pub cross: Option<String>,
    pub cc: Option<String>,
    pub cxx: Option<String>,
    pub objcopy: Option<String>,
    pub triple: Option<String>,
    pub includes: Vec<PathBuf>,
    pub symbols: BTreeMap<String, toml::Value>,
    pub asflags: Vec<String>,
    pub cflags: Vec<String>,
    pub cxxflags: Vec<String>,
    pub ldflags: Vec<String>,
    pub image: Option<String>,
    pub header_transform: Option<PathBuf>,
    pub jobs: Option<usize>,
    /// Link order of the default target.
    pub libs: Option<Vec<String>>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            src: PathBuf::from("src"),
            bin_root: PathBuf::from("bin"),
            extensions: vec!["S".to_string(), "c".to_string(), "cpp".to_string()],
            cross: None,
            cc: None,
            cxx: None,
            objcopy: None,
            triple: None,
            includes: Vec::new(),
            symbols: BTreeMap::new(),
            asflags: Vec::new(),
            cflags: Vec::new(),
            cxxflags: Vec::new(),
            ldflags: Vec::new(),
            image: None,
            header_transform: None,
            jobs: None,
            libs: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LibraryConfig {
    Embedded {
        name: String,
        src: Option<PathBuf>,
        #[serde(default)]
        sources: Vec<PathBuf>,
        #[serde(default)]
        includes: Vec<PathBuf>,
        #[serde(default)]
        headers: Vec<PathBuf>,
        #[serde(default)]
        symbols: BTreeMap<String, toml::Value>,
        #[serde(default)]
        flags: Vec<String>,
    },
    Binary {
        name: String,
        path: PathBuf,
        include: PathBuf,
        link: Option<String>,
    },
}

impl LibraryConfig {
    pub fn name(&self) -> &str {
        match self {
            LibraryConfig::Embedded { name, .. } | LibraryConfig::Binary { name, .. } => name,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct TargetConfig {
    pub name: String,
    pub src: Option<PathBuf>,
    pub libs: Option<Vec<String>>,
    pub image: Option<String>,
}

/// `F_CPU = 16000000` and `F_CPU = "16000000UL"` both work. `true` is a
/// bare define.
fn symbol_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Boolean(true) => String::new(),
        toml::Value::Boolean(false) => "0".to_string(),
        other => other.to_string(),
    }
}

fn symbols(raw: &BTreeMap<String, toml::Value>) -> BTreeMap<String, String> {
    raw.iter()
        .map(|(k, v)| (k.clone(), symbol_value(v)))
        .collect()
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn resolve_all(root: &Path, paths: &[PathBuf]) -> Vec<PathBuf> {
    paths.iter().map(|p| resolve(root, p)).collect()
}

impl KilnConfig {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse kiln.toml")
    }

    pub fn extensions(&self) -> Result<ExtensionSet> {
        ExtensionSet::new(&self.build.extensions).context("Invalid [build] extensions")
    }

    /// The process toolchain. `cross` overrides the configured prefix.
    pub fn toolchain(&self, root: &Path, cross: Option<&str>) -> GnuToolchain {
        let b = &self.build;
        let defaults = GnuToolchain::default();
        GnuToolchain {
            prefix: cross
                .map(str::to_string)
                .or_else(|| b.cross.clone())
                .unwrap_or_default(),
            cc: b.cc.clone().unwrap_or(defaults.cc),
            cxx: b.cxx.clone().unwrap_or(defaults.cxx),
            objcopy: b.objcopy.clone().unwrap_or(defaults.objcopy),
            asflags: b.asflags.clone(),
            cflags: b.cflags.clone(),
            cxxflags: b.cxxflags.clone(),
            ldflags: b.ldflags.clone(),
            triple: b.triple.clone(),
            header_transform: b.header_transform.as_ref().map(|p| resolve(root, p)),
        }
    }

    pub fn base_config(&self, root: &Path) -> CompileConfig {
        CompileConfig {
            includes: resolve_all(root, &self.build.includes),
            symbols: symbols(&self.build.symbols),
            flags: Vec::new(),
        }
    }

    pub fn bin_root(&self, root: &Path) -> PathBuf {
        resolve(root, &self.build.bin_root)
    }

    pub fn library_decls(&self, root: &Path) -> Vec<LibraryDecl> {
        self.libraries
            .iter()
            .map(|lib| match lib {
                LibraryConfig::Embedded {
                    name,
                    src,
                    sources,
                    includes,
                    headers,
                    symbols: syms,
                    flags,
                } => LibraryDecl::Embedded(EmbeddedLibrary {
                    name: name.clone(),
                    src_roots: src.iter().map(|p| resolve(root, p)).collect(),
                    sources: resolve_all(root, sources),
                    includes: resolve_all(root, includes),
                    headers: resolve_all(root, headers),
                    symbols: symbols(syms),
                    flags: flags.clone(),
                }),
                LibraryConfig::Binary {
                    name,
                    path,
                    include,
                    link,
                } => LibraryDecl::Binary(BinaryLibrary {
                    name: name.clone(),
                    search_path: resolve(root, path),
                    link_name: link.clone().unwrap_or_else(|| name.clone()),
                    include: resolve(root, include),
                }),
            })
            .collect()
    }

    /// Declared targets, or one default target built from `[package]` and
    /// `[build]` when none are declared.
    pub fn target_decls(&self, root: &Path) -> Vec<TargetDecl> {
        let default_libs = || {
            self.build.libs.clone().unwrap_or_else(|| {
                self.libraries
                    .iter()
                    .map(|l| l.name().to_string())
                    .collect()
            })
        };

        if self.targets.is_empty() {
            return vec![TargetDecl {
                name: self.package.name.clone(),
                src_root: resolve(root, &self.build.src),
                libraries: default_libs(),
                image: self.build.image.clone(),
            }];
        }

        self.targets
            .iter()
            .map(|t| TargetDecl {
                name: t.name.clone(),
                src_root: resolve(root, t.src.as_ref().unwrap_or(&self.build.src)),
                libraries: t.libs.clone().unwrap_or_else(|| default_libs()),
                image: t.image.clone().or_else(|| self.build.image.clone()),
            })
            .collect()
    }

    /// Every directory whose contents feed the build.
    pub fn watched_dirs(&self, root: &Path) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self
            .target_decls(root)
            .into_iter()
            .map(|t| t.src_root)
            .collect();
        dirs.extend(resolve_all(root, &self.build.includes));
        for lib in &self.libraries {
            if let LibraryConfig::Embedded { src, includes, .. } = lib {
                dirs.extend(src.iter().map(|p| resolve(root, p)));
                dirs.extend(resolve_all(root, includes));
            }
        }
        dirs.sort();
        dirs.dedup();
        dirs.retain(|d| d.is_dir());
        dirs
    }
}

/// Load `kiln.toml` from `dir`.
pub fn load_config(dir: &Path) -> Result<KilnConfig> {
    let path = dir.join(CONFIG_FILE);
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "{} not found in {}.\n\n\
            💡 Tip: run kiln from the project directory or pass -C <dir>.",
            CONFIG_FILE,
            dir.display()
        ));
    }
    let text = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {} - check file permissions", path.display()))?;
    KilnConfig::parse(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[package]
name = "blinky"

[build]
cross = "avr-"
cflags = ["-mmcu=atmega328p", "-Os"]
includes = ["include"]
symbols = { F_CPU = 16000000, BOARD = "\"uno\"", NDEBUG = true }
image = "ihex"
libs = ["hal", "m"]

[[library]]
name = "hal"
kind = "embedded"
src = "libs/hal/src"
includes = ["libs/hal/include"]
headers = ["libs/hal/include/hal/gpio.h"]
symbols = { HAL_UART = "1" }

[[library]]
name = "m"
kind = "binary"
path = "libs/m/lib"
include = "libs/m/include"
link = "m_avr"
"#;

    #[test]
    fn test_parse_full_config() {
        let cfg = KilnConfig::parse(FULL).unwrap();
        assert_eq!(cfg.package.name, "blinky");
        assert_eq!(cfg.build.src, PathBuf::from("src"));
        assert_eq!(cfg.libraries.len(), 2);
        assert_eq!(cfg.libraries[0].name(), "hal");
    }

    #[test]
    fn test_symbol_values() {
        let cfg = KilnConfig::parse(FULL).unwrap();
        let base = cfg.base_config(Path::new("/p"));
        assert_eq!(base.symbols["F_CPU"], "16000000");
        assert_eq!(base.symbols["BOARD"], "\"uno\"");
        assert_eq!(base.symbols["NDEBUG"], "");
        assert_eq!(base.includes, vec![PathBuf::from("/p/include")]);
    }

    #[test]
    fn test_library_decls_resolve_paths() {
        let cfg = KilnConfig::parse(FULL).unwrap();
        let decls = cfg.library_decls(Path::new("/p"));
        let LibraryDecl::Embedded(hal) = &decls[0] else {
            panic!("hal should be embedded");
        };
        assert_eq!(hal.src_roots, vec![PathBuf::from("/p/libs/hal/src")]);
        assert_eq!(hal.symbols["HAL_UART"], "1");

        let LibraryDecl::Binary(m) = &decls[1] else {
            panic!("m should be binary");
        };
        assert_eq!(m.link_name, "m_avr");
        assert_eq!(m.include, PathBuf::from("/p/libs/m/include"));
    }

    #[test]
    fn test_default_target() {
        let cfg = KilnConfig::parse(FULL).unwrap();
        let targets = cfg.target_decls(Path::new("/p"));
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].name, "blinky");
        assert_eq!(targets[0].src_root, PathBuf::from("/p/src"));
        assert_eq!(targets[0].libraries, vec!["hal", "m"]);
        assert_eq!(targets[0].image.as_deref(), Some("ihex"));
    }

    #[test]
    fn test_toolchain_cross_override() {
        let cfg = KilnConfig::parse(FULL).unwrap();
        assert_eq!(cfg.toolchain(Path::new("/p"), None).prefix, "avr-");
        assert_eq!(
            cfg.toolchain(Path::new("/p"), Some("arm-none-eabi-")).prefix,
            "arm-none-eabi-"
        );
    }

    #[test]
    fn test_minimal_config_defaults() {
        let cfg = KilnConfig::parse("[package]\nname = \"app\"\n").unwrap();
        assert_eq!(cfg.build.bin_root, PathBuf::from("bin"));
        assert_eq!(cfg.build.extensions, vec!["S", "c", "cpp"]);
        assert!(cfg.extensions().is_ok());
        assert!(cfg.target_decls(Path::new("/p"))[0].libraries.is_empty());
    }

    #[test]
    fn test_package_display_name() {
        let cfg = KilnConfig::parse(FULL).unwrap();
        assert_eq!(cfg.package.display_name(), "blinky");
        let cfg = KilnConfig::parse("[package]\nname = \"app\"\nversion = \"1.2.0\"\n").unwrap();
        assert_eq!(cfg.package.display_name(), "app v1.2.0");
    }

    #[test]
    fn test_library_without_kind_is_rejected() {
        let text = "[package]\nname = \"app\"\n[[library]]\nname = \"x\"\n";
        assert!(KilnConfig::parse(text).is_err());
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Which compiler command class builds a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceKind {
    /// Assembly (`.S`, `.s`, `.asm`)
    Asm,
    /// C (`.c`)
    C,
    /// C++ (`.cpp`, `.cc`, `.cxx`, `.C`)
    Cxx,
}

impl SourceKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "S" | "s" | "asm" => Some(SourceKind::Asm),
            "c" => Some(SourceKind::C),
            "cpp" | "cc" | "cxx" | "C" => Some(SourceKind::Cxx),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Asm => "asm",
            SourceKind::C => "c",
            SourceKind::Cxx => "c++",
        }
    }
}

/// A discovered source file. Immutable once discovered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceUnit {
    pub path: PathBuf,
    pub kind: SourceKind,
}

impl SourceUnit {
    pub fn new(path: impl Into<PathBuf>, kind: SourceKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Include paths, preprocessor symbols and extra flags for one compile.
///
/// The graph builder merges a node's overlay into the base configuration at
/// node-creation time. The result is shared read-only between nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileConfig {
    pub includes: Vec<PathBuf>,
    /// Symbol name to value. An empty value means a bare `#define NAME`.
    pub symbols: BTreeMap<String, String>,
    pub flags: Vec<String>,
}

impl CompileConfig {
    /// Layer `overlay` on top of `self`.
    ///
    /// Overlay include paths are searched first, overlay symbols replace
    /// base symbols of the same name, and overlay flags come last so they
    /// win on the command line.
    pub fn overlay(&self, overlay: &CompileConfig) -> CompileConfig {
        let mut includes = overlay.includes.clone();
        for inc in &self.includes {
            if !includes.contains(inc) {
                includes.push(inc.clone());
            }
        }

        let mut symbols = self.symbols.clone();
        symbols.extend(
            overlay
                .symbols
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        let mut flags = self.flags.clone();
        flags.extend(overlay.flags.iter().cloned());

        CompileConfig {
            includes,
            symbols,
            flags,
        }
    }

    /// `-DNAME` / `-DNAME=VALUE` arguments in a stable order.
    pub fn define_args(&self) -> Vec<String> {
        self.symbols
            .iter()
            .map(|(name, value)| {
                if value.is_empty() {
                    format!("-D{}", name)
                } else {
                    format!("-D{}={}", name, value)
                }
            })
            .collect()
    }

    pub fn include_args(&self) -> Vec<String> {
        self.includes
            .iter()
            .map(|p| format!("-I{}", p.display()))
            .collect()
    }
}

/// Compile one translation unit into an object plus a dependency record.
#[derive(Debug, Clone)]
pub struct CompileJob {
    pub source: SourceUnit,
    pub output: PathBuf,
    /// Where the compiler writes the dependency record.
    pub record: PathBuf,
    pub config: Arc<CompileConfig>,
}

/// Merge objects into one relocatable unit.
#[derive(Debug, Clone)]
pub struct PartialLinkJob {
    pub library: String,
    pub objects: Vec<PathBuf>,
    pub output: PathBuf,
}

/// Final link. Inputs are passed in exactly this order: `objects`, then
/// `units`, then `-L` search paths, then `-l` names.
#[derive(Debug, Clone)]
pub struct LinkJob {
    pub objects: Vec<PathBuf>,
    pub units: Vec<PathBuf>,
    pub search_paths: Vec<PathBuf>,
    pub libs: Vec<String>,
    pub output: PathBuf,
    /// Link with the C++ driver.
    pub cxx: bool,
}

impl LinkJob {
    /// The link inputs as they appear on the command line.
    pub fn inputs(&self) -> Vec<String> {
        let mut args = Vec::new();
        args.extend(self.objects.iter().map(|p| p.display().to_string()));
        args.extend(self.units.iter().map(|p| p.display().to_string()));
        args.extend(self.search_paths.iter().map(|p| format!("-L{}", p.display())));
        args.extend(self.libs.iter().map(|l| format!("-l{}", l)));
        args
    }
}

/// Convert a linked artifact into a derived image format.
#[derive(Debug, Clone)]
pub struct ConvertJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub format: String,
}

impl ConvertJob {
    /// File extension used for a derived image of `format`.
    pub fn extension_for(format: &str) -> &str {
        match format {
            "ihex" => "hex",
            "binary" => "bin",
            "srec" => "srec",
            other => other,
        }
    }
}

/// Run the header transformer on one public header.
#[derive(Debug, Clone)]
pub struct TransformJob {
    pub library: String,
    pub header: PathBuf,
    pub output: PathBuf,
    pub symbols: BTreeMap<String, String>,
    pub includes: Vec<PathBuf>,
}

/// What a tool printed on success (usually warnings).
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub diagnostics: String,
}

impl ToolOutput {
    pub fn quiet() -> Self {
        Self::default()
    }

    pub fn from_stderr(stderr: &[u8]) -> Self {
        Self {
            diagnostics: String::from_utf8_lossy(stderr).trim_end().to_string(),
        }
    }
}

pub(crate) fn display_args(program: &Path, args: &[String]) -> String {
    let mut line = program.display().to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_from_extension() {
        assert_eq!(SourceKind::from_extension("S"), Some(SourceKind::Asm));
        assert_eq!(SourceKind::from_extension("c"), Some(SourceKind::C));
        assert_eq!(SourceKind::from_extension("cpp"), Some(SourceKind::Cxx));
        assert_eq!(SourceKind::from_extension("h"), None);
    }

    #[test]
    fn test_overlay_prepends_private_includes() {
        let base = CompileConfig {
            includes: vec![PathBuf::from("include")],
            symbols: BTreeMap::from([("F_CPU".to_string(), "8000000".to_string())]),
            flags: vec!["-Os".to_string()],
        };
        let overlay = CompileConfig {
            includes: vec![PathBuf::from("libs/hal/include")],
            symbols: BTreeMap::from([("F_CPU".to_string(), "16000000".to_string())]),
            flags: vec!["-Wall".to_string()],
        };

        let merged = base.overlay(&overlay);
        assert_eq!(
            merged.includes,
            vec![PathBuf::from("libs/hal/include"), PathBuf::from("include")]
        );
        assert_eq!(merged.symbols["F_CPU"], "16000000");
        assert_eq!(merged.flags, vec!["-Os", "-Wall"]);

        // the base is untouched
        assert_eq!(base.symbols["F_CPU"], "8000000");
    }

    #[test]
    fn test_define_args() {
        let cfg = CompileConfig {
            symbols: BTreeMap::from([
                ("NDEBUG".to_string(), String::new()),
                ("BAUD".to_string(), "9600".to_string()),
            ]),
            ..Default::default()
        };
        assert_eq!(cfg.define_args(), vec!["-DBAUD=9600", "-DNDEBUG"]);
    }

    #[test]
    fn test_link_inputs_order() {
        let job = LinkJob {
            objects: vec![PathBuf::from("main.o")],
            units: vec![PathBuf::from("lib/liba.o"), PathBuf::from("lib/libb.o")],
            search_paths: vec![PathBuf::from("libs/m")],
            libs: vec!["m".to_string()],
            output: PathBuf::from("app.elf"),
            cxx: false,
        };
        assert_eq!(
            job.inputs(),
            vec!["main.o", "lib/liba.o", "lib/libb.o", "-Llibs/m", "-lm"]
        );
    }

    #[test]
    fn test_image_extension() {
        assert_eq!(ConvertJob::extension_for("ihex"), "hex");
        assert_eq!(ConvertJob::extension_for("binary"), "bin");
        assert_eq!(ConvertJob::extension_for("elf32-avr"), "elf32-avr");
    }
}

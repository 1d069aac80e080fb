//! Library composition.
//!
//! An *embedded* library is compiled from source with its own include
//! paths, symbols and flags, then partially linked (`-r`) into one
//! relocatable unit. The unit is handed to the final link as a plain object,
//! so every object of the library ends up in the binary whether or not
//! anything references it (vector tables, self-registering constructors).
//!
//! A *binary* library is a prebuilt archive: it contributes a search path,
//! a `-l` name and a header alias.

use super::builder::GraphBuilder;
use super::discover::discover;
use super::graph::{Action, Edge, EdgeKind, NodeId};
use super::headers::{HeaderExposure, virtual_header_path};
use crate::error::{BuildError, Result};
use crate::toolchain::{CompileConfig, PartialLinkJob, SourceKind, SourceUnit, TransformJob};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// A library built from source.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedLibrary {
    pub name: String,
    /// Roots searched recursively for sources.
    pub src_roots: Vec<PathBuf>,
    /// Sources listed explicitly.
    pub sources: Vec<PathBuf>,
    /// Private and public include paths. Used for this library's objects
    /// and for transforming its headers.
    pub includes: Vec<PathBuf>,
    /// Headers exposed under `include/<name>/`.
    pub headers: Vec<PathBuf>,
    pub symbols: BTreeMap<String, String>,
    pub flags: Vec<String>,
}

/// A prebuilt archive `<search_path>/lib<link_name>.a`.
#[derive(Debug, Clone)]
pub struct BinaryLibrary {
    pub name: String,
    pub search_path: PathBuf,
    pub link_name: String,
    pub include: PathBuf,
}

#[derive(Debug, Clone)]
pub enum LibraryDecl {
    Embedded(EmbeddedLibrary),
    Binary(BinaryLibrary),
}

impl LibraryDecl {
    pub fn name(&self) -> &str {
        match self {
            LibraryDecl::Embedded(lib) => &lib.name,
            LibraryDecl::Binary(lib) => &lib.name,
        }
    }
}

/// A registered library and the nodes it owns.
#[derive(Debug, Clone)]
pub enum LibraryNode {
    Embedded {
        name: String,
        objects: Vec<NodeId>,
        /// `None` for a header-only library.
        unit: Option<NodeId>,
        exposures: Vec<NodeId>,
        cxx: bool,
    },
    Binary {
        name: String,
        exposure: NodeId,
        search_path: PathBuf,
        link_name: String,
    },
}

impl LibraryNode {
    pub fn name(&self) -> &str {
        match self {
            LibraryNode::Embedded { name, .. } | LibraryNode::Binary { name, .. } => name,
        }
    }

    pub fn exposures(&self) -> Vec<NodeId> {
        match self {
            LibraryNode::Embedded { exposures, .. } => exposures.clone(),
            LibraryNode::Binary { exposure, .. } => vec![*exposure],
        }
    }
}

/// What an ordered list of libraries adds to a final link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkContributions {
    pub units: Vec<PathBuf>,
    pub search_paths: Vec<PathBuf>,
    pub libs: Vec<String>,
    /// Prebuilt archives, watched as link inputs.
    pub archives: Vec<PathBuf>,
    /// Content edges onto the embedded units.
    pub deps: Vec<Edge>,
    pub cxx: bool,
}

impl LinkContributions {
    /// Embedded units first, in declaration order, then binary libraries in
    /// declaration order. Nothing is ever re-sorted.
    pub fn collect(builder: &GraphBuilder, libraries: &[&LibraryNode]) -> Self {
        let mut out = LinkContributions::default();

        for lib in libraries {
            if let LibraryNode::Embedded { unit, cxx, .. } = lib {
                out.cxx |= *cxx;
                if let Some(unit) = unit {
                    out.units.push(builder.node(*unit).output.clone());
                    out.deps.push(Edge {
                        node: *unit,
                        kind: EdgeKind::Content,
                    });
                }
            }
        }

        for lib in libraries {
            if let LibraryNode::Binary {
                exposure,
                search_path,
                link_name,
                ..
            } = lib
            {
                if !out.search_paths.contains(search_path) {
                    out.search_paths.push(search_path.clone());
                }
                out.libs.push(link_name.clone());
                let archive = search_path.join(format!("lib{}.a", link_name));
                if archive.exists() {
                    out.archives.push(archive);
                }
                out.deps.push(Edge {
                    node: *exposure,
                    kind: EdgeKind::Existence,
                });
            }
        }

        out
    }
}

impl GraphBuilder {
    /// Register a library. Its nodes are created immediately; targets refer
    /// to it by name afterwards.
    pub fn register_library(&mut self, decl: LibraryDecl) -> Result<usize> {
        let name = decl.name().to_string();
        if self.library_index.contains_key(&name) {
            return Err(BuildError::DuplicateLibrary(name));
        }

        let node = match decl {
            LibraryDecl::Embedded(lib) => self.compose_embedded(lib)?,
            LibraryDecl::Binary(lib) => self.compose_binary(lib)?,
        };

        let index = self.libraries.len();
        self.libraries.push(node);
        self.library_index.insert(name, index);
        Ok(index)
    }

    fn compose_embedded(&mut self, lib: EmbeddedLibrary) -> Result<LibraryNode> {
        let overlay = CompileConfig {
            includes: lib.includes.clone(),
            symbols: lib.symbols.clone(),
            flags: lib.flags.clone(),
        };
        let config = Arc::new(self.base.overlay(&overlay));

        let mut sources: Vec<SourceUnit> = Vec::new();
        for root in &lib.src_roots {
            sources.extend(discover(root, &self.extensions));
        }
        for path in &lib.sources {
            let kind = self.extensions.kind_of(path).ok_or_else(|| {
                BuildError::UnknownExtension(
                    path.extension()
                        .map(|e| e.to_string_lossy().to_string())
                        .unwrap_or_default(),
                )
            })?;
            let unit = SourceUnit::new(path, kind);
            if !sources.contains(&unit) {
                sources.push(unit);
            }
        }

        let mut exposures = Vec::new();
        for header in &lib.headers {
            let output = virtual_header_path(&self.store, &lib.name, header, &lib.includes);
            let job = TransformJob {
                library: lib.name.clone(),
                header: header.clone(),
                output,
                symbols: lib.symbols.clone(),
                includes: lib.includes.clone(),
            };
            let label = format!("{}: {}", lib.name, self.label_for(header));
            let id =
                self.add_exposure(label, HeaderExposure::Transform(job), vec![header.clone()])?;
            exposures.push(id);
        }

        let cxx = sources.iter().any(|s| s.kind == SourceKind::Cxx);
        let mut objects = Vec::new();
        for source in sources {
            objects.push(self.add_compile(source, config.clone(), vec![])?);
        }

        let unit = if objects.is_empty() {
            None
        } else {
            let output = self.store.library_unit(&lib.name);
            let job = PartialLinkJob {
                library: lib.name.clone(),
                objects: objects
                    .iter()
                    .map(|id| self.node(*id).output.clone())
                    .collect(),
                output: output.clone(),
            };
            let deps = objects
                .iter()
                .map(|id| Edge {
                    node: *id,
                    kind: EdgeKind::Content,
                })
                .collect();
            let label = format!("lib{}.o", lib.name);
            Some(self.add_node(label, Action::PartialLink(job), output, deps, vec![])?)
        };

        Ok(LibraryNode::Embedded {
            name: lib.name,
            objects,
            unit,
            exposures,
            cxx,
        })
    }

    fn compose_binary(&mut self, lib: BinaryLibrary) -> Result<LibraryNode> {
        let exposure = HeaderExposure::Alias {
            alias: self.store.header_dir(&lib.name),
            target: lib.include.clone(),
        };
        let label = format!("{} -> {}", lib.name, self.label_for(&lib.include));
        let exposure = self.add_exposure(label, exposure, vec![])?;

        Ok(LibraryNode::Binary {
            name: lib.name,
            exposure,
            search_path: lib.search_path,
            link_name: lib.link_name,
        })
    }

    pub fn library(&self, name: &str) -> Option<&LibraryNode> {
        self.library_index.get(name).map(|i| &self.libraries[*i])
    }
}

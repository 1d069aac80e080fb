//! Target builder: objects from a source root, the final link, and an
//! optional derived image.

use super::builder::GraphBuilder;
use super::discover::discover;
use super::graph::{Action, Edge, EdgeKind, NodeId};
use super::library::{LibraryNode, LinkContributions};
use crate::error::{BuildError, Result};
use crate::toolchain::{ConvertJob, LinkJob, SourceKind};
use std::path::PathBuf;

/// A declared link target.
#[derive(Debug, Clone)]
pub struct TargetDecl {
    /// Output name: `<name>.elf`, `<name>.hex`, ...
    pub name: String,
    pub src_root: PathBuf,
    /// Libraries in link order.
    pub libraries: Vec<String>,
    /// Derived image format (`ihex`, `binary`, ...), if any.
    pub image: Option<String>,
}

/// A registered target and the nodes it owns.
#[derive(Debug, Clone)]
pub struct TargetNode {
    pub name: String,
    pub objects: Vec<NodeId>,
    pub link: NodeId,
    pub image: Option<NodeId>,
    pub libraries: Vec<String>,
}

impl TargetNode {
    /// The node whose completion means the target is done.
    pub fn last(&self) -> NodeId {
        self.image.unwrap_or(self.link)
    }
}

impl GraphBuilder {
    /// Register a target. Every library it names must be registered first.
    pub fn register_target(&mut self, decl: TargetDecl) -> Result<usize> {
        let mut libraries: Vec<LibraryNode> = Vec::with_capacity(decl.libraries.len());
        for (i, name) in decl.libraries.iter().enumerate() {
            if decl.libraries[..i].contains(name) {
                return Err(BuildError::RepeatedLibrary {
                    target: decl.name.clone(),
                    library: name.clone(),
                });
            }
            let lib = self
                .library(name)
                .ok_or_else(|| BuildError::UnknownLibrary {
                    target: decl.name.clone(),
                    library: name.clone(),
                })?;
            libraries.push(lib.clone());
        }

        // Headers must exist before anything here compiles, but a rebuilt
        // header is judged through the dependency record, not this edge.
        let header_edges: Vec<Edge> = libraries
            .iter()
            .flat_map(|lib| lib.exposures())
            .map(|node| Edge {
                node,
                kind: EdgeKind::Existence,
            })
            .collect();

        let sources = discover(&decl.src_root, &self.extensions);
        let cxx_sources = sources.iter().any(|s| s.kind == SourceKind::Cxx);

        let config = self.base.clone();
        let mut objects = Vec::with_capacity(sources.len());
        for source in sources {
            objects.push(self.add_compile(source, config.clone(), header_edges.clone())?);
        }

        let refs: Vec<&LibraryNode> = libraries.iter().collect();
        let contrib = LinkContributions::collect(self, &refs);

        let mut deps: Vec<Edge> = objects
            .iter()
            .map(|id| Edge {
                node: *id,
                kind: EdgeKind::Content,
            })
            .collect();
        deps.extend(contrib.deps.iter().copied());

        let output = self.store.artifact(&decl.name);
        let job = LinkJob {
            objects: objects
                .iter()
                .map(|id| self.node(*id).output.clone())
                .collect(),
            units: contrib.units,
            search_paths: contrib.search_paths,
            libs: contrib.libs,
            output: output.clone(),
            cxx: cxx_sources || contrib.cxx,
        };
        let label = format!("{}.elf", decl.name);
        let link = self.add_node(label, Action::Link(job), output.clone(), deps, contrib.archives)?;

        let image = match &decl.image {
            Some(format) => {
                let image_out = self.store.image(&decl.name, format);
                let job = ConvertJob {
                    input: output,
                    output: image_out.clone(),
                    format: format.clone(),
                };
                let label = self.label_for(&image_out);
                let deps = vec![Edge {
                    node: link,
                    kind: EdgeKind::Content,
                }];
                Some(self.add_node(label, Action::Convert(job), image_out, deps, vec![])?)
            }
            None => None,
        };

        let target = TargetNode {
            name: decl.name,
            objects,
            link,
            image,
            libraries: decl.libraries,
        };
        self.add_default(target.last());
        self.targets.push(target);
        Ok(self.targets.len() - 1)
    }
}

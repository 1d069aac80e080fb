//! Build graph: nodes, the two edge kinds, and staleness.
//!
//! The graph is built once by [`super::GraphBuilder`] and never changes
//! shape afterwards. Evaluation only touches output files and the
//! executor's completion bookkeeping.

use super::depfile::PriorRecord;
use super::headers::HeaderExposure;
use super::store::ArchStore;
use crate::toolchain::{CompileJob, ConvertJob, LinkJob, PartialLinkJob};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a node depends on another node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Schedule after the dependency, and rebuild when it changes.
    Content,
    /// Schedule after the dependency only. Never makes the dependent stale.
    Existence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub node: NodeId,
    pub kind: EdgeKind,
}

/// The work a node performs.
#[derive(Debug, Clone)]
pub enum Action {
    Compile(CompileJob),
    PartialLink(PartialLinkJob),
    Expose(HeaderExposure),
    Link(LinkJob),
    Convert(ConvertJob),
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Compile(_) => "compile",
            Action::PartialLink(_) => "partial-link",
            Action::Expose(HeaderExposure::Alias { .. }) => "alias",
            Action::Expose(HeaderExposure::Transform(_)) => "header",
            Action::Link(_) => "link",
            Action::Convert(_) => "convert",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub label: String,
    pub action: Action,
    pub output: PathBuf,
    /// Edges to other nodes.
    pub deps: Vec<Edge>,
    /// Content inputs that no node produces (sources, prebuilt archives).
    pub inputs: Vec<PathBuf>,
    /// Dependency record from the previous build (compile nodes only).
    pub prior: Option<PriorRecord>,
}

/// Why a node has to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    Fresh,
    OutputMissing,
    InputNewer(PathBuf),
    InputMissing(PathBuf),
    RecordMissing,
    RecordInvalid,
    DependencyRebuilt,
    /// The inputs of a link differ from the ones the output was made from.
    InputsChanged,
    AliasInvalid,
}

impl Staleness {
    pub fn is_stale(&self) -> bool {
        !matches!(self, Staleness::Fresh)
    }
}

impl fmt::Display for Staleness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Staleness::Fresh => write!(f, "up to date"),
            Staleness::OutputMissing => write!(f, "output missing"),
            Staleness::InputNewer(p) => write!(f, "{} is newer", p.display()),
            Staleness::InputMissing(p) => write!(f, "{} no longer exists", p.display()),
            Staleness::RecordMissing => write!(f, "dependency record missing"),
            Staleness::RecordInvalid => write!(f, "dependency record unreadable"),
            Staleness::DependencyRebuilt => write!(f, "a dependency was rebuilt"),
            Staleness::InputsChanged => write!(f, "link inputs changed"),
            Staleness::AliasInvalid => write!(f, "header alias missing or wrong"),
        }
    }
}

fn mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl Node {
    /// Decide whether this node must run. `dep_rebuilt` reports whether a
    /// content dependency already ran in this invocation.
    pub fn staleness(&self, graph: &BuildGraph, dep_rebuilt: bool) -> Staleness {
        if let Action::Expose(exposure @ HeaderExposure::Alias { .. }) = &self.action {
            return if exposure.alias_is_valid() {
                Staleness::Fresh
            } else {
                Staleness::AliasInvalid
            };
        }

        let Some(out_time) = mtime(&self.output) else {
            return Staleness::OutputMissing;
        };
        if dep_rebuilt {
            return Staleness::DependencyRebuilt;
        }
        if let Some((path, listing)) = self.input_listing()
            && fs::read_to_string(&path).ok().as_deref() != Some(listing.as_str())
        {
            return Staleness::InputsChanged;
        }

        let newer = |path: &Path| -> Option<Staleness> {
            match mtime(path) {
                None => Some(Staleness::InputMissing(path.to_path_buf())),
                Some(t) if t > out_time => Some(Staleness::InputNewer(path.to_path_buf())),
                Some(_) => None,
            }
        };

        for input in &self.inputs {
            if let Some(s) = newer(input) {
                return s;
            }
        }

        match &self.prior {
            Some(PriorRecord::Missing) => return Staleness::RecordMissing,
            Some(PriorRecord::Invalid) => return Staleness::RecordInvalid,
            Some(PriorRecord::Deps(deps)) => {
                for dep in deps {
                    if let Some(s) = newer(dep) {
                        return s;
                    }
                }
            }
            None => {}
        }

        for edge in self.deps.iter().filter(|e| e.kind == EdgeKind::Content) {
            let dep = graph.node(edge.node);
            if dep.produces_file()
                && let Some(s) = newer(&dep.output)
            {
                return s;
            }
        }

        Staleness::Fresh
    }

    /// For link steps, where the input listing lives and what it must say.
    ///
    /// Timestamps cannot tell that an object was dropped or that the link
    /// order changed, so the listing written after the last successful link
    /// is compared against the current inputs.
    pub fn input_listing(&self) -> Option<(PathBuf, String)> {
        let lines: Vec<String> = match &self.action {
            Action::Link(job) => job.inputs(),
            Action::PartialLink(job) => job
                .objects
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            _ => return None,
        };
        let mut listing = lines.join("\n");
        listing.push('\n');
        Some((ArchStore::listing_path(&self.output), listing))
    }

    /// Whether `output` is a file whose timestamp is meaningful to dependents.
    pub fn produces_file(&self) -> bool {
        !matches!(self.action, Action::Expose(HeaderExposure::Alias { .. }))
    }
}

/// An immutable build graph. Node ids index `nodes`; every edge points to
/// a node created earlier, so index order is a valid topological order.
#[derive(Debug, Clone, Default)]
pub struct BuildGraph {
    nodes: Vec<Node>,
    defaults: Vec<NodeId>,
}

impl BuildGraph {
    pub(crate) fn new(nodes: Vec<Node>, defaults: Vec<NodeId>) -> Self {
        Self { nodes, defaults }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Final nodes of every registered target (link or convert).
    pub fn defaults(&self) -> &[NodeId] {
        &self.defaults
    }

    pub fn find_output(&self, output: &Path) -> Option<&Node> {
        self.nodes.iter().find(|n| n.output == output)
    }

    /// Reverse edges: for every node, the nodes that depend on it.
    pub fn dependents(&self) -> Vec<Vec<NodeId>> {
        let mut rev = vec![Vec::new(); self.nodes.len()];
        for node in &self.nodes {
            for edge in &node.deps {
                rev[edge.node.0].push(node.id);
            }
        }
        rev
    }

    /// Nodes that would run now, in topological order, without running
    /// anything. A node counts as rebuilt for its dependents if it is stale.
    pub fn plan(&self) -> Vec<(NodeId, Staleness)> {
        let mut rebuilt = vec![false; self.nodes.len()];
        let mut planned = Vec::new();

        for node in &self.nodes {
            let dep_rebuilt = node
                .deps
                .iter()
                .any(|e| e.kind == EdgeKind::Content && rebuilt[e.node.0]);
            let staleness = node.staleness(self, dep_rebuilt);
            if staleness.is_stale() {
                rebuilt[node.id.0] = true;
                planned.push((node.id, staleness));
            }
        }
        planned
    }
}

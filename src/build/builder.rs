//! Build graph builder.
//!
//! Callers register libraries first, then targets, and finally call
//! [`GraphBuilder::build`] to get an immutable [`BuildGraph`]. All node
//! creation goes through here. Node configuration is merged with the base
//! configuration once, at creation time.

use super::depfile::DependencyTracker;
use super::discover::ExtensionSet;
use super::graph::{Action, BuildGraph, Edge, Node, NodeId};
use super::headers::HeaderExposure;
use super::library::LibraryNode;
use super::store::ArchStore;
use super::target::TargetNode;
use crate::error::{BuildError, Result};
use crate::toolchain::{CompileConfig, CompileJob, SourceUnit};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct GraphBuilder {
    pub(super) store: ArchStore,
    pub(super) base: Arc<CompileConfig>,
    pub(super) extensions: ExtensionSet,
    tracker: DependencyTracker,
    nodes: Vec<Node>,
    outputs: HashMap<PathBuf, NodeId>,
    exposures: HashMap<PathBuf, NodeId>,
    pub(super) libraries: Vec<LibraryNode>,
    pub(super) library_index: HashMap<String, usize>,
    pub(super) targets: Vec<TargetNode>,
    defaults: Vec<NodeId>,
}

impl GraphBuilder {
    /// `base` applies to every compile. The virtual header root of `store`
    /// is appended to its include paths.
    pub fn new(store: ArchStore, base: CompileConfig, extensions: ExtensionSet) -> Self {
        let mut base = base;
        let include_root = store.include_root();
        if !base.includes.contains(&include_root) {
            base.includes.push(include_root);
        }

        Self {
            tracker: DependencyTracker::new(store.project_root()),
            store,
            base: Arc::new(base),
            extensions,
            nodes: Vec::new(),
            outputs: HashMap::new(),
            exposures: HashMap::new(),
            libraries: Vec::new(),
            library_index: HashMap::new(),
            targets: Vec::new(),
            defaults: Vec::new(),
        }
    }

    pub fn store(&self) -> &ArchStore {
        &self.store
    }

    pub fn libraries(&self) -> &[LibraryNode] {
        &self.libraries
    }

    pub fn targets(&self) -> &[TargetNode] {
        &self.targets
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Display label for a path: relative to the project root when possible.
    pub(super) fn label_for(&self, path: &Path) -> String {
        path.strip_prefix(self.store.project_root())
            .unwrap_or(path)
            .display()
            .to_string()
    }

    pub(super) fn add_node(
        &mut self,
        label: String,
        action: Action,
        output: PathBuf,
        deps: Vec<Edge>,
        inputs: Vec<PathBuf>,
    ) -> Result<NodeId> {
        if let Some(existing) = self.outputs.get(&output) {
            return Err(BuildError::DuplicateOutput {
                path: output,
                first: self.nodes[existing.0].label.clone(),
                second: label,
            });
        }

        let id = NodeId(self.nodes.len());
        self.outputs.insert(output.clone(), id);
        self.nodes.push(Node {
            id,
            label,
            action,
            output,
            deps,
            inputs,
            prior: None,
        });
        Ok(id)
    }

    /// Create the object node for `source`, loading its dependency record
    /// from the previous build.
    pub(super) fn add_compile(
        &mut self,
        source: SourceUnit,
        config: Arc<CompileConfig>,
        deps: Vec<Edge>,
    ) -> Result<NodeId> {
        let output = self.store.object_path(&source.path);
        let record = ArchStore::record_path(&output);
        let prior = self.tracker.load(&record);
        let label = self.label_for(&source.path);
        let inputs = vec![source.path.clone()];

        let job = CompileJob {
            source,
            output: output.clone(),
            record,
            config,
        };
        let id = self.add_node(label, Action::Compile(job), output, deps, inputs)?;
        self.nodes[id.0].prior = Some(prior);
        Ok(id)
    }

    /// Create a header exposure, or return the existing node when the same
    /// exposure was already requested. A different header claiming the same
    /// virtual path is an error.
    pub(super) fn add_exposure(
        &mut self,
        label: String,
        exposure: HeaderExposure,
        inputs: Vec<PathBuf>,
    ) -> Result<NodeId> {
        let output = exposure.output().to_path_buf();
        if let Some(&id) = self.exposures.get(&output) {
            let existing = &self.nodes[id.0];
            return match &existing.action {
                Action::Expose(first) if first.same_as(&exposure) => Ok(id),
                _ => Err(BuildError::DuplicateOutput {
                    path: output,
                    first: existing.label.clone(),
                    second: label,
                }),
            };
        }
        let id = self.add_node(label, Action::Expose(exposure), output.clone(), vec![], inputs)?;
        self.exposures.insert(output, id);
        Ok(id)
    }

    pub(super) fn add_default(&mut self, id: NodeId) {
        self.defaults.push(id);
    }

    pub fn build(self) -> BuildGraph {
        BuildGraph::new(self.nodes, self.defaults)
    }
}

//! Graph evaluation on a bounded worker pool.
//!
//! The coordinating thread owns all bookkeeping: it decides staleness for a
//! node once every dependency has completed, hands stale nodes to the pool,
//! and releases dependents as results come back. Workers share nothing but
//! the immutable graph and the toolchain.

use super::depfile::DependencyTracker;
use super::graph::{Action, BuildGraph, EdgeKind, Node, NodeId};
use super::store::ArchStore;
use crate::error::{BuildError, Result};
use crate::toolchain::{ToolOutput, Toolchain};
use crate::ui::Reporter;
use std::collections::VecDeque;
use std::fs;
use std::sync::Arc;
use std::sync::mpsc;

#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Worker count. 0 uses one per CPU.
    pub jobs: usize,
    /// Keep scheduling unrelated nodes after a failure.
    pub keep_going: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Nodes whose action ran and succeeded, in completion order.
    pub executed: Vec<NodeId>,
    pub up_to_date: usize,
    /// Nodes never scheduled because of a failure.
    pub skipped: usize,
}

struct Outcome {
    id: NodeId,
    result: Result<ToolOutput>,
}

/// Run one node's action. A failed action leaves no output behind.
pub fn run_node(
    node: &Node,
    toolchain: &dyn Toolchain,
    tracker: &DependencyTracker,
) -> Result<ToolOutput> {
    ArchStore::ensure_parent(&node.output)?;

    let result = match &node.action {
        Action::Compile(job) => toolchain.compile(job).inspect(|_| {
            tracker.ingest(&job.output, &job.record, &job.source.path);
        }),
        Action::PartialLink(job) => toolchain.partial_link(job),
        Action::Expose(exposure) => exposure.materialize(toolchain),
        Action::Link(job) => toolchain.link(job),
        Action::Convert(job) => toolchain.convert(job),
    };

    let result = result.and_then(|output| {
        if let Some((path, listing)) = node.input_listing() {
            fs::write(&path, listing).map_err(|e| BuildError::io(&path, e))?;
        }
        Ok(output)
    });

    if result.is_err() {
        discard_partial(node);
    }
    result
}

fn discard_partial(node: &Node) {
    if node.produces_file() {
        let _ = fs::remove_file(&node.output);
    }
    if let Some((path, _)) = node.input_listing() {
        let _ = fs::remove_file(path);
    }
    if let Action::Compile(job) = &node.action {
        let _ = fs::remove_file(&job.record);
    }
}

/// Evaluate `graph`. Returns [`BuildError::Aborted`] carrying the first
/// failure if any node failed.
pub fn execute(
    graph: &Arc<BuildGraph>,
    toolchain: &Arc<dyn Toolchain>,
    tracker: &DependencyTracker,
    options: &ExecOptions,
    reporter: &Reporter,
) -> Result<BuildReport> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.jobs)
        .thread_name(|i| format!("kiln-worker-{}", i))
        .build()?;

    let n = graph.len();
    let dependents = graph.dependents();
    let mut waiting: Vec<usize> = graph.nodes().iter().map(|node| node.deps.len()).collect();
    let mut rebuilt = vec![false; n];
    let mut ready: VecDeque<NodeId> = graph
        .nodes()
        .iter()
        .filter(|node| node.deps.is_empty())
        .map(|node| node.id)
        .collect();

    let (tx, rx) = mpsc::channel::<Outcome>();
    let mut report = BuildReport::default();
    let mut failures: Vec<BuildError> = Vec::new();
    let mut in_flight = 0usize;

    let release = |id: NodeId, waiting: &mut Vec<usize>, ready: &mut VecDeque<NodeId>| {
        for dep in &dependents[id.0] {
            waiting[dep.0] -= 1;
            if waiting[dep.0] == 0 {
                ready.push_back(*dep);
            }
        }
    };

    loop {
        let stop = !failures.is_empty() && !options.keep_going;

        while !stop {
            let Some(id) = ready.pop_front() else {
                break;
            };
            let node = graph.node(id);
            let dep_rebuilt = node
                .deps
                .iter()
                .any(|e| e.kind == EdgeKind::Content && rebuilt[e.node.0]);

            let staleness = node.staleness(graph, dep_rebuilt);
            if !staleness.is_stale() {
                report.up_to_date += 1;
                reporter.up_to_date(node);
                release(id, &mut waiting, &mut ready);
                continue;
            }

            reporter.started(node, &staleness);
            in_flight += 1;

            let graph = Arc::clone(graph);
            let toolchain = Arc::clone(toolchain);
            let tracker = tracker.clone();
            let tx = tx.clone();
            pool.spawn(move || {
                let result = run_node(graph.node(id), toolchain.as_ref(), &tracker);
                let _ = tx.send(Outcome { id, result });
            });
        }

        if in_flight == 0 {
            break;
        }

        let Ok(outcome) = rx.recv() else {
            break;
        };
        in_flight -= 1;

        let node = graph.node(outcome.id);
        match outcome.result {
            Ok(output) => {
                reporter.finished(node, &output);
                rebuilt[outcome.id.0] = true;
                report.executed.push(outcome.id);
                release(outcome.id, &mut waiting, &mut ready);
            }
            Err(error) => {
                reporter.failed(node, &error);
                failures.push(error);
            }
        }
    }

    report.skipped = n - report.executed.len() - report.up_to_date - failures.len();

    if failures.is_empty() {
        return Ok(report);
    }
    let failed = failures.len();
    let first = failures.swap_remove(0);
    Err(BuildError::Aborted {
        failed,
        first: Box::new(first),
    })
}

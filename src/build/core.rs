use super::builder::GraphBuilder;
use super::depfile::DependencyTracker;
use super::discover::ExtensionSet;
use super::executor::{BuildReport, ExecOptions, execute};
use super::graph::{Action, BuildGraph, EdgeKind};
use super::store::{ArchContext, ArchStore, ensure_dir};
use crate::config::KilnConfig;
use crate::error::{BuildError, Result as BuildResult};
use crate::toolchain::{GnuToolchain, Toolchain};
use crate::ui::Reporter;
use anyhow::{Context, Result};
use colored::*;
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Options of `kiln build`.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub jobs: Option<usize>,
    /// Overrides `[build] cross`.
    pub cross: Option<String>,
    pub keep_going: bool,
    pub dry_run: bool,
    pub verbose: bool,
}

/// Register every configured library, then every target, and freeze the
/// graph for `context`.
pub fn construct_graph(
    root: &Path,
    config: &KilnConfig,
    context: ArchContext,
) -> BuildResult<(ArchStore, BuildGraph)> {
    let store = ArchStore::new(root, &config.bin_root(root), context);
    let extensions = ExtensionSet::new(&config.build.extensions)?;
    let mut builder = GraphBuilder::new(store.clone(), config.base_config(root), extensions);

    for decl in config.library_decls(root) {
        builder.register_library(decl)?;
    }
    for decl in config.target_decls(root) {
        builder.register_target(decl)?;
    }

    Ok((store, builder.build()))
}

/// Resolve the architecture context from `toolchain`, build the graph and
/// evaluate it.
pub fn build(
    root: &Path,
    config: &KilnConfig,
    toolchain: Arc<dyn Toolchain>,
    options: &ExecOptions,
    reporter: &Reporter,
) -> BuildResult<BuildReport> {
    let context = ArchContext::resolve(toolchain.as_ref())?;
    let (_, graph) = construct_graph(root, config, context)?;
    let graph = Arc::new(graph);
    let tracker = DependencyTracker::new(root);
    execute(&graph, &toolchain, &tracker, options, reporter)
}

/// Write `compile_commands.json` for every compile node.
pub fn write_compile_db(graph: &BuildGraph, toolchain: &GnuToolchain, store: &ArchStore) -> Result<()> {
    let directory = store.project_root().display().to_string();
    let entries: Vec<serde_json::Value> = graph
        .nodes()
        .iter()
        .filter_map(|node| match &node.action {
            Action::Compile(job) => {
                let (program, args) = toolchain.compile_command(job);
                let mut arguments = vec![program.display().to_string()];
                arguments.extend(args);
                Some(json!({
                    "directory": directory,
                    "arguments": arguments,
                    "file": job.source.path.display().to_string(),
                    "output": job.output.display().to_string(),
                }))
            }
            _ => None,
        })
        .collect();

    ensure_dir(store.dir())?;
    let json_str = serde_json::to_string_pretty(&entries)?;
    fs::write(store.compile_db(), json_str).context("Failed to write compile_commands.json")?;
    Ok(())
}

pub fn print_graph(graph: &BuildGraph) {
    for node in graph.nodes() {
        println!(
            "{} {:<12} {}",
            format!("{:>4}", node.id.to_string()).dimmed(),
            node.action.kind().cyan(),
            node.label
        );
        for edge in &node.deps {
            let kind = match edge.kind {
                EdgeKind::Content => "content",
                EdgeKind::Existence => "exists",
            };
            println!(
                "       {} {} {}",
                "←".dimmed(),
                graph.node(edge.node).label,
                format!("({})", kind).dimmed()
            );
        }
    }
}

// --- CORE: Build Project ---
pub fn build_project(root: &Path, config: &KilnConfig, opts: &BuildOptions) -> Result<bool> {
    let start_time = Instant::now();

    let gnu = config.toolchain(root, opts.cross.as_deref());
    let context = ArchContext::resolve(&gnu)
        .context("Failed to query the compiler for its target triple")?;

    println!(
        "{} Project: {} ({})",
        "🚀".blue(),
        config.package.display_name().bold(),
        context.triple()
    );

    let (store, graph) = construct_graph(root, config, context)?;

    if opts.dry_run {
        let plan = graph.plan();
        if plan.is_empty() {
            println!("{} Up to date", "⚡".green());
        }
        for (id, why) in plan {
            let node = graph.node(id);
            println!(
                "   {} {} {} ({})",
                "→".dimmed(),
                node.action.kind().cyan(),
                node.label,
                why.to_string().dimmed()
            );
        }
        return Ok(true);
    }

    write_compile_db(&graph, &gnu, &store)?;
    let graph = Arc::new(graph);
    let toolchain: Arc<dyn Toolchain> = Arc::new(gnu);
    let tracker = DependencyTracker::new(root);
    let options = ExecOptions {
        jobs: opts.jobs.or(config.build.jobs).unwrap_or(0),
        keep_going: opts.keep_going,
    };

    let reporter = Reporter::new(graph.len(), opts.verbose);
    let result = execute(&graph, &toolchain, &tracker, &options, &reporter);
    reporter.finish();

    match result {
        Ok(report) if report.executed.is_empty() => {
            println!("{} Up to date", "⚡".green());
        }
        Ok(report) => {
            println!(
                "{} Build finished in {:.2?} ({} step(s) run, {} up to date)",
                "✓".green(),
                start_time.elapsed(),
                report.executed.len(),
                report.up_to_date
            );
        }
        Err(BuildError::Aborted { failed, .. }) => {
            eprintln!("{} Build failed: {} step(s) failed", "x".red(), failed);
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    }

    for id in graph.defaults() {
        println!("   {} {}", "→".dimmed(), graph.node(*id).output.display());
    }
    Ok(true)
}

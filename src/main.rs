//! # kiln CLI Entry Point
//!
//! Parses CLI arguments using clap and routes commands to the build engine.
//!
//! ## Commands
//!
//! - `build` (default), `clean`, `watch`
//! - `graph`, `info`
//! - `cppp` - the built-in header transformer as a standalone program

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use kiln::build;
use kiln::config::{self, KilnConfig};
use kiln::cppp;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Incremental builds for cross-compiled C/C++ firmware", version = env!("CARGO_PKG_VERSION"))]
#[command(propagate_version = true)]
struct Cli {
    /// Run as if started in <DIR>
    #[arg(short = 'C', global = true, value_name = "DIR")]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Args)]
struct BuildArgs {
    /// Number of parallel jobs (default: one per CPU)
    #[arg(short, long)]
    jobs: Option<usize>,
    /// Toolchain prefix, overrides [build] cross
    #[arg(long)]
    cross: Option<String>,
    /// Keep building unrelated steps after a failure
    #[arg(short, long)]
    keep_going: bool,
    /// Show what would be executed without running
    #[arg(long)]
    dry_run: bool,
    /// Show every executed step and why it ran
    #[arg(short, long)]
    verbose: bool,
}

impl From<&BuildArgs> for build::BuildOptions {
    fn from(args: &BuildArgs) -> Self {
        build::BuildOptions {
            jobs: args.jobs,
            cross: args.cross.clone(),
            keep_going: args.keep_going,
            dry_run: args.dry_run,
            verbose: args.verbose,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build every target of the project
    Build(BuildArgs),
    /// Remove the outputs of the active architecture
    Clean {
        /// Toolchain prefix, overrides [build] cross
        #[arg(long)]
        cross: Option<String>,
    },
    /// Rebuild on every source change
    Watch(BuildArgs),
    /// Print the build graph
    Graph {
        /// Toolchain prefix, overrides [build] cross
        #[arg(long)]
        cross: Option<String>,
    },
    /// Show the resolved architecture and output store
    Info {
        /// Toolchain prefix, overrides [build] cross
        #[arg(long)]
        cross: Option<String>,
    },
    /// Expand a header with symbols baked in
    Cppp {
        /// Header to transform
        header: PathBuf,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Include search directory
        #[arg(short = 'I', value_name = "DIR")]
        includes: Vec<PathBuf>,
        /// Symbol definition, sym[=val]
        #[arg(short = 'D', value_name = "SYM[=VAL]")]
        defines: Vec<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{} {:#}", "x".red(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<bool> {
    let root = project_root(cli.dir.as_deref())?;

    match &cli.command {
        None => {
            let config = config::load_config(&root)?;
            build::build_project(&root, &config, &build::BuildOptions::default())
        }
        Some(Commands::Build(args)) => {
            let config = config::load_config(&root)?;
            build::build_project(&root, &config, &args.into())
        }
        Some(Commands::Watch(args)) => {
            let config = config::load_config(&root)?;
            build::watch(&root, &config, &args.into())?;
            Ok(true)
        }
        Some(Commands::Clean { cross }) => {
            let config = config::load_config(&root)?;
            build::clean(&root, &config, cross.as_deref())?;
            Ok(true)
        }
        Some(Commands::Graph { cross }) => {
            let config = config::load_config(&root)?;
            print_graph(&root, &config, cross.as_deref())?;
            Ok(true)
        }
        Some(Commands::Info { cross }) => {
            let config = config::load_config(&root)?;
            print_info(&root, &config, cross.as_deref())?;
            Ok(true)
        }
        Some(Commands::Cppp {
            header,
            output,
            includes,
            defines,
        }) => {
            run_cppp(&root, header, output.as_deref(), includes, defines)?;
            Ok(true)
        }
    }
}

fn project_root(dir: Option<&Path>) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("Failed to read the current directory")?;
    Ok(match dir {
        Some(d) if d.is_absolute() => d.to_path_buf(),
        Some(d) => cwd.join(d),
        None => cwd,
    })
}

fn resolve_context(
    root: &Path,
    config: &KilnConfig,
    cross: Option<&str>,
) -> Result<build::ArchContext> {
    let toolchain = config.toolchain(root, cross);
    build::ArchContext::resolve(&toolchain).context("Failed to query the compiler for its target triple")
}

fn print_graph(root: &Path, config: &KilnConfig, cross: Option<&str>) -> Result<()> {
    let context = resolve_context(root, config, cross)?;
    let (_, graph) = build::construct_graph(root, config, context)?;
    build::print_graph(&graph);
    Ok(())
}

fn print_info(root: &Path, config: &KilnConfig, cross: Option<&str>) -> Result<()> {
    let toolchain = config.toolchain(root, cross);
    let context = resolve_context(root, config, cross)?;
    let (store, graph) = build::construct_graph(root, config, context)?;

    println!("{} v{}", "kiln".bold().cyan(), env!("CARGO_PKG_VERSION"));
    println!("------------------------------------");
    println!("{}: {}", "Project".bold(), config.package.display_name());
    println!("{}: {}", "Triple".bold(), store.context().triple());
    println!("{}: {}{}", "Compiler".bold(), toolchain.prefix, toolchain.cc);
    println!("{}: {}", "Store".bold(), store.dir().display());
    println!(
        "{}: {}",
        "Extensions".bold(),
        config.extensions()?.extensions().collect::<Vec<_>>().join(", ")
    );
    println!("{}: {} node(s)", "Graph".bold(), graph.len());

    for id in graph.defaults() {
        println!("   {} {}", "→".dimmed(), graph.node(*id).output.display());
    }
    Ok(())
}

fn run_cppp(
    root: &Path,
    header: &Path,
    output: Option<&Path>,
    includes: &[PathBuf],
    defines: &[String],
) -> Result<()> {
    let symbols: BTreeMap<String, String> =
        defines.iter().map(|d| cppp::parse_define(d)).collect();
    let includes: Vec<PathBuf> = includes.iter().map(|i| root.join(i)).collect();
    let header = root.join(header);

    match output {
        Some(out) => {
            cppp::transform_file(&header, &root.join(out), &includes, &symbols)?;
        }
        None => {
            let content = std::fs::read_to_string(&header)
                .with_context(|| format!("Failed to read {}", header.display()))?;
            let text = cppp::transform(&header, &content, &includes, &symbols)?;
            std::io::stdout()
                .write_all(text.as_bytes())
                .context("Failed to write to stdout")?;
        }
    }
    Ok(())
}

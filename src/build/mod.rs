mod builder;
mod clean;
mod core;
pub mod depfile;
pub mod discover;
mod executor;
mod graph;
pub mod headers;
mod library;
pub mod store;
mod target;
mod watcher;

pub use builder::GraphBuilder;
pub use clean::{clean, clean_store};
pub use core::{BuildOptions, build, build_project, construct_graph, print_graph, write_compile_db};
pub use depfile::{DependencyTracker, PriorRecord};
pub use discover::{ExtensionSet, discover};
pub use executor::{BuildReport, ExecOptions, execute, run_node};
pub use graph::{Action, BuildGraph, Edge, EdgeKind, Node, NodeId, Staleness};
pub use headers::HeaderExposure;
pub use library::{BinaryLibrary, EmbeddedLibrary, LibraryDecl, LibraryNode, LinkContributions};
pub use store::{ArchContext, ArchStore};
pub use target::{TargetDecl, TargetNode};
pub use watcher::watch;

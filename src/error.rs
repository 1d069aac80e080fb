//! Error types for graph construction and evaluation.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building or evaluating a build graph.
#[derive(Debug, Error)]
pub enum BuildError {
    /// An external tool ran and exited unsuccessfully. `diagnostic` is the
    /// tool's own output, passed through untouched.
    #[error("{operation} failed for {node}:\n{diagnostic}")]
    Tool {
        operation: &'static str,
        node: String,
        diagnostic: String,
    },

    #[error("Failed to execute '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{}' is produced by both {first} and {second}", path.display())]
    DuplicateOutput {
        path: PathBuf,
        first: String,
        second: String,
    },

    #[error("Target '{target}' references unknown library '{library}'")]
    UnknownLibrary { target: String, library: String },

    #[error("Target '{target}' lists library '{library}' more than once")]
    RepeatedLibrary { target: String, library: String },

    #[error("Library '{0}' is declared more than once")]
    DuplicateLibrary(String),

    #[error("Unrecognized source extension '{0}' (expected one of: S, s, asm, c, cpp, cc, cxx)")]
    UnknownExtension(String),

    #[error("At least one source extension must be configured")]
    NoExtensions,

    #[error("Could not start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("Could not determine target triple: {0}")]
    Triple(String),

    #[error("Build failed ({failed} node(s) failed)\n{first}")]
    Aborted {
        failed: usize,
        first: Box<BuildError>,
    },
}

impl BuildError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = BuildError> = std::result::Result<T, E>;

//! External toolchain operations.
//!
//! The build engine never runs a compiler directly. Every external step
//! (compile, partial link, link, convert, header transform) goes through the
//! [`Toolchain`] trait, so the graph and the executor only see inputs,
//! outputs and a success/failure result. [`GnuToolchain`] is the process
//! implementation for GCC-style cross toolchains.

pub mod gnu;
pub mod types;

pub use gnu::GnuToolchain;
pub use types::{
    CompileConfig, CompileJob, ConvertJob, LinkJob, PartialLinkJob, SourceKind, SourceUnit,
    ToolOutput, TransformJob,
};

use crate::error::{BuildError, Result};
use std::path::{Component, Path};

/// The contract between the build engine and the external tools.
///
/// Implementations must write exactly the declared output path of each job
/// and report a non-zero exit as [`crate::BuildError::Tool`] carrying the
/// tool's own diagnostic. Removing a partially written output after a
/// failure is the executor's job, not the toolchain's.
pub trait Toolchain: Send + Sync {
    /// Target triple reported by the configured compiler.
    fn triple(&self) -> Result<String>;

    /// Assemble or compile one source, writing the object and its
    /// dependency record.
    fn compile(&self, job: &CompileJob) -> Result<ToolOutput>;

    fn partial_link(&self, job: &PartialLinkJob) -> Result<ToolOutput>;

    fn link(&self, job: &LinkJob) -> Result<ToolOutput>;

    fn convert(&self, job: &ConvertJob) -> Result<ToolOutput>;

    fn transform_header(&self, job: &TransformJob) -> Result<ToolOutput>;
}

/// Turn a reported triple into a single safe path component.
///
/// The result names the store directory under the bin root, so anything
/// that would not be exactly one normal component (`""`, `.`, `..`) is
/// rejected.
pub fn sanitize_triple(raw: &str) -> Result<String> {
    let triple: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect();

    let mut components = Path::new(&triple).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(triple),
        _ => Err(BuildError::Triple(format!(
            "'{}' is not usable as a store directory name",
            raw.trim()
        ))),
    }
}

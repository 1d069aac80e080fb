//! # kiln - Incremental builds for cross-compiled firmware
//!
//! kiln turns a directory of C, C++ and assembly sources, a set of embedded
//! (source) and binary (prebuilt) libraries, and a GCC-style cross
//! toolchain into one linked artifact per target, rebuilding only what
//! changed.
//!
//! ## Features
//!
//! - **Architecture-scoped outputs**: everything lands under
//!   `<bin_root>/<triple>/`, so switching toolchains never reuses objects
//! - **Header virtualization**: library headers are exposed under one
//!   include root as `<lib>/<header>`
//! - **Lagging depfiles**: header dependencies are learned from the
//!   compiler's own `.d` records
//! - **Parallel builds**: a bounded worker pool that respects the graph
//!
//! ## Module Organization
//!
//! - [`build`] - Graph construction and evaluation
//! - [`config`] - Configuration parsing (`kiln.toml`)
//! - [`toolchain`] - The external tool contract and the GNU implementation
//! - [`cppp`] - The built-in header transformer

/// Graph construction, staleness and parallel evaluation.
pub mod build;

/// Configuration file parsing (`kiln.toml`).
pub mod config;

/// Built-in header transformer.
pub mod cppp;

/// Library error type.
pub mod error;

/// External toolchain contract.
pub mod toolchain;

/// Terminal progress reporting.
pub mod ui;

pub use error::BuildError;

//! GCC-style cross toolchain driven through child processes.

use super::types::display_args;
use super::{
    CompileJob, ConvertJob, LinkJob, PartialLinkJob, SourceKind, ToolOutput, Toolchain,
    TransformJob, sanitize_triple,
};
use crate::cppp;
use crate::error::{BuildError, Result};
use std::path::PathBuf;
use std::process::Command;

/// A GCC/Clang-compatible toolchain selected by a cross prefix
/// (e.g. `avr-`, `arm-none-eabi-`).
#[derive(Debug, Clone)]
pub struct GnuToolchain {
    pub prefix: String,
    pub cc: String,
    pub cxx: String,
    pub objcopy: String,
    pub asflags: Vec<String>,
    pub cflags: Vec<String>,
    pub cxxflags: Vec<String>,
    pub ldflags: Vec<String>,
    /// Skip `-dumpmachine` and use this triple.
    pub triple: Option<String>,
    /// External header transformer. The built-in one is used when unset.
    pub header_transform: Option<PathBuf>,
}

impl Default for GnuToolchain {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            cc: "gcc".to_string(),
            cxx: "g++".to_string(),
            objcopy: "objcopy".to_string(),
            asflags: Vec::new(),
            cflags: Vec::new(),
            cxxflags: Vec::new(),
            ldflags: Vec::new(),
            triple: None,
            header_transform: None,
        }
    }
}

impl GnuToolchain {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    /// Resolve a tool name. Bare names get the cross prefix, paths are used as-is.
    fn program(&self, tool: &str) -> PathBuf {
        if tool.contains('/') || tool.contains('\\') {
            PathBuf::from(tool)
        } else {
            PathBuf::from(format!("{}{}", self.prefix, tool))
        }
    }

    /// The full compiler invocation for a compile job.
    pub fn compile_command(&self, job: &CompileJob) -> (PathBuf, Vec<String>) {
        let (program, class_flags) = match job.source.kind {
            SourceKind::Asm => (self.program(&self.cc), &self.asflags),
            SourceKind::C => (self.program(&self.cc), &self.cflags),
            SourceKind::Cxx => (self.program(&self.cxx), &self.cxxflags),
        };

        let mut args = Vec::new();
        args.extend(class_flags.iter().cloned());
        args.extend(job.config.flags.iter().cloned());
        args.extend(job.config.include_args());
        args.extend(job.config.define_args());

        // Dependency record for the next invocation
        args.push("-MMD".to_string());
        args.push("-MF".to_string());
        args.push(job.record.display().to_string());

        args.push("-c".to_string());
        args.push(job.source.path.display().to_string());
        args.push("-o".to_string());
        args.push(job.output.display().to_string());

        (program, args)
    }

    pub fn link_command(&self, job: &LinkJob) -> (PathBuf, Vec<String>) {
        let driver = if job.cxx { &self.cxx } else { &self.cc };
        let mut args = self.ldflags.clone();
        args.extend(job.inputs());
        args.push("-o".to_string());
        args.push(job.output.display().to_string());
        (self.program(driver), args)
    }

    fn run(
        &self,
        operation: &'static str,
        node: String,
        program: PathBuf,
        args: &[String],
    ) -> Result<ToolOutput> {
        let output = Command::new(&program)
            .args(args)
            .output()
            .map_err(|source| BuildError::Spawn {
                program: display_args(&program, args),
                source,
            })?;

        if !output.status.success() {
            let mut diagnostic = String::from_utf8_lossy(&output.stderr).to_string();
            if diagnostic.trim().is_empty() {
                diagnostic = String::from_utf8_lossy(&output.stdout).to_string();
            }
            return Err(BuildError::Tool {
                operation,
                node,
                diagnostic: diagnostic.trim_end().to_string(),
            });
        }

        Ok(ToolOutput::from_stderr(&output.stderr))
    }
}

impl Toolchain for GnuToolchain {
    fn triple(&self) -> Result<String> {
        if let Some(triple) = &self.triple {
            return sanitize_triple(triple);
        }

        let program = self.program(&self.cc);
        let output = Command::new(&program)
            .arg("-dumpmachine")
            .output()
            .map_err(|source| BuildError::Spawn {
                program: program.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(BuildError::Triple(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let reported = String::from_utf8_lossy(&output.stdout);
        if reported.trim().is_empty() {
            return Err(BuildError::Triple(format!(
                "'{} -dumpmachine' printed nothing",
                program.display()
            )));
        }
        sanitize_triple(&reported)
    }

    fn compile(&self, job: &CompileJob) -> Result<ToolOutput> {
        let (program, args) = self.compile_command(job);
        let operation = match job.source.kind {
            SourceKind::Asm => "assemble",
            SourceKind::C | SourceKind::Cxx => "compile",
        };
        self.run(operation, job.source.path.display().to_string(), program, &args)
    }

    fn partial_link(&self, job: &PartialLinkJob) -> Result<ToolOutput> {
        let mut args = vec![
            "-nostdlib".to_string(),
            "-nostartfiles".to_string(),
            "-r".to_string(),
        ];
        args.extend(job.objects.iter().map(|p| p.display().to_string()));
        args.push("-o".to_string());
        args.push(job.output.display().to_string());
        self.run(
            "partial link",
            format!("library '{}'", job.library),
            self.program(&self.cc),
            &args,
        )
    }

    fn link(&self, job: &LinkJob) -> Result<ToolOutput> {
        let (program, args) = self.link_command(job);
        self.run("link", job.output.display().to_string(), program, &args)
    }

    fn convert(&self, job: &ConvertJob) -> Result<ToolOutput> {
        let args = vec![
            "-O".to_string(),
            job.format.clone(),
            job.input.display().to_string(),
            job.output.display().to_string(),
        ];
        self.run(
            "convert",
            job.output.display().to_string(),
            self.program(&self.objcopy),
            &args,
        )
    }

    fn transform_header(&self, job: &TransformJob) -> Result<ToolOutput> {
        let Some(program) = &self.header_transform else {
            cppp::transform_file(&job.header, &job.output, &job.includes, &job.symbols)?;
            return Ok(ToolOutput::quiet());
        };

        let mut args = vec![
            job.header.display().to_string(),
            "-o".to_string(),
            job.output.display().to_string(),
        ];
        for inc in &job.includes {
            args.push("-I".to_string());
            args.push(inc.display().to_string());
        }
        for (name, value) in &job.symbols {
            args.push("-D".to_string());
            if value.is_empty() {
                args.push(name.clone());
            } else {
                args.push(format!("{}={}", name, value));
            }
        }
        self.run(
            "header transform",
            job.header.display().to_string(),
            program.clone(),
            &args,
        )
    }
}

//! Shared fixtures for the integration tests.
//!
//! [`FakeToolchain`] honors the toolchain contract without running any
//! compiler: every job writes its declared output, compiles write a
//! dependency record listing the headers they include, and every call is
//! recorded so tests can assert what ran.

#![allow(dead_code)]

use kiln::BuildError;
use kiln::build::{self, BuildReport, ExecOptions};
use kiln::config::KilnConfig;
use kiln::cppp;
use kiln::toolchain::{
    CompileJob, ConvertJob, LinkJob, PartialLinkJob, SourceKind, ToolOutput, Toolchain, TransformJob,
};
use kiln::ui::Reporter;
use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use walkdir::WalkDir;

/// A compile fails when the source contains this marker.
pub const FAIL_MARKER: &str = "FORCE_FAIL";

pub struct FakeToolchain {
    triple: String,
    log: Mutex<Vec<(String, PathBuf)>>,
}

impl FakeToolchain {
    pub fn new(triple: &str) -> Arc<Self> {
        Arc::new(Self {
            triple: triple.to_string(),
            log: Mutex::new(Vec::new()),
        })
    }

    fn record(&self, operation: &str, path: &Path) {
        self.log
            .lock()
            .unwrap()
            .push((operation.to_string(), path.to_path_buf()));
    }

    /// File names passed to `operation`, sorted.
    pub fn calls(&self, operation: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .log
            .lock()
            .unwrap()
            .iter()
            .filter(|(op, _)| op == operation)
            .map(|(_, p)| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    pub fn total(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    pub fn reset(&self) {
        self.log.lock().unwrap().clear();
    }
}

/// Resolve `name` the way a compiler would: the including file's directory
/// for quoted includes, then the configured search path.
fn find_include(name: &str, from: &Path, includes: &[PathBuf]) -> Option<PathBuf> {
    let local = from.parent().map(|d| d.join(name));
    local
        .into_iter()
        .chain(includes.iter().map(|dir| dir.join(name)))
        .find(|p| p.is_file())
}

fn scan_headers(file: &Path, includes: &[PathBuf], seen: &mut HashSet<PathBuf>) {
    let Ok(content) = fs::read_to_string(file) else {
        return;
    };
    for line in content.lines() {
        if let Some(name) = cppp::match_include(line)
            && let Some(found) = find_include(name, file, includes)
            && seen.insert(found.clone())
        {
            scan_headers(&found, includes, seen);
        }
    }
}

impl Toolchain for FakeToolchain {
    fn triple(&self) -> kiln::error::Result<String> {
        Ok(self.triple.clone())
    }

    fn compile(&self, job: &CompileJob) -> kiln::error::Result<ToolOutput> {
        self.record("compile", &job.source.path);
        let source = fs::read_to_string(&job.source.path).unwrap();

        if source.contains(FAIL_MARKER) {
            // A real compiler may leave a truncated object behind.
            fs::write(&job.output, "partial").unwrap();
            return Err(BuildError::Tool {
                operation: "compile",
                node: job.source.path.display().to_string(),
                diagnostic: format!("{}: error: {}", job.source.path.display(), FAIL_MARKER),
            });
        }

        let mut seen = HashSet::new();
        scan_headers(&job.source.path, &job.config.includes, &mut seen);
        let mut headers: Vec<PathBuf> = seen.into_iter().collect();
        headers.sort();

        let mut record = format!("{}: {}", job.output.display(), job.source.path.display());
        for header in &headers {
            record.push_str(" \\\n  ");
            record.push_str(&header.display().to_string());
        }
        record.push('\n');

        fs::write(&job.output, format!("obj {}", job.source.path.display())).unwrap();
        // Like some assemblers, write no record for assembly sources.
        if job.source.kind != SourceKind::Asm {
            fs::write(&job.record, record).unwrap();
        }
        Ok(ToolOutput::quiet())
    }

    fn partial_link(&self, job: &PartialLinkJob) -> kiln::error::Result<ToolOutput> {
        self.record("partial_link", &job.output);
        let listing: Vec<String> = job
            .objects
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        fs::write(&job.output, listing.join("\n")).unwrap();
        Ok(ToolOutput::quiet())
    }

    fn link(&self, job: &LinkJob) -> kiln::error::Result<ToolOutput> {
        self.record("link", &job.output);
        fs::write(&job.output, job.inputs().join("\n")).unwrap();
        Ok(ToolOutput::quiet())
    }

    fn convert(&self, job: &ConvertJob) -> kiln::error::Result<ToolOutput> {
        self.record("convert", &job.output);
        fs::write(&job.output, format!("{} {}", job.format, job.input.display())).unwrap();
        Ok(ToolOutput::quiet())
    }

    fn transform_header(&self, job: &TransformJob) -> kiln::error::Result<ToolOutput> {
        self.record("transform", &job.header);
        cppp::transform_file(&job.header, &job.output, &job.includes, &job.symbols)?;
        Ok(ToolOutput::quiet())
    }
}

/// A temporary project containing `files` (path, content).
pub fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (path, content) in files {
        write(dir.path(), path, content);
    }
    dir
}

pub fn write(root: &Path, path: &str, content: &str) {
    let full = root.join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(full, content).unwrap();
}

pub fn config(text: &str) -> KilnConfig {
    KilnConfig::parse(text).unwrap()
}

pub fn run(
    root: &Path,
    config: &KilnConfig,
    toolchain: &Arc<FakeToolchain>,
) -> Result<BuildReport, BuildError> {
    run_with(root, config, toolchain, false)
}

pub fn run_with(
    root: &Path,
    config: &KilnConfig,
    toolchain: &Arc<FakeToolchain>,
    keep_going: bool,
) -> Result<BuildReport, BuildError> {
    let toolchain: Arc<dyn Toolchain> = toolchain.clone();
    let options = ExecOptions {
        jobs: 4,
        keep_going,
    };
    build::build(root, config, toolchain, &options, &Reporter::hidden())
}

/// Move every regular file under `root` one hour into the past, so that a
/// later [`touch`] is strictly newer than any output regardless of the
/// filesystem's timestamp resolution.
pub fn age_tree(root: &Path) {
    let past = SystemTime::now() - Duration::from_secs(3600);
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if entry.file_type().is_file() {
            File::options()
                .write(true)
                .open(entry.path())
                .unwrap()
                .set_modified(past)
                .unwrap();
        }
    }
}

pub fn touch(path: &Path) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::now())
        .unwrap();
}

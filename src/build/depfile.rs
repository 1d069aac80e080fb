//! Dependency tracker.
//!
//! The compiler writes a make-style record (`obj.o: src.c a.h b.h`) next to
//! every object. The graph builder loads the record left by the *previous*
//! invocation and turns each listed file into a content dependency, so the
//! header set used to judge staleness is always one build behind. That lag
//! is accepted: a header added to an include chain is picked up by the
//! rebuild its includer needs anyway.

use std::fs;
use std::path::{Path, PathBuf};

/// What the previous invocation left for one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriorRecord {
    /// No record on disk (first build, or it was deleted).
    Missing,
    /// A record exists but could not be parsed.
    Invalid,
    /// Every file the object depended on last time.
    Deps(Vec<PathBuf>),
}

impl PriorRecord {
    pub fn deps(&self) -> &[PathBuf] {
        match self {
            PriorRecord::Deps(deps) => deps,
            _ => &[],
        }
    }
}

/// Parse the first rule of a make-style dependency record.
///
/// Returns the rule's target and its prerequisites, or `None` when the
/// content is not a rule at all.
pub fn parse(content: &str) -> Option<(String, Vec<String>)> {
    // Handle line continuations
    let flat = content.replace("\\\r\n", " ").replace("\\\n", " ");
    let rule = flat.lines().find(|l| !l.trim().is_empty())?;

    let sep = rule_separator(rule)?;
    let target = rule[..sep].trim();
    if target.is_empty() {
        return None;
    }
    Some((target.to_string(), split_words(&rule[sep + 1..])))
}

/// Index of the `:` ending the target list. A drive letter (`C:\`) is not
/// a separator.
fn rule_separator(rule: &str) -> Option<usize> {
    let bytes = rule.as_bytes();
    (0..bytes.len()).find(|&i| {
        bytes[i] == b':' && bytes.get(i + 1).is_none_or(|b| b.is_ascii_whitespace())
    })
}

/// Split prerequisites on whitespace, honouring `\ ` escapes.
fn split_words(s: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&' ') => {
                current.push(' ');
                chars.next();
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Loads and maintains per-object dependency records.
#[derive(Debug, Clone)]
pub struct DependencyTracker {
    project_root: PathBuf,
}

impl DependencyTracker {
    pub fn new(project_root: &Path) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
        }
    }

    /// Load the record a previous build left at `record`.
    pub fn load(&self, record: &Path) -> PriorRecord {
        let Ok(content) = fs::read_to_string(record) else {
            return PriorRecord::Missing;
        };
        match parse(&content) {
            Some((_, deps)) => PriorRecord::Deps(
                deps.into_iter()
                    .map(|d| self.resolve(Path::new(&d)))
                    .collect(),
            ),
            None => PriorRecord::Invalid,
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    /// Called after a successful compile. Makes sure a usable record exists
    /// for the next invocation: a compiler that wrote none (plain assembly)
    /// gets a minimal `object: source` record. Returns the number of files
    /// the record lists.
    pub fn ingest(&self, object: &Path, record: &Path, source: &Path) -> usize {
        if let PriorRecord::Deps(deps) = self.load(record) {
            return deps.len();
        }
        let minimal = format!(
            "{}: {}\n",
            escape(&object.display().to_string()),
            escape(&source.display().to_string())
        );
        match fs::write(record, minimal) {
            Ok(()) => 1,
            Err(_) => 0,
        }
    }
}

fn escape(path: &str) -> String {
    path.replace(' ', "\\ ")
}

//! Terminal reporting.
//!
//! One progress bar per build. Tool warnings and failures are printed with
//! the bar suspended so they never tear a line, and still appear when
//! stderr is not a terminal. With `verbose`, every node that runs is listed
//! with the reason it was stale.

use crate::build::{Node, Staleness};
use crate::error::BuildError;
use crate::toolchain::ToolOutput;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

pub struct Reporter {
    pb: ProgressBar,
    verbose: bool,
    silent: bool,
}

impl Reporter {
    pub fn new(total: usize, verbose: bool) -> Self {
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");

        let pb = ProgressBar::new(total as u64);
        pb.set_style(style);
        Self {
            pb,
            verbose,
            silent: false,
        }
    }

    /// A reporter that prints nothing. Used by library callers and tests.
    pub fn hidden() -> Self {
        Self {
            pb: ProgressBar::hidden(),
            verbose: false,
            silent: true,
        }
    }

    pub fn started(&self, node: &Node, why: &Staleness) {
        self.pb
            .set_message(format!("{} {}", node.action.kind(), node.label));
        if self.verbose {
            self.pb.suspend(|| {
                println!(
                    "   {} {} {} ({})",
                    "→".dimmed(),
                    node.action.kind().cyan(),
                    node.label,
                    why.to_string().dimmed()
                )
            });
        }
    }

    pub fn up_to_date(&self, _node: &Node) {
        self.pb.inc(1);
    }

    pub fn finished(&self, node: &Node, output: &ToolOutput) {
        if !self.silent && !output.diagnostics.is_empty() {
            self.pb.suspend(|| {
                eprintln!(
                    "{} Warning in {}:\n{}",
                    "!".yellow(),
                    node.label,
                    output.diagnostics
                )
            });
        }
        self.pb.inc(1);
    }

    pub fn failed(&self, _node: &Node, error: &BuildError) {
        if !self.silent {
            self.pb.suspend(|| eprintln!("{} {}", "x".red(), error));
        }
        self.pb.inc(1);
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

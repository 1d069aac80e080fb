use super::core::{BuildOptions, build_project};
use crate::config::{CONFIG_FILE, KilnConfig, load_config};
use anyhow::Result;
use colored::*;
use notify::{Config, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::mpsc::channel;
use std::time::Duration;

/// Rebuild whenever a source, include or library directory changes.
pub fn watch(root: &Path, config: &KilnConfig, opts: &BuildOptions) -> Result<()> {
    let dirs = config.watched_dirs(root);
    println!(
        "{} Watching {} director{} for changes...",
        "👀".cyan(),
        dirs.len(),
        if dirs.len() == 1 { "y" } else { "ies" }
    );

    let (tx, rx) = channel::<notify::Result<notify::Event>>();
    let config_notify = Config::default().with_poll_interval(Duration::from_secs(1));
    let mut watcher = notify::RecommendedWatcher::new(tx, config_notify)?;

    for dir in &dirs {
        watcher.watch(dir, RecursiveMode::Recursive)?;
    }
    let manifest = root.join(CONFIG_FILE);
    if manifest.exists() {
        watcher.watch(&manifest, RecursiveMode::NonRecursive)?;
    }

    // First run
    rebuild(root, config, opts);

    let bin_root = config.bin_root(root);
    while let Ok(event) = rx.recv() {
        // Our own outputs may live under a watched directory.
        if let Ok(event) = &event
            && !event.paths.is_empty()
            && event.paths.iter().all(|p| p.starts_with(&bin_root))
        {
            continue;
        }
        // Debounce simple
        std::thread::sleep(Duration::from_millis(100));
        while rx.try_recv().is_ok() {}

        print!("\x1B[2J\x1B[1;1H");
        println!("{} File changed. Rebuilding...", "🔄".yellow());
        rebuild(root, config, opts);
    }
    Ok(())
}

/// `kiln.toml` is re-read so edits to it apply to the next build. New
/// directories are only watched after a restart.
fn rebuild(root: &Path, fallback: &KilnConfig, opts: &BuildOptions) {
    let reloaded = load_config(root);
    let config = match &reloaded {
        Ok(config) => config,
        Err(e) => {
            println!("{} {:#}", "!".yellow(), e);
            fallback
        }
    };
    if let Err(e) = build_project(root, config, opts) {
        println!("{} Error: {:#}", "x".red(), e);
    }
}

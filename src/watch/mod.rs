//! File watcher bindings for the development workflow
//!
//! Each binding maps a group of glob patterns to an action: re-run one
//! pipeline stage, or broadcast a full reload. Bindings are registered once
//! when entering the development loop and live until the process exits.

use crate::core::reload::{ReloadHub, ReloadSignal};
use crate::core::task::Task;
use glob::Pattern;
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Debounce window for coalescing editor save bursts
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to initialize file watcher: {0}")]
    Init(notify::Error),

    #[error("failed to watch path: {0}")]
    Watch(notify::Error),

    #[error("cannot watch {path}: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid watch pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

/// What a binding does when a matching path changes
pub enum WatchAction {
    /// Re-run one pipeline stage (and only that stage)
    Rerun(Arc<dyn Task>),

    /// Broadcast a full reload without re-processing anything
    Reload(ReloadHub),
}

/// Patterns observed under one root directory
pub struct WatchGroup {
    pub working_dir: PathBuf,
    pub patterns: Vec<String>,
}

impl WatchGroup {
    pub fn new(working_dir: impl Into<PathBuf>, patterns: Vec<String>) -> Self {
        WatchGroup {
            working_dir: working_dir.into(),
            patterns,
        }
    }
}

/// A persistent mapping from a pattern group to an action
pub struct WatchBinding {
    pub name: String,
    pub groups: Vec<WatchGroup>,
    pub action: WatchAction,
    compiled: Vec<Vec<Pattern>>,
}

impl WatchBinding {
    pub fn new(
        name: impl Into<String>,
        groups: Vec<WatchGroup>,
        action: WatchAction,
    ) -> Result<Self, WatchError> {
        let compiled = groups
            .iter()
            .map(|group| {
                group
                    .patterns
                    .iter()
                    .map(|p| Pattern::new(p))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(WatchBinding {
            name: name.into(),
            groups,
            action,
            compiled,
        })
    }

    /// Whether an absolute path belongs to this binding's pattern groups.
    pub fn matches(&self, path: &Path) -> bool {
        let roots: Vec<PathBuf> = self.groups.iter().map(|g| g.working_dir.clone()).collect();
        self.matches_with_roots(&roots, path)
    }

    fn matches_with_roots(&self, roots: &[PathBuf], path: &Path) -> bool {
        for (patterns, root) in self.compiled.iter().zip(roots) {
            if let Ok(rel) = path.strip_prefix(root) {
                if patterns.iter().any(|p| p.matches_path(rel)) {
                    return true;
                }
            }
        }
        false
    }
}

/// Register every binding; each gets its own debounced watcher thread.
pub fn spawn_all(bindings: Vec<WatchBinding>) -> Result<(), WatchError> {
    let handle = tokio::runtime::Handle::current();
    for binding in bindings {
        spawn_binding(binding, handle.clone())?;
    }
    Ok(())
}

fn spawn_binding(binding: WatchBinding, handle: tokio::runtime::Handle) -> Result<(), WatchError> {
    let (tx, rx) = channel();
    let mut debouncer = new_debouncer(DEBOUNCE_WINDOW, tx).map_err(WatchError::Init)?;

    // Canonical roots so event paths strip cleanly.
    let mut roots = Vec::with_capacity(binding.groups.len());
    for group in &binding.groups {
        let root = std::fs::canonicalize(&group.working_dir).map_err(|source| WatchError::Root {
            path: group.working_dir.clone(),
            source,
        })?;
        debouncer
            .watcher()
            .watch(&root, RecursiveMode::Recursive)
            .map_err(WatchError::Watch)?;
        roots.push(root);
    }
    info!(binding = %binding.name, groups = binding.groups.len(), "watch binding registered");

    std::thread::spawn(move || {
        // Keeps the watcher alive for the binding's lifetime.
        let _debouncer = debouncer;
        for result in rx {
            match result {
                Ok(events) => {
                    let changed: Vec<PathBuf> = events
                        .iter()
                        .filter(|e| matches!(e.kind, DebouncedEventKind::Any))
                        .map(|e| e.path.clone())
                        .filter(|p| binding.matches_with_roots(&roots, p))
                        .collect();
                    if changed.is_empty() {
                        continue;
                    }
                    for path in &changed {
                        debug!(binding = %binding.name, path = %path.display(), "change detected");
                    }
                    dispatch(&binding, &handle);
                }
                Err(err) => {
                    // Non-fatal: log and keep watching.
                    warn!(binding = %binding.name, %err, "watch error; continuing");
                }
            }
        }
    });
    Ok(())
}

fn dispatch(binding: &WatchBinding, handle: &tokio::runtime::Handle) {
    match &binding.action {
        WatchAction::Rerun(task) => {
            info!(binding = %binding.name, task = task.name(), "re-running stage");
            // Blocking here serializes re-runs within this binding; distinct
            // bindings still race freely.
            if let Err(err) = handle.block_on(task.run()) {
                warn!(binding = %binding.name, %err, "watch-triggered run failed; binding stays active");
            }
        }
        WatchAction::Reload(hub) => {
            debug!(binding = %binding.name, "broadcasting full reload");
            hub.send(ReloadSignal::Reload);
        }
    }
}

//! Pipeline stages: glob-matched read, ordered transform chain, write

use crate::core::reload::{ReloadHub, ReloadSignal};
use crate::core::task::{Task, TaskError};
use crate::pipeline::transform::{Asset, Transform, TransformError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info};

/// Resolved parameters of one stage, fixed at construction
#[derive(Debug, Clone)]
pub struct StageSpec {
    pub name: String,

    /// Glob pattern, relative to the working directory
    pub pattern: String,

    /// Root that matched paths are made relative to on write
    pub source_root: PathBuf,

    /// Directory the pattern is resolved against
    pub working_dir: PathBuf,

    pub dest_root: PathBuf,
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error("invalid glob pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("failed to read matched path: {0}")]
    Glob(#[from] glob::GlobError),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    Transform {
        path: PathBuf,
        #[source]
        source: TransformError,
    },

    #[error("matched file {path} is outside the source root {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("{page}: referenced asset `{reference}` not found in search path")]
    MissingAsset { page: PathBuf, reference: String },
}

impl StageError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> StageError {
        let path = path.into();
        move |source| StageError::Io { path, source }
    }
}

/// Which notification a stage emits towards connected clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
    /// Push each written file's content without a full page reload
    Inject,

    /// One full-reload broadcast per completed run
    Reload,
}

struct ReloadEmitter {
    hub: ReloadHub,
    kind: NotifyKind,
}

/// A per-asset-class read, transform, write unit.
///
/// Stateless across invocations: each run re-reads the current filesystem
/// state and is side-effect-complete. Completion means every matched file
/// was fully written; any single transform or I/O failure fails the whole
/// invocation.
pub struct PipelineStage {
    spec: StageSpec,
    transforms: Vec<Arc<dyn Transform>>,
    reload: Option<ReloadEmitter>,
}

impl PipelineStage {
    pub fn new(spec: StageSpec, transforms: Vec<Arc<dyn Transform>>) -> Self {
        PipelineStage {
            spec,
            transforms,
            reload: None,
        }
    }

    /// Attach a reload emitter; only stages in the development workflow
    /// carry one.
    pub fn with_reload(mut self, hub: ReloadHub, kind: NotifyKind) -> Self {
        self.reload = Some(ReloadEmitter { hub, kind });
        self
    }

    pub fn spec(&self) -> &StageSpec {
        &self.spec
    }

    async fn execute(&self) -> Result<usize, StageError> {
        let full_pattern = self.spec.working_dir.join(&self.spec.pattern);
        let full_pattern = full_pattern.to_string_lossy().into_owned();
        let entries = glob::glob(&full_pattern).map_err(|source| StageError::Pattern {
            pattern: full_pattern.clone(),
            source,
        })?;

        let mut written = 0usize;
        for entry in entries {
            let path = entry?;
            if !path.is_file() {
                continue;
            }

            let rel = path
                .strip_prefix(&self.spec.source_root)
                .map_err(|_| StageError::OutsideRoot {
                    path: path.clone(),
                    root: self.spec.source_root.clone(),
                })?
                .to_path_buf();
            debug!(stage = %self.spec.name, file = %rel.display(), "processing");

            let bytes = fs::read(&path).await.map_err(StageError::io(&path))?;
            let mut asset = Asset::new(rel, bytes);
            for transform in &self.transforms {
                asset = transform.apply(asset).await.map_err(|source| {
                    StageError::Transform {
                        path: path.clone(),
                        source,
                    }
                })?;
            }

            let dest = self.spec.dest_root.join(&asset.rel_path);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(StageError::io(parent))?;
            }
            fs::write(&dest, &asset.bytes)
                .await
                .map_err(StageError::io(&dest))?;
            written += 1;

            if let Some(emitter) = &self.reload {
                if emitter.kind == NotifyKind::Inject {
                    emitter.hub.send(ReloadSignal::Inject {
                        path: url_path(&asset.rel_path),
                        content: String::from_utf8_lossy(&asset.bytes).into_owned(),
                    });
                }
            }
        }
        Ok(written)
    }
}

#[async_trait]
impl Task for PipelineStage {
    fn name(&self) -> &str {
        &self.spec.name
    }

    async fn run(&self) -> Result<(), TaskError> {
        let started = Instant::now();
        match self.execute().await {
            Ok(written) => {
                info!(
                    stage = %self.spec.name,
                    files = written,
                    elapsed = ?started.elapsed(),
                    "stage complete"
                );
                if let Some(emitter) = &self.reload {
                    if emitter.kind == NotifyKind::Reload && written > 0 {
                        emitter.hub.send(ReloadSignal::Reload);
                    }
                }
                Ok(())
            }
            Err(err) => {
                error!(stage = %self.spec.name, %err, "stage failed");
                Err(TaskError::new(&self.spec.name, err.to_string()))
            }
        }
    }
}

/// Render a relative path as an absolute URL path.
fn url_path(rel: &Path) -> String {
    let joined = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    format!("/{joined}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::transform::StylePreprocessor;
    use tempfile::TempDir;

    fn spec(name: &str, pattern: &str, root: &Path, dest: &Path) -> StageSpec {
        StageSpec {
            name: name.to_string(),
            pattern: pattern.to_string(),
            source_root: root.to_path_buf(),
            working_dir: root.to_path_buf(),
            dest_root: dest.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn test_stage_preserves_relative_paths() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dest = temp.path().join("out");
        std::fs::create_dir_all(src.join("assets/styles")).unwrap();
        std::fs::write(src.join("assets/styles/main.scss"), "body { margin: 0; }").unwrap();

        let stage = PipelineStage::new(
            spec("style", "assets/styles/*.scss", &src, &dest),
            vec![Arc::new(StylePreprocessor)],
        );
        stage.run().await.unwrap();

        let out = std::fs::read_to_string(dest.join("assets/styles/main.css")).unwrap();
        assert!(out.contains("body {"));
        assert!(out.contains("margin: 0;"));
    }

    #[tokio::test]
    async fn test_stage_with_empty_chain_copies_verbatim() {
        let temp = TempDir::new().unwrap();
        let public = temp.path().join("public");
        let dest = temp.path().join("dist");
        std::fs::create_dir_all(public.join("meta")).unwrap();
        std::fs::write(public.join("favicon.ico"), [1, 2, 3]).unwrap();
        std::fs::write(public.join("meta/robots.txt"), "User-agent: *").unwrap();

        let stage = PipelineStage::new(spec("extra", "**", &public, &dest), vec![]);
        stage.run().await.unwrap();

        assert_eq!(std::fs::read(dest.join("favicon.ico")).unwrap(), vec![1, 2, 3]);
        assert_eq!(
            std::fs::read_to_string(dest.join("meta/robots.txt")).unwrap(),
            "User-agent: *"
        );
    }

    #[tokio::test]
    async fn test_single_bad_file_fails_whole_stage() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dest = temp.path().join("out");
        std::fs::create_dir_all(src.join("assets/styles")).unwrap();
        std::fs::write(src.join("assets/styles/good.scss"), "a { color: red; }").unwrap();
        std::fs::write(src.join("assets/styles/bad.scss"), "a { color: red;").unwrap();

        let stage = PipelineStage::new(
            spec("style", "assets/styles/*.scss", &src, &dest),
            vec![Arc::new(StylePreprocessor)],
        );
        let err = stage.run().await.unwrap_err();
        assert_eq!(err.task, "style");
        assert!(err.message.contains("bad.scss"));
    }

    #[tokio::test]
    async fn test_inject_emitted_per_written_file() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dest = temp.path().join("out");
        std::fs::create_dir_all(src.join("assets/styles")).unwrap();
        std::fs::write(src.join("assets/styles/main.scss"), "b { top: 0; }").unwrap();

        let hub = ReloadHub::new();
        let mut rx = hub.subscribe();
        let stage = PipelineStage::new(
            spec("style", "assets/styles/*.scss", &src, &dest),
            vec![Arc::new(StylePreprocessor)],
        )
        .with_reload(hub, NotifyKind::Inject);
        stage.run().await.unwrap();

        match rx.try_recv().unwrap() {
            ReloadSignal::Inject { path, content } => {
                assert_eq!(path, "/assets/styles/main.css");
                assert!(content.contains("top: 0;"));
            }
            other => panic!("expected inject, got {other:?}"),
        }
        assert!(rx.try_recv().is_err(), "exactly one signal expected");
    }

    #[tokio::test]
    async fn test_full_reload_emitted_once_per_run() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dest = temp.path().join("out");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("a.html"), "<p>a</p>").unwrap();
        std::fs::write(src.join("b.html"), "<p>b</p>").unwrap();

        let hub = ReloadHub::new();
        let mut rx = hub.subscribe();
        let stage = PipelineStage::new(spec("page", "*.html", &src, &dest), vec![])
            .with_reload(hub, NotifyKind::Reload);
        stage.run().await.unwrap();

        assert_eq!(rx.try_recv().unwrap(), ReloadSignal::Reload);
        assert!(rx.try_recv().is_err(), "one reload per run, not per file");
    }
}

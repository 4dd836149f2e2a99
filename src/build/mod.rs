//! Build orchestrator: wires stages into the two user-facing workflows
//!
//! Every stage task holds its resolved pattern and roots at construction
//! time; the orchestrator owns no state beyond the effective configuration
//! and an optional reload hub for the development workflow.

use crate::core::config::SiteConfig;
use crate::core::reload::ReloadHub;
use crate::core::task::{parallel, series, Task};
use crate::pipeline::clean::CleanTask;
use crate::pipeline::linkrewrite::LinkRewriteStage;
use crate::pipeline::stage::{NotifyKind, PipelineStage, StageSpec};
use crate::pipeline::transform::{
    AssetOptimizer, PageRenderer, ScriptTranspiler, StylePreprocessor, Transform,
};
use crate::serve::DevServer;
use crate::watch::{self, WatchAction, WatchBinding, WatchGroup};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub struct Orchestrator {
    config: SiteConfig,
    hub: Option<ReloadHub>,
}

impl Orchestrator {
    /// Production orchestrator: stages emit no reload notifications.
    pub fn new(config: SiteConfig) -> Self {
        Orchestrator { config, hub: None }
    }

    /// Development orchestrator: style/script/page stages notify the hub.
    pub fn with_reload(config: SiteConfig, hub: ReloadHub) -> Self {
        Orchestrator {
            config,
            hub: Some(hub),
        }
    }

    fn src(&self) -> PathBuf {
        PathBuf::from(&self.config.build.src)
    }

    fn dist(&self) -> PathBuf {
        PathBuf::from(&self.config.build.dist)
    }

    fn temp(&self) -> PathBuf {
        PathBuf::from(&self.config.build.temp)
    }

    fn public(&self) -> PathBuf {
        PathBuf::from(&self.config.build.public)
    }

    fn stage(
        &self,
        name: &str,
        pattern: &str,
        root: PathBuf,
        dest: PathBuf,
        transforms: Vec<Arc<dyn Transform>>,
        notify: Option<NotifyKind>,
    ) -> Arc<dyn Task> {
        let spec = StageSpec {
            name: name.to_string(),
            pattern: pattern.to_string(),
            source_root: root.clone(),
            working_dir: root,
            dest_root: dest,
        };
        let mut stage = PipelineStage::new(spec, transforms);
        if let (Some(hub), Some(kind)) = (&self.hub, notify) {
            stage = stage.with_reload(hub.clone(), kind);
        }
        Arc::new(stage)
    }

    pub fn style_stage(&self) -> Arc<dyn Task> {
        self.stage(
            "style",
            &self.config.build.paths.styles,
            self.src(),
            self.temp(),
            vec![Arc::new(StylePreprocessor)],
            Some(NotifyKind::Inject),
        )
    }

    pub fn script_stage(&self) -> Arc<dyn Task> {
        self.stage(
            "script",
            &self.config.build.paths.scripts,
            self.src(),
            self.temp(),
            vec![Arc::new(ScriptTranspiler::new())],
            Some(NotifyKind::Reload),
        )
    }

    pub fn page_stage(&self) -> Arc<dyn Task> {
        self.stage(
            "page",
            &self.config.build.paths.pages,
            self.src(),
            self.temp(),
            vec![Arc::new(PageRenderer::new(self.config.data.clone()))],
            Some(NotifyKind::Reload),
        )
    }

    pub fn image_stage(&self) -> Arc<dyn Task> {
        self.stage(
            "image",
            &self.config.build.paths.images,
            self.src(),
            self.dist(),
            vec![Arc::new(AssetOptimizer::new())],
            None,
        )
    }

    pub fn font_stage(&self) -> Arc<dyn Task> {
        self.stage(
            "font",
            &self.config.build.paths.fonts,
            self.src(),
            self.dist(),
            vec![Arc::new(AssetOptimizer::new())],
            None,
        )
    }

    pub fn extra_stage(&self) -> Arc<dyn Task> {
        self.stage("extra", "**", self.public(), self.dist(), vec![], None)
    }

    pub fn link_rewrite(&self) -> Arc<dyn Task> {
        Arc::new(LinkRewriteStage::new(
            self.config.build.paths.pages.clone(),
            self.temp(),
            self.dist(),
            vec![self.temp(), PathBuf::from(".")],
        ))
    }

    pub fn clean(&self) -> Arc<dyn Task> {
        Arc::new(CleanTask::new(vec![self.dist(), self.temp()]))
    }

    /// Compile the source tree into the intermediate root.
    pub fn compile(&self) -> Arc<dyn Task> {
        parallel(
            "compile",
            vec![self.style_stage(), self.script_stage(), self.page_stage()],
        )
    }

    /// The full production build. Clean fully completes before any stage
    /// starts writing.
    pub fn build(&self) -> Arc<dyn Task> {
        series(
            "build",
            vec![
                self.clean(),
                parallel(
                    "bundle",
                    vec![
                        series("pages", vec![self.compile(), self.link_rewrite()]),
                        self.image_stage(),
                        self.font_stage(),
                        self.extra_stage(),
                    ],
                ),
            ],
        )
    }

    /// Watch bindings for the development loop: one per compiled asset
    /// class, plus a combined group over images, fonts, and public assets
    /// that only reloads (those are served straight from their roots).
    pub fn watch_bindings(&self, hub: &ReloadHub) -> Result<Vec<WatchBinding>, watch::WatchError> {
        let paths = &self.config.build.paths;
        Ok(vec![
            WatchBinding::new(
                "styles",
                vec![WatchGroup::new(self.src(), vec![paths.styles.clone()])],
                WatchAction::Rerun(self.style_stage()),
            )?,
            WatchBinding::new(
                "scripts",
                vec![WatchGroup::new(self.src(), vec![paths.scripts.clone()])],
                WatchAction::Rerun(self.script_stage()),
            )?,
            WatchBinding::new(
                "pages",
                vec![WatchGroup::new(self.src(), vec![paths.pages.clone()])],
                WatchAction::Rerun(self.page_stage()),
            )?,
            WatchBinding::new(
                "assets",
                vec![
                    WatchGroup::new(
                        self.src(),
                        vec![paths.images.clone(), paths.fonts.clone()],
                    ),
                    WatchGroup::new(self.public(), vec!["**".to_string()]),
                ],
                WatchAction::Reload(hub.clone()),
            )?,
        ])
    }

    /// The development loop: compile, watch, serve. Never cleans first —
    /// prior intermediate output is reused and overwritten incrementally.
    /// Runs until the process exits.
    pub async fn develop(&self, port: u16) -> Result<()> {
        self.compile()
            .run()
            .await
            .context("initial compile failed")?;

        let hub = self.hub.clone().unwrap_or_default();
        watch::spawn_all(self.watch_bindings(&hub)?).context("failed to register watch bindings")?;

        info!(port, "entering development loop");
        let server = DevServer::new(&self.config, port, hub);
        server.serve().await.context("dev server failed")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_graph_shape() {
        let orchestrator = Orchestrator::new(SiteConfig::default());
        let build = orchestrator.build();
        assert_eq!(build.name(), "build");
        assert_eq!(orchestrator.compile().name(), "compile");
    }

    #[test]
    fn test_watch_bindings_cover_all_classes() {
        let orchestrator = Orchestrator::new(SiteConfig::default());
        let hub = ReloadHub::new();
        let bindings = orchestrator.watch_bindings(&hub).unwrap();

        let names: Vec<&str> = bindings.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["styles", "scripts", "pages", "assets"]);

        // Compiled classes re-run their own stage; the combined binding
        // only reloads.
        for binding in &bindings[..3] {
            assert!(matches!(binding.action, WatchAction::Rerun(_)));
        }
        assert!(matches!(bindings[3].action, WatchAction::Reload(_)));
        assert_eq!(bindings[3].groups.len(), 2);
    }
}

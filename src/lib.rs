//! pagesmith - A static site build tool with a live-reloading dev server

pub mod build;
pub mod cli;
pub mod core;
pub mod pipeline;
pub mod serve;
pub mod watch;

// Re-export commonly used types
pub use crate::build::Orchestrator;
pub use crate::core::config::SiteConfig;
pub use crate::core::reload::{ReloadHub, ReloadSignal};
pub use crate::core::task::{fn_task, parallel, series, Task, TaskError};
pub use crate::pipeline::{PipelineStage, StageSpec};
pub use crate::serve::DevServer;

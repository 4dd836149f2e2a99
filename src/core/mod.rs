//! Core building blocks for pagesmith
//!
//! This module defines the effective configuration, the task composition
//! engine, and the reload signal types shared by the pipeline, watcher,
//! and dev server.

pub mod config;
pub mod reload;
pub mod task;

pub use config::{ConfigOverride, SiteConfig, CONFIG_FILE};
pub use reload::{ReloadHub, ReloadSignal};
pub use task::{fn_task, parallel, series, Task, TaskError};

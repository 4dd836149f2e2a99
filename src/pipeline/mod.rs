//! Pipeline stages and their transform chains

pub mod clean;
pub mod linkrewrite;
pub mod stage;
pub mod transform;

pub use clean::CleanTask;
pub use linkrewrite::LinkRewriteStage;
pub use stage::{NotifyKind, PipelineStage, StageError, StageSpec};
pub use transform::{Asset, Transform, TransformError};

//! Removal of prior build output

use crate::core::task::{Task, TaskError};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, info};

/// Removes the output and intermediate roots before a production build.
///
/// Missing roots are fine; any other removal failure propagates, which
/// aborts everything downstream of the enclosing series.
pub struct CleanTask {
    roots: Vec<PathBuf>,
}

impl CleanTask {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        CleanTask { roots }
    }
}

#[async_trait]
impl Task for CleanTask {
    fn name(&self) -> &str {
        "clean"
    }

    async fn run(&self) -> Result<(), TaskError> {
        for root in &self.roots {
            match fs::remove_dir_all(root).await {
                Ok(()) => info!(root = %root.display(), "removed"),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    debug!(root = %root.display(), "already absent");
                }
                Err(err) => {
                    return Err(TaskError::new(
                        "clean",
                        format!("failed to remove {}: {err}", root.display()),
                    ));
                }
            }
        }
        Ok(())
    }
}

//! Task composition engine: named asynchronous units and the
//! series/parallel combinators used to build the execution graph

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Failure of a task unit, carrying the name of the unit that failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("task `{task}` failed: {message}")]
pub struct TaskError {
    pub task: String,
    pub message: String,
}

impl TaskError {
    pub fn new(task: impl Into<String>, message: impl Into<String>) -> Self {
        TaskError {
            task: task.into(),
            message: message.into(),
        }
    }
}

/// A named, zero-argument unit of asynchronous work.
///
/// Composition units returned by [`series`] and [`parallel`] are themselves
/// tasks, so graphs nest arbitrarily. Each task owns its resolved
/// parameters at construction time; `run` takes no input and is
/// side-effect-complete per invocation.
#[async_trait]
pub trait Task: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> Result<(), TaskError>;
}

struct Series {
    name: String,
    members: Vec<Arc<dyn Task>>,
}

#[async_trait]
impl Task for Series {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<(), TaskError> {
        for member in &self.members {
            debug!(series = %self.name, task = member.name(), "series member starting");
            // A member must fully complete, including its asynchronous
            // tail, before the next starts; a failure aborts the rest.
            member.run().await?;
        }
        Ok(())
    }
}

struct Parallel {
    name: String,
    members: Vec<Arc<dyn Task>>,
}

#[async_trait]
impl Task for Parallel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<(), TaskError> {
        // Members start in declaration order; completion order is up to the
        // scheduler. A failing member never cancels its siblings: every
        // handle is awaited before the group reports.
        let mut handles: Vec<(String, JoinHandle<Result<(), TaskError>>)> = Vec::new();
        for member in &self.members {
            let member = Arc::clone(member);
            debug!(parallel = %self.name, task = member.name(), "parallel member starting");
            let name = member.name().to_string();
            handles.push((name, tokio::spawn(async move { member.run().await })));
        }

        let mut first_failure: Option<TaskError> = None;
        for (name, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(join_err) => Err(TaskError::new(&name, format!("panicked: {join_err}"))),
            };
            if let Err(err) = result {
                warn!(parallel = %self.name, task = %name, %err, "parallel member failed");
                if first_failure.is_none() {
                    first_failure = Some(err);
                }
            }
        }

        match first_failure {
            Some(err) => Err(TaskError::new(&self.name, err.to_string())),
            None => Ok(()),
        }
    }
}

struct FnTask<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F, Fut> Task for FnTask<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), TaskError>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<(), TaskError> {
        (self.f)().await
    }
}

/// Compose tasks to run strictly one after another.
pub fn series(name: &str, members: Vec<Arc<dyn Task>>) -> Arc<dyn Task> {
    Arc::new(Series {
        name: name.to_string(),
        members,
    })
}

/// Compose tasks to run concurrently; completes when all members complete.
pub fn parallel(name: &str, members: Vec<Arc<dyn Task>>) -> Arc<dyn Task> {
    Arc::new(Parallel {
        name: name.to_string(),
        members,
    })
}

/// Wrap an async closure as a leaf task.
pub fn fn_task<F, Fut>(name: &str, f: F) -> Arc<dyn Task>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    Arc::new(FnTask {
        name: name.to_string(),
        f,
    })
}

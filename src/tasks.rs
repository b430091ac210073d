//! Background execution of device commands.

use crate::error::Result;
use futures_util::future::BoxFuture;
use log::{debug, warn};
use tokio::runtime::Handle;

/// A command to run in the background.
pub type Job = BoxFuture<'static, Result<()>>;

/// Runs jobs without the caller waiting for them.
///
/// Failures are not returned to whoever submitted the job; they show up
/// later as (missing) attribute changes.
pub trait TaskRunner: Send + Sync {
    fn run(&self, name: &'static str, job: Job);
}

/// Spawns jobs onto a tokio runtime and logs the ones that fail.
#[derive(Clone)]
pub struct TokioRunner {
    handle: Handle,
}

impl TokioRunner {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Runner bound to the runtime of the calling task.
    ///
    /// Panics outside a tokio runtime, like [`Handle::current`].
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl TaskRunner for TokioRunner {
    fn run(&self, name: &'static str, job: Job) {
        debug!("[Tasks] queueing {}", name);
        self.handle.spawn(async move {
            if let Err(e) = job.await {
                warn!("[Tasks] {} failed: {}", name, e);
            }
        });
    }
}

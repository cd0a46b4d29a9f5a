//! Progress notification for callers that watch a run.

use crate::run::ModuleProgress;

/// Receives module transitions as they happen.
///
/// Called once when a module starts running and once when it reaches a
/// terminal state. A panicking listener is logged and otherwise ignored.
pub trait ProgressListener: Send + Sync {
    fn on_progress(&self, run_id: &str, progress: &ModuleProgress);
}

impl<F> ProgressListener for F
where
    F: Fn(&str, &ModuleProgress) + Send + Sync,
{
    fn on_progress(&self, run_id: &str, progress: &ModuleProgress) {
        self(run_id, progress);
    }
}

//! The step abstraction.

use async_trait::async_trait;

use super::context::ExecutionContext;
use super::result::TaskResult;
use crate::error::Result;

/// Scheduling flags of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepFlags {
    /// Disabled steps never run and contribute nothing.
    pub enabled: bool,
    /// Runs after an earlier non-critical failure.
    pub always_run: bool,
    /// A failure contributes `SucceededWithIssues` and blocks nothing.
    pub continue_on_error: bool,
    /// A failure stops everything except finally steps.
    pub critical: bool,
    /// Runs regardless of earlier failures; its own failure blocks nothing.
    pub is_finally: bool,
}

impl Default for StepFlags {
    fn default() -> Self {
        Self {
            enabled: true,
            always_run: false,
            continue_on_error: false,
            critical: false,
            is_finally: false,
        }
    }
}

/// One unit of work within a job.
///
/// `run` reports its outcome explicitly. Returning `Err` marks an
/// unexpected fault: the runner records the error on the step's context and
/// treats the step as `Failed`.
#[async_trait]
pub trait Step: Send + Sync {
    /// Name shown in the timeline and the logs.
    fn display_name(&self) -> &str;

    fn flags(&self) -> StepFlags {
        StepFlags::default()
    }

    async fn run(&self, context: &mut ExecutionContext) -> Result<TaskResult>;
}

//! The steps runner state machine.
//!
//! Steps run strictly in order. Two flags track earlier failures:
//!
//! - *blocked*: a step failed without `continue_on_error`. From then on only
//!   `always_run` and `is_finally` steps run.
//! - *critical*: a blocking failure came from a `critical` step. From then
//!   on only `is_finally` steps run.
//!
//! A finally step's own failure fails the job but sets neither flag.
//! A step that panics is recorded as Failed like any other failure.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::steps::{ExecutionContext, Step, StepFlags, TaskResult};

/// Progress events emitted while steps run.
#[derive(Debug)]
pub enum RunProgress<'a> {
    /// A step is about to start.
    StepStarting {
        name: &'a str,
        index: usize,
        total: usize,
    },
    /// A step finished with its raw result.
    StepFinished { name: &'a str, result: TaskResult },
    /// A step was skipped because it is disabled or blocked.
    StepSkipped { name: &'a str },
}

/// What happened to one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub name: String,
    /// Whether `run` was called.
    pub ran: bool,
    /// The step's own result; `None` for disabled steps.
    pub result: Option<TaskResult>,
}

#[derive(Debug, Default)]
struct FailureState {
    blocked: bool,
    critical: bool,
}

impl FailureState {
    fn allows(&self, flags: &StepFlags) -> bool {
        if self.critical {
            flags.is_finally
        } else if self.blocked {
            flags.always_run || flags.is_finally
        } else {
            true
        }
    }

    fn record(&mut self, flags: &StepFlags, raw: TaskResult) {
        if raw != TaskResult::Failed || flags.continue_on_error || flags.is_finally {
            return;
        }
        self.blocked = true;
        if flags.critical {
            self.critical = true;
        }
    }
}

/// The result a step contributes to its job.
fn contribution(flags: &StepFlags, raw: TaskResult) -> TaskResult {
    if raw == TaskResult::Failed && flags.continue_on_error {
        TaskResult::SucceededWithIssues
    } else {
        raw
    }
}

/// Runs a job's steps and folds their results into the job context.
#[derive(Debug, Default)]
pub struct StepsRunner;

impl StepsRunner {
    pub fn new() -> Self {
        Self
    }

    /// Run `steps` under `job`.
    ///
    /// The job context's result is updated after every step; `None` at the
    /// end means no step contributed, which reads as `Succeeded`.
    pub async fn run(&self, job: &mut ExecutionContext, steps: &[Box<dyn Step>]) -> Vec<StepOutcome> {
        self.run_with_progress(job, steps, |_| {}).await
    }

    /// Run `steps` under `job`, reporting progress to `on_progress`.
    pub async fn run_with_progress<F>(
        &self,
        job: &mut ExecutionContext,
        steps: &[Box<dyn Step>],
        mut on_progress: F,
    ) -> Vec<StepOutcome>
    where
        F: FnMut(RunProgress<'_>) + Send,
    {
        let mut failures = FailureState::default();
        let mut outcomes = Vec::with_capacity(steps.len());

        for (index, step) in steps.iter().enumerate() {
            let name = step.display_name();
            let flags = step.flags();

            if !flags.enabled {
                debug!(step = name, "step disabled");
                on_progress(RunProgress::StepSkipped { name });
                outcomes.push(StepOutcome {
                    name: name.to_string(),
                    ran: false,
                    result: None,
                });
                continue;
            }

            let mut context = job.child(name, index as u32 + 1);

            if !failures.allows(&flags) {
                info!(step = name, "skipping step after earlier failure");
                context.skip();
                on_progress(RunProgress::StepSkipped { name });
                outcomes.push(StepOutcome {
                    name: name.to_string(),
                    ran: false,
                    result: Some(TaskResult::Skipped),
                });
                continue;
            }

            on_progress(RunProgress::StepStarting {
                name,
                index,
                total: steps.len(),
            });
            context.start();

            let raw = match AssertUnwindSafe(step.run(&mut context)).catch_unwind().await {
                Ok(Ok(result)) => result,
                Ok(Err(err)) => {
                    warn!(step = name, error = %err, "step failed unexpectedly");
                    context.error(&err.to_string());
                    TaskResult::Failed
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(step = name, panic = %message, "step panicked");
                    context.error(&format!("Step panicked: {}", message));
                    TaskResult::Failed
                }
            };
            context.complete(raw).await;

            failures.record(&flags, raw);
            let contributed = contribution(&flags, raw);
            job.merge_result(contributed);

            info!(step = name, result = %raw, job_result = ?job.result(), "step finished");
            on_progress(RunProgress::StepFinished { name, result: raw });
            outcomes.push(StepOutcome {
                name: name.to_string(),
                ran: true,
                result: Some(raw),
            });
        }

        outcomes
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
